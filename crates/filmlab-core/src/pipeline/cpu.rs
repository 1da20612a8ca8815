//! CPU execution path: geometry resampling, the stage interpreter and
//! histogram accumulation in one pass over the output rows.

use rayon::prelude::*;
use tracing::debug;

use super::RenderCore;
use crate::config::{FilmProfiles, HistogramConfig};
use crate::geometry::SampleTransform;
use crate::histogram::{HistogramCounts, Histograms};
use crate::image_buf::ImageBuf;
use crate::params::ParameterSet;

/// Output size and histogram sampling for one render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    /// Output width in pixels; 0 renders the crop at native resolution.
    pub output_width: u32,
    /// Every `histogram_stride`-th output pixel is counted.
    pub histogram_stride: usize,
}

impl RenderTarget {
    /// Full-quality render, every pixel counted.
    pub fn export(output_width: u32) -> Self {
        Self {
            output_width,
            histogram_stride: 1,
        }
    }

    /// Interactive render. The histogram is coarsened while a slider or
    /// the rotation handle is being dragged.
    pub fn interactive(output_width: u32, config: &HistogramConfig, dragging: bool) -> Self {
        Self {
            output_width,
            histogram_stride: if dragging {
                config.drag_stride
            } else {
                config.idle_stride
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderOutput {
    pub image: ImageBuf,
    pub histograms: Histograms,
}

/// Render `params` applied to `source` at `output_width` pixels wide with
/// the built-in film profiles.
pub fn render(params: &ParameterSet, source: &ImageBuf, output_width: u32) -> RenderOutput {
    render_with(
        params,
        &FilmProfiles::default(),
        source,
        RenderTarget::export(output_width),
    )
}

pub fn render_with(
    params: &ParameterSet,
    profiles: &FilmProfiles,
    source: &ImageBuf,
    target: RenderTarget,
) -> RenderOutput {
    let core = RenderCore::prepare(params, profiles);
    let transform = SampleTransform::new(source.width, source.height, params, target.output_width);
    render_cpu(&core, source, &transform, target.histogram_stride)
}

/// Render through an already prepared core and transform.
pub fn render_cpu(
    core: &RenderCore,
    source: &ImageBuf,
    transform: &SampleTransform,
    histogram_stride: usize,
) -> RenderOutput {
    let (out_w, out_h) = (transform.out_w, transform.out_h);
    let mut image = ImageBuf::new(out_w, out_h);
    if source.width == 0 || source.height == 0 {
        return RenderOutput {
            image,
            histograms: Histograms::default(),
        };
    }

    let stride = histogram_stride.max(1);
    let row_bytes = out_w as usize * 4;
    let counts = image
        .data
        .par_chunks_mut(row_bytes)
        .enumerate()
        .fold(HistogramCounts::default, |mut counts, (y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let (sx, sy) = transform.pixel_center(x as u32, y as u32);
                let Some([r, g, b, a]) = sample_bilinear(source, transform, sx, sy) else {
                    continue;
                };
                let rgb = core
                    .process_pixel([r, g, b])
                    .map(|v| v.clamp(0.0, 255.0).round() as u8);
                let alpha = a.clamp(0.0, 255.0).round() as u8;
                px.copy_from_slice(&[rgb[0], rgb[1], rgb[2], alpha]);

                let index = y * out_w as usize + x;
                if alpha != 0 && index % stride == 0 {
                    counts.add(rgb);
                }
            }
            counts
        })
        .reduce(HistogramCounts::default, |a, b| a.merge(&b));

    debug!(
        out_w,
        out_h,
        stages = core.stage_names().len(),
        counted = counts.total(),
        "cpu render"
    );

    RenderOutput {
        image,
        histograms: counts.normalized(),
    }
}

/// Bilinear RGBA sample at a source position, `None` outside the image.
fn sample_bilinear(
    source: &ImageBuf,
    transform: &SampleTransform,
    sx: f32,
    sy: f32,
) -> Option<[f32; 4]> {
    if !transform.contains(sx, sy) {
        return None;
    }
    let max_x = source.width as i64 - 1;
    let max_y = source.height as i64 - 1;
    let fx = sx - 0.5;
    let fy = sy - 0.5;
    let x0f = fx.floor();
    let y0f = fy.floor();
    let tx = fx - x0f;
    let ty = fy - y0f;
    let x0 = (x0f as i64).clamp(0, max_x) as u32;
    let x1 = (x0f as i64 + 1).clamp(0, max_x) as u32;
    let y0 = (y0f as i64).clamp(0, max_y) as u32;
    let y1 = (y0f as i64 + 1).clamp(0, max_y) as u32;

    let p00 = source.pixel(x0, y0);
    let p10 = source.pixel(x1, y0);
    let p01 = source.pixel(x0, y1);
    let p11 = source.pixel(x1, y1);

    let mut out = [0.0; 4];
    for (c, o) in out.iter_mut().enumerate() {
        let top = p00[c] as f32 + (p10[c] as f32 - p00[c] as f32) * tx;
        let bottom = p01[c] as f32 + (p11[c] as f32 - p01[c] as f32) * tx;
        *o = top + (bottom - top) * ty;
    }
    Some(out)
}
