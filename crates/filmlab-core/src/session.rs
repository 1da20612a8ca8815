//! One photo's editing session: the Parameter Set, its undo history and
//! the actions that change them.

use anyhow::Result;
use tracing::{debug, info};

use crate::config::{EngineConfig, FilmProfiles};
use crate::geometry::{SampleTransform, max_safe_rect};
use crate::histogram::Histograms;
use crate::history::History;
use crate::image_buf::ImageBuf;
use crate::params::{
    CropRect, FlatDocument, MIN_CROP_EXTENT, ParameterSet, SourceType, from_flat_document,
};
use crate::pipeline::auto_adjust;
use crate::pipeline::cpu::{RenderOutput, RenderTarget, render_with};
use crate::pipeline::PixelStage;
use crate::pipeline::modules::Inversion;
use crate::white_balance::solve_temp_tint;

pub struct EditSession {
    params: ParameterSet,
    history: History,
    profiles: FilmProfiles,
    /// State before the first uncommitted preview change.
    pending: Option<ParameterSet>,
}

impl EditSession {
    pub fn new(params: ParameterSet, config: &EngineConfig) -> Self {
        Self {
            params,
            history: History::from_config(&config.history),
            profiles: config.film_profiles.clone(),
            pending: None,
        }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn profiles(&self) -> &FilmProfiles {
        &self.profiles
    }

    /// True between the first [`preview`](Self::preview) change and the
    /// commit that ends it, i.e. while a slider or handle is dragged.
    pub fn is_interacting(&self) -> bool {
        self.pending.is_some()
    }

    /// Intermediate change (slider tick, rotation drag). No snapshot is
    /// taken; the state before the first tick is remembered so the next
    /// commit can record it.
    pub fn preview(&mut self, edit: impl FnOnce(&mut ParameterSet)) {
        if self.pending.is_none() {
            self.pending = Some(self.params.clone());
        }
        edit(&mut self.params);
    }

    /// Destructive change. Snapshots the state before the change (or
    /// before the preview ticks that led up to it), then applies `edit`.
    pub fn commit(&mut self, edit: impl FnOnce(&mut ParameterSet)) {
        let origin = self.pending.take();
        self.history.push(origin.as_ref().unwrap_or(&self.params));
        edit(&mut self.params);
    }

    pub fn undo(&mut self) -> bool {
        self.pending = None;
        self.history.undo(&mut self.params)
    }

    pub fn redo(&mut self) -> bool {
        self.pending = None;
        self.history.redo(&mut self.params)
    }

    /// Reclassify the scan. The source type is a property of the photo,
    /// not of the edit, so it is not recorded in history and survives
    /// undo/redo.
    pub fn set_source_type(&mut self, source_type: SourceType) {
        self.params.set_source_type(source_type);
        if let Some(origin) = &mut self.pending {
            origin.set_source_type(source_type);
        }
    }

    /// Apply a preset's colour settings. Geometry and the source type
    /// describe the scan, so they are kept from the current state.
    pub fn apply_preset(&mut self, preset: &FlatDocument) -> Result<()> {
        let mut incoming = from_flat_document(preset)?;
        let current = &self.params;
        incoming.rotation = current.rotation;
        incoming.orientation = current.orientation;
        incoming.rotation_offset = current.rotation_offset;
        incoming.set_crop(current.crop());
        incoming.set_source_type(current.source_type);
        info!(keys = preset.len(), "applying preset");
        self.commit(|p| *p = incoming);
        Ok(())
    }

    pub fn set_crop(&mut self, rect: CropRect) {
        self.commit(|p| p.set_crop(rect));
    }

    /// Finish a rotation drag started with [`preview`](Self::preview)
    /// and pull the crop back inside the rotated image.
    pub fn end_rotation_drag(&mut self, src_w: u32, src_h: u32, target_aspect: f32) {
        self.clamp_crop_to_safe_rect(src_w, src_h, target_aspect);
    }

    /// Quarter turn clockwise. The crop turns with the image.
    pub fn rotate_clockwise(&mut self) {
        self.commit(|p| {
            let c = p.crop();
            p.orientation = p.orientation.rotated_cw();
            p.set_crop(CropRect {
                x: 1.0 - (c.y + c.h),
                y: c.x,
                w: c.h,
                h: c.w,
            });
        });
    }

    /// Clamp the crop into the largest rect of `target_aspect` that shows
    /// no area outside the rotated image. A non-positive aspect keeps the
    /// rotated image's own aspect.
    pub fn clamp_crop_to_safe_rect(&mut self, src_w: u32, src_h: u32, target_aspect: f32) {
        self.commit(|p| fit_crop_to_safe_rect(p, src_w, src_h, target_aspect));
    }

    pub fn auto_levels(&mut self, histograms: &Histograms) {
        let [red, green, blue] = auto_adjust::auto_levels(histograms);
        self.commit(|p| {
            p.curves.red = red;
            p.curves.green = green;
            p.curves.blue = blue;
        });
    }

    /// Neutralize the mid-tones of `rendered`, a render of the current
    /// Parameter Set. Returns `false` (and records nothing) when there is
    /// nothing to solve for.
    pub fn auto_color(&mut self, rendered: &ImageBuf) -> bool {
        let Some((temp, tint)) = auto_adjust::auto_color(rendered, &self.params) else {
            return false;
        };
        self.commit(|p| {
            p.temp = temp;
            p.tint = tint;
        });
        true
    }

    /// White-balance eyedropper. `(u, v)` is a normalized position in the
    /// rendered view; the source pixel under it is made neutral. Returns
    /// `false` for picks outside the image or unsolvable samples.
    pub fn pick_white_balance(&mut self, source: &ImageBuf, u: f32, v: f32) -> bool {
        let transform = SampleTransform::new(source.width, source.height, &self.params, 0);
        let Some((x, y)) = transform.view_to_source(u, v) else {
            debug!(u, v, "white balance pick outside image");
            return false;
        };
        let [r, g, b, _] = source.pixel(x, y);
        let mut sample = [r, g, b].map(f32::from);
        if self.params.effective_inversion() {
            sample = Inversion {
                mode: self.params.inversion_mode,
            }
            .apply(sample);
        }
        let Some((temp, tint)) = solve_temp_tint(sample, self.params.base_gains()) else {
            return false;
        };
        debug!(x, y, ?sample, temp, tint, "picked white balance");
        self.commit(|p| {
            p.temp = temp;
            p.tint = tint;
        });
        true
    }

    /// Render the current state. The histogram is coarser while
    /// interacting.
    pub fn render(&self, source: &ImageBuf, output_width: u32, config: &EngineConfig) -> RenderOutput {
        let target = RenderTarget::interactive(output_width, &config.histogram, self.is_interacting());
        render_with(&self.params, &self.profiles, source, target)
    }
}

fn fit_crop_to_safe_rect(params: &mut ParameterSet, src_w: u32, src_h: u32, target_aspect: f32) {
    let safe = max_safe_rect(src_w, src_h, params.total_rotation(), target_aspect);
    let crop = params.crop();
    let x0 = crop.x.max(safe.x);
    let y0 = crop.y.max(safe.y);
    let x1 = (crop.x + crop.w).min(safe.x + safe.w);
    let y1 = (crop.y + crop.h).min(safe.y + safe.h);
    let fitted = if x1 - x0 < MIN_CROP_EXTENT || y1 - y0 < MIN_CROP_EXTENT {
        safe
    } else {
        CropRect {
            x: x0,
            y: y0,
            w: x1 - x0,
            h: y1 - y0,
        }
    };
    params.set_crop(fitted);
}
