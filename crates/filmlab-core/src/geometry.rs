//! Rotation and crop geometry.
//!
//! Crop rects are always normalized to the *rotated* bounding box. Every
//! consumer (CPU render, GPU render, white-balance picking) maps output
//! pixels to source pixels through the same [`SampleTransform`].

use crate::params::{CropRect, MIN_CROP_EXTENT, ParameterSet};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub scaled_w: f32,
    pub scaled_h: f32,
    pub rotated_w: f32,
    pub rotated_h: f32,
    pub radians: f32,
}

/// Sine and cosine of an angle in degrees, exact on quarter turns.
pub fn sin_cos_deg(degrees: f32) -> (f32, f32) {
    let d = degrees.rem_euclid(360.0);
    if d == 0.0 {
        (0.0, 1.0)
    } else if d == 90.0 {
        (1.0, 0.0)
    } else if d == 180.0 {
        (0.0, -1.0)
    } else if d == 270.0 {
        (-1.0, 0.0)
    } else {
        d.to_radians().sin_cos()
    }
}

pub fn compute_geometry(src_w: u32, src_h: u32, total_rotation_deg: f32, scale: f32) -> Geometry {
    let scaled_w = src_w as f32 * scale;
    let scaled_h = src_h as f32 * scale;
    let (s, c) = sin_cos_deg(total_rotation_deg);
    let (s, c) = (s.abs(), c.abs());
    Geometry {
        scaled_w,
        scaled_h,
        rotated_w: scaled_w * c + scaled_h * s,
        rotated_h: scaled_w * s + scaled_h * c,
        radians: total_rotation_deg.to_radians(),
    }
}

/// Largest centered rect of aspect `target_aspect` (w/h) that stays inside
/// the rotated image, normalized to the rotated bounding box. A
/// non-positive aspect keeps the rotated box's aspect.
pub fn max_safe_rect(
    src_w: u32,
    src_h: u32,
    total_rotation_deg: f32,
    target_aspect: f32,
) -> CropRect {
    if src_w == 0 || src_h == 0 {
        return CropRect::FULL;
    }
    let (w, h) = (src_w as f32, src_h as f32);
    let geo = compute_geometry(src_w, src_h, total_rotation_deg, 1.0);
    let aspect = if target_aspect.is_finite() && target_aspect > 0.0 {
        target_aspect
    } else {
        geo.rotated_w / geo.rotated_h
    };
    let (s, c) = sin_cos_deg(total_rotation_deg);
    let (s, c) = (s.abs(), c.abs());

    let rect_h = (w / (aspect * c + s)).min(h / (aspect * s + c));
    let rect_w = aspect * rect_h;

    let nw = (rect_w / geo.rotated_w).clamp(MIN_CROP_EXTENT, 1.0);
    let nh = (rect_h / geo.rotated_h).clamp(MIN_CROP_EXTENT, 1.0);
    CropRect {
        x: (1.0 - nw) * 0.5,
        y: (1.0 - nh) * 0.5,
        w: nw,
        h: nh,
    }
    .clamped()
}

/// Affine map from output pixel positions to source pixel positions.
///
/// `source = M * (ox, oy, 1)` where `(ox, oy)` is a position in output
/// pixels (pixel centers sit at `+0.5`). Rotation is about the image
/// center, clockwise for positive angles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleTransform {
    pub src_w: u32,
    pub src_h: u32,
    pub out_w: u32,
    pub out_h: u32,
    /// Row-major `[a, b, c, d, e, f]`: `sx = a*ox + b*oy + c`,
    /// `sy = d*ox + e*oy + f`.
    pub matrix: [f32; 6],
}

impl SampleTransform {
    /// Transform for rendering `params`' rotation and crop of a
    /// `src_w x src_h` source at `output_width` pixels wide. An output
    /// width of 0 renders the crop at native resolution.
    pub fn new(src_w: u32, src_h: u32, params: &ParameterSet, output_width: u32) -> Self {
        Self::with_crop(src_w, src_h, params.total_rotation(), params.crop(), output_width)
    }

    pub fn with_crop(
        src_w: u32,
        src_h: u32,
        total_rotation_deg: f32,
        crop: CropRect,
        output_width: u32,
    ) -> Self {
        let crop = crop.clamped();
        let geo = compute_geometry(src_w, src_h, total_rotation_deg, 1.0);
        let crop_w = (crop.w * geo.rotated_w).max(f32::EPSILON);
        let crop_h = crop.h * geo.rotated_h;

        let out_w = if output_width == 0 {
            crop_w.round().max(1.0) as u32
        } else {
            output_width
        };
        let scale = out_w as f32 / crop_w;
        let out_h = (crop_h * scale).round().max(1.0) as u32;

        let (s, c) = sin_cos_deg(total_rotation_deg);
        let cx = crop.x * geo.rotated_w - geo.rotated_w * 0.5;
        let cy = crop.y * geo.rotated_h - geo.rotated_h * 0.5;
        let matrix = [
            c / scale,
            s / scale,
            src_w as f32 * 0.5 + c * cx + s * cy,
            -s / scale,
            c / scale,
            src_h as f32 * 0.5 - s * cx + c * cy,
        ];

        Self {
            src_w,
            src_h,
            out_w,
            out_h,
            matrix,
        }
    }

    pub fn source_point(&self, ox: f32, oy: f32) -> (f32, f32) {
        let m = &self.matrix;
        (m[0] * ox + m[1] * oy + m[2], m[3] * ox + m[4] * oy + m[5])
    }

    /// Source position sampled by output pixel `(x, y)`.
    pub fn pixel_center(&self, x: u32, y: u32) -> (f32, f32) {
        self.source_point(x as f32 + 0.5, y as f32 + 0.5)
    }

    pub fn contains(&self, sx: f32, sy: f32) -> bool {
        sx >= 0.0 && sy >= 0.0 && sx <= self.src_w as f32 && sy <= self.src_h as f32
    }

    /// Map a normalized view position (`u`, `v` in [0,1] across the
    /// rendered output) to the source pixel under it.
    pub fn view_to_source(&self, u: f32, v: f32) -> Option<(u32, u32)> {
        if !(u.is_finite() && v.is_finite()) {
            return None;
        }
        let (sx, sy) = self.source_point(u * self.out_w as f32, v * self.out_h as f32);
        if !self.contains(sx, sy) || self.src_w == 0 || self.src_h == 0 {
            return None;
        }
        Some((
            (sx.floor() as u32).min(self.src_w - 1),
            (sy.floor() as u32).min(self.src_h - 1),
        ))
    }
}
