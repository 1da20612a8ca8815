//! Small colour helpers shared by the pixel stages.
//!
//! Every function here has a WGSL twin in the GPU prelude
//! (`filmlab-gpu/shaders/render.wgsl`). Keep the arithmetic identical,
//! branch for branch, or the two backends drift apart.

/// Rec. 601 luma on [0,255] (or [0,1]) RGB, as used by the histogram
/// and split toning.
pub fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Hermite smoothstep: 0 at t<=0, 1 at t>=1, smooth in between.
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// `x^y` that is defined (and zero) at `x <= 0`.
///
/// WGSL leaves `pow(0, y)` undefined, so both backends route through
/// this guard.
pub fn safe_pow(x: f32, y: f32) -> f32 {
    if x <= 0.0 { 0.0 } else { x.powf(y) }
}

/// RGB in [0,1] -> (hue degrees [0,360), saturation, lightness).
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) * 0.5;
    let d = max - min;
    if d < 1e-6 {
        return (0.0, 0.0, l);
    }

    let s = d / (1.0 - (2.0 * l - 1.0).abs()).max(1e-6);
    let mut h = if max == r {
        (g - b) / d
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    h *= 60.0;
    if h < 0.0 {
        h += 360.0;
    }
    (h, s.min(1.0), l)
}

/// (hue degrees, saturation, lightness) -> RGB in [0,1].
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = wrap_hue(h) / 60.0;
    let x = c * (1.0 - ((hp % 2.0) - 1.0).abs());
    let m = l - c * 0.5;

    let (r, g, b) = if hp < 1.0 {
        (c, x, 0.0)
    } else if hp < 2.0 {
        (x, c, 0.0)
    } else if hp < 3.0 {
        (0.0, c, x)
    } else if hp < 4.0 {
        (0.0, x, c)
    } else if hp < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };
    (r + m, g + m, b + m)
}

/// Fold any hue angle into [0,360).
pub fn wrap_hue(h: f32) -> f32 {
    let w = h % 360.0;
    if w < 0.0 { w + 360.0 } else { w }
}

/// Fully saturated mid-lightness colour for a hue, in [0,1].
pub fn hue_color(h: f32) -> (f32, f32, f32) {
    hsl_to_rgb(h, 1.0, 0.5)
}
