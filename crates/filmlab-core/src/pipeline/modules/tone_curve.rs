use crate::color::smoothstep;
use crate::lut::{LUT1D_SIZE, Lut1d, lut_lerp};
use crate::params::ParameterSet;
use crate::pipeline::module::{GpuPayload, PixelStage, curve_row};

/// Exposure, contrast, highlights, shadows, whites and blacks folded into
/// one 256-entry LUT, applied per channel.
pub struct ToneCurve {
    lut: Lut1d,
}

impl ToneCurve {
    pub fn new(params: &ParameterSet) -> Self {
        Self {
            lut: build_tone_lut(params),
        }
    }

    pub fn lut(&self) -> &Lut1d {
        &self.lut
    }
}

/// True when none of the tone sliders is engaged.
pub fn is_neutral(params: &ParameterSet) -> bool {
    params.exposure == 0.0
        && params.contrast == 0.0
        && params.highlights == 0.0
        && params.shadows == 0.0
        && params.whites == 0.0
        && params.blacks == 0.0
}

impl PixelStage for ToneCurve {
    fn name(&self) -> &'static str {
        "tone_curve"
    }

    fn apply(&self, [r, g, b]: [f32; 3]) -> [f32; 3] {
        [
            lut_lerp(&self.lut, r),
            lut_lerp(&self.lut, g),
            lut_lerp(&self.lut, b),
        ]
    }

    fn wgsl(&self) -> &'static str {
        "c = curve3(0u, c);"
    }

    fn pack(&self, payload: &mut GpuPayload) {
        payload.set_curve(curve_row::TONE, &self.lut);
    }
}

// ── Zone layout ──────────────────────────────────────────────────────────
//
// The LUT is built on display-referred levels normalized to [0,1]:
//
// ```text
//   0.00─0.15  Blacks region  (power curve + lift, feathered)
//   0.10─0.35  Shadow zone    (power curve, gamma varies)
//   0.35─0.65  Midtone gap    (identity, only contrast S-curve)
//   0.65─0.90  Highlight zone (power curve, gamma varies)
//   0.85─1.00  Whites region  (blacks curve mirrored about 1)
//   full range: Contrast S-curve overlay (x^a / (x^a + (1-x)^a))
// ```
//
// Exposure scales the input by 2^(exposure/50) before the zones.
// Power curves use `n^gamma` where n is normalized [0,1] within the zone.
// gamma < 1 lifts (positive slider), gamma > 1 crushes (negative slider).
// Boundaries are feathered over 5% to ensure C1 slope continuity.

const SHADOW_LO: f32 = 0.10;
const SHADOW_HI: f32 = 0.35;
const HIGHLIGHT_LO: f32 = 0.65;
const HIGHLIGHT_HI: f32 = 0.90;
const BLACKS_HI: f32 = 0.15;
const FEATHER: f32 = 0.05;
/// Slider units per stop of exposure.
const EXPOSURE_PER_STOP: f32 = 50.0;

pub fn build_tone_lut(params: &ParameterSet) -> Lut1d {
    let exposure_gain = 2.0_f32.powf(params.exposure / EXPOSURE_PER_STOP);
    let contrast = params.contrast / 100.0;
    let highlights = params.highlights / 100.0;
    let shadows = params.shadows / 100.0;
    let whites = params.whites / 100.0;
    let blacks = params.blacks / 100.0;

    let shadow_width = SHADOW_HI - SHADOW_LO;
    let highlight_width = HIGHLIGHT_HI - HIGHLIGHT_LO;

    // gamma = 3^(-slider): positive slider -> gamma < 1 -> lift/boost
    //                       negative slider -> gamma > 1 -> crush/recover
    let shadow_gamma = 3.0_f32.powf(-shadows);
    let highlight_gamma = 3.0_f32.powf(-highlights);

    let mut lut = [0.0_f32; LUT1D_SIZE];

    for (i, entry) in lut.iter_mut().enumerate() {
        let t = (i as f32 / (LUT1D_SIZE - 1) as f32 * exposure_gain).min(1.0);

        let mut out = t;

        // Shadow zone [SHADOW_LO, SHADOW_HI] with feathered boundaries
        if t > SHADOW_LO - FEATHER && t < SHADOW_HI + FEATHER && shadows != 0.0 {
            let n = ((t - SHADOW_LO) / shadow_width).clamp(0.0, 1.0);
            let shadow_val = SHADOW_LO + n.powf(shadow_gamma) * shadow_width;

            if t <= SHADOW_LO {
                let blend = smoothstep((t - (SHADOW_LO - FEATHER)) / FEATHER);
                out = t * (1.0 - blend) + shadow_val * blend;
            } else if t >= SHADOW_HI {
                let blend = smoothstep((t - SHADOW_HI) / FEATHER);
                out = shadow_val * (1.0 - blend) + t * blend;
            } else {
                out = shadow_val;
            }
        }

        // Highlight zone [HIGHLIGHT_LO, HIGHLIGHT_HI] with feathered boundaries
        if t > HIGHLIGHT_LO - FEATHER && t < HIGHLIGHT_HI + FEATHER && highlights != 0.0 {
            let n = ((t - HIGHLIGHT_LO) / highlight_width).clamp(0.0, 1.0);
            let highlight_val = HIGHLIGHT_LO + n.powf(highlight_gamma) * highlight_width;

            if t <= HIGHLIGHT_LO {
                let blend = smoothstep((t - (HIGHLIGHT_LO - FEATHER)) / FEATHER);
                out = out * (1.0 - blend) + highlight_val * blend;
            } else if t >= HIGHLIGHT_HI {
                let blend = smoothstep((t - HIGHLIGHT_HI) / FEATHER);
                out = highlight_val * (1.0 - blend) + t * blend;
            } else {
                out = highlight_val;
            }
        }

        if contrast != 0.0 {
            out = s_curve(out, 3.0_f32.powf(contrast));
        }

        if blacks != 0.0 {
            out = end_zone(out, blacks);
        }
        // Whites mirror the blacks curve about 1; a positive slider crushes
        // the distance to white, brightening the top end.
        if whites != 0.0 {
            out = 1.0 - end_zone(1.0 - out, -whites);
        }

        *entry = out.clamp(0.0, 1.0) * 255.0;
    }

    // Enforce monotonicity (safety net for extreme combined settings)
    for i in 1..LUT1D_SIZE {
        if lut[i] < lut[i - 1] {
            lut[i] = lut[i - 1];
        }
    }

    lut
}

/// Power curve on [0, BLACKS_HI] with optional end-point lift.
/// Positive: lift raises the end point and gamma < 1.
/// Negative: gamma > 1 crushes toward zero.
fn end_zone(v: f32, amount: f32) -> f32 {
    if v >= BLACKS_HI + FEATHER {
        return v;
    }
    let gamma = 3.0_f32.powf(-amount);
    let lift = amount.max(0.0) * 0.10;
    let range = BLACKS_HI - lift;
    let n = (v / BLACKS_HI).clamp(0.0, 1.0);
    let zone_val = lift + n.powf(gamma) * range;

    if v >= BLACKS_HI {
        let blend = smoothstep((v - BLACKS_HI) / FEATHER);
        zone_val * (1.0 - blend) + v * blend
    } else {
        zone_val
    }
}

/// S-curve: x^a / (x^a + (1-x)^a)
///
/// Properties: f(0)=0, f(1)=1, f(0.5)=0.5, monotonic for a>0.
/// a=1 is identity; a>1 increases slope at midpoint (contrast boost);
/// a<1 decreases slope (contrast reduction).
fn s_curve(x: f32, a: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let xa = x.powf(a);
    let one_minus_xa = (1.0 - x).powf(a);
    xa / (xa + one_minus_xa)
}
