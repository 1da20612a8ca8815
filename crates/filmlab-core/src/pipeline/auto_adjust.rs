//! One-click adjustments derived from a rendered frame.
//!
//! Both work on the output of the pipeline, so they see the image the
//! way the user sees it: inverted, white balanced and toned.

use tracing::{debug, warn};

use crate::color::luma;
use crate::histogram::{Histograms, NUM_BINS};
use crate::image_buf::ImageBuf;
use crate::params::{CurvePoint, ParameterSet, identity_curve};
use crate::white_balance::{compute_gains, solve_temp_tint};

/// Fraction of a channel's peak a bucket must exceed to count as the
/// start or end of the histogram.
pub const LEVELS_THRESHOLD: f32 = 0.005;

/// Pixels darker or brighter than this (luma, 0..255) don't vote in
/// auto color.
pub const AUTO_COLOR_MIN_LUMA: f32 = 10.0;
pub const AUTO_COLOR_MAX_LUMA: f32 = 245.0;

/// Per-channel level curves `[red, green, blue]` that stretch each
/// channel's occupied range onto [0,255].
///
/// A channel with nothing above the threshold, or a single occupied
/// bucket, keeps the identity curve.
pub fn auto_levels(histograms: &Histograms) -> [Vec<CurvePoint>; 3] {
    [&histograms.r, &histograms.g, &histograms.b].map(|channel| {
        match occupied_range(channel) {
            Some((lo, hi)) if lo < hi => vec![
                CurvePoint::new(lo as f32, 0.0),
                CurvePoint::new(hi as f32, 255.0),
            ],
            _ => identity_curve(),
        }
    })
}

fn occupied_range(channel: &[f32; NUM_BINS]) -> Option<(usize, usize)> {
    let above = |v: &f32| *v > LEVELS_THRESHOLD;
    let lo = channel.iter().position(above)?;
    let hi = channel.iter().rposition(above)?;
    Some((lo, hi))
}

/// Average colour of the mid-tone, opaque pixels of a rendered buffer.
pub fn mid_tone_average(rendered: &ImageBuf) -> Option<[f32; 3]> {
    let mut sum = [0.0_f64; 3];
    let mut count = 0_u64;
    for px in rendered.data.chunks_exact(4) {
        if px[3] == 0 {
            continue;
        }
        let [r, g, b] = [px[0], px[1], px[2]].map(f32::from);
        let y = luma(r, g, b);
        if !(AUTO_COLOR_MIN_LUMA..=AUTO_COLOR_MAX_LUMA).contains(&y) {
            continue;
        }
        sum[0] += r as f64;
        sum[1] += g as f64;
        sum[2] += b as f64;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum.map(|s| (s / count as f64) as f32))
}

/// Temp/tint that neutralize the average mid-tone of `rendered`, which
/// must be a render of `params`.
///
/// The average already carries the current gains, so they are divided
/// out before solving. `None` when no pixel qualifies or the solve is
/// degenerate; callers leave temp/tint untouched in that case.
pub fn auto_color(rendered: &ImageBuf, params: &ParameterSet) -> Option<(f32, f32)> {
    let Some(average) = mid_tone_average(rendered) else {
        warn!("auto color found no mid-tone pixels");
        return None;
    };
    let base = params.base_gains();
    let current = compute_gains(params.temp, params.tint, base);
    let sample: [f32; 3] = std::array::from_fn(|c| average[c] / current[c]);
    let solved = solve_temp_tint(sample, base)?;
    debug!(?average, temp = solved.0, tint = solved.1, "auto color");
    Some(solved)
}
