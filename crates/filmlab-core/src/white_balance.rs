//! Temperature/tint white balance.
//!
//! `temp` and `tint` are slider values in [-100, 100]. `temp` moves the
//! assumed illuminant along the Planckian locus in mired steps around
//! 6500 K, `tint` moves it perpendicular to the locus in CIE 1960 UCS.
//! The per-channel gains are the ratio of the reference white to the
//! illuminant white in linear sRGB, normalized to green and composed with
//! the manual base gains.
//!
//! The renderer and the solver both go through [`wb_gains`], so a solved
//! (temp, tint) always reproduces the gains it was solved for.

use tracing::{debug, warn};

pub const REF_KELVIN: f64 = 6500.0;
pub const SLIDER_RANGE: f32 = 100.0;

const MIN_KELVIN: f64 = 1667.0;
const MAX_KELVIN: f64 = 25000.0;
/// Duv per tint unit. At the slider limits every channel of the
/// illuminant white stays positive for the whole temp range.
const TINT_SCALE: f64 = 1.0 / 5000.0;

/// Illuminant colour temperature for a `temp` slider value.
pub fn temp_to_kelvin(temp: f32) -> f64 {
    let mired = 1e6 / REF_KELVIN - temp as f64;
    (1e6 / mired.max(1e6 / MAX_KELVIN)).clamp(MIN_KELVIN, MAX_KELVIN)
}

/// Gains for `(temp, tint)` composed with the manual base gains.
pub fn compute_gains(temp: f32, tint: f32, base: [f32; 3]) -> [f32; 3] {
    let wb = wb_gains(temp as f64, tint as f64);
    std::array::from_fn(|c| (wb[c] * base[c] as f64) as f32)
}

/// Temperature/tint gains alone, green normalized to 1.
///
/// Positive tint assumes a greener illuminant, so the gains pull green
/// down relative to red and blue.
pub fn wb_gains(temp: f64, tint: f64) -> [f64; 3] {
    let reference = white_rgb(REF_KELVIN, 0.0);
    let kelvin = temp_to_kelvin(temp as f32);
    let illuminant = white_rgb(kelvin, tint * TINT_SCALE);
    let raw: [f64; 3] = std::array::from_fn(|c| reference[c] / illuminant[c]);
    raw.map(|v| v / raw[1])
}

/// Linear sRGB of the (Y = 1) white at `kelvin`, shifted by `duv` towards
/// green.
fn white_rgb(kelvin: f64, duv: f64) -> [f64; 3] {
    let (x, y) = planckian_with_tint(kelvin, duv);
    mat3_vec(&XYZ_TO_SRGB, &xy_to_xyz(x, y))
}

/// Solve for the `(temp, tint)` that makes `sample` neutral once the
/// resulting gains (including `base`) are applied.
///
/// Returns `None` for unusable input (non-positive or non-finite
/// channels) or when the iteration does not produce a finite answer.
pub fn solve_temp_tint(sample: [f32; 3], base: [f32; 3]) -> Option<(f32, f32)> {
    const MAX_ITERS: usize = 60;
    const STEP: f64 = 1e-3;
    const LIMIT: f64 = SLIDER_RANGE as f64;

    let weighted: [f64; 3] = std::array::from_fn(|c| sample[c] as f64 * base[c] as f64);
    if weighted.iter().any(|v| !v.is_finite() || *v <= 1e-6) {
        warn!(?sample, ?base, "white balance sample unusable");
        return None;
    }
    let log_sample = weighted.map(f64::ln);

    let residual = |t: f64, s: f64| -> [f64; 2] {
        let g = wb_gains(t, s).map(f64::ln);
        let green = log_sample[1] + g[1];
        [log_sample[0] + g[0] - green, log_sample[2] + g[2] - green]
    };
    let norm = |r: [f64; 2]| r[0] * r[0] + r[1] * r[1];

    let (mut t, mut s) = (0.0_f64, 0.0_f64);
    let mut r = residual(t, s);
    for _ in 0..MAX_ITERS {
        if norm(r) < 1e-14 {
            break;
        }
        let rt = residual(t + STEP, s);
        let rs = residual(t, s + STEP);
        let j = [
            [(rt[0] - r[0]) / STEP, (rs[0] - r[0]) / STEP],
            [(rt[1] - r[1]) / STEP, (rs[1] - r[1]) / STEP],
        ];
        let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
        if det.abs() < 1e-12 || !det.is_finite() {
            break;
        }
        let dt = -(j[1][1] * r[0] - j[0][1] * r[1]) / det;
        let ds = -(-j[1][0] * r[0] + j[0][0] * r[1]) / det;

        let mut alpha = 1.0;
        let mut accepted = false;
        for _ in 0..16 {
            let nt = (t + alpha * dt).clamp(-LIMIT, LIMIT);
            let ns = (s + alpha * ds).clamp(-LIMIT, LIMIT);
            let nr = residual(nt, ns);
            if norm(nr) < norm(r) {
                (t, s, r) = (nt, ns, nr);
                accepted = true;
                break;
            }
            alpha *= 0.5;
        }
        if !accepted {
            break;
        }
    }

    if !(t.is_finite() && s.is_finite()) {
        warn!(?sample, "white balance solve diverged");
        return None;
    }
    debug!(temp = t, tint = s, residual = norm(r), "solved white balance");
    Some((t as f32, s as f32))
}

// ── Color science constants ──────────────────────────────────────────────
//
// XYZ -> linear sRGB (IEC 61966-2-1, D65 reference white).

const XYZ_TO_SRGB: [f64; 9] = [
    3.2409699419,
    -1.5373831776,
    -0.4986107603,
    -0.9692436363,
    1.8759675015,
    0.0415550574,
    0.0556300797,
    -0.2039769589,
    1.0569715142,
];

// ── Planckian locus (Kang et al. 2002) ──────────────────────────────────

fn planckian_xy(t: f64) -> (f64, f64) {
    let t2 = t * t;
    let t3 = t2 * t;

    let x = if t <= 4000.0 {
        -0.2661239e9 / t3 - 0.2343589e6 / t2 + 0.8776956e3 / t + 0.179910
    } else {
        -3.0258469e9 / t3 + 2.1070379e6 / t2 + 0.2226347e3 / t + 0.240390
    };

    let x2 = x * x;
    let x3 = x2 * x;

    let y = if t <= 2222.0 {
        -1.1063814 * x3 - 1.34811020 * x2 + 2.18555832 * x - 0.20219683
    } else if t <= 4000.0 {
        -0.9549476 * x3 - 1.37418593 * x2 + 2.09137015 * x - 0.16748867
    } else {
        3.0817580 * x3 - 5.87338670 * x2 + 3.75112997 * x - 0.37001483
    };

    (x, y)
}

/// Chromaticity `duv` away from the locus at `temp`, measured in CIE 1960
/// UCS along the normal. Positive = green (above the locus).
fn planckian_with_tint(temp: f64, duv: f64) -> (f64, f64) {
    let (x0, y0) = planckian_xy(temp);
    if duv == 0.0 {
        return (x0, y0);
    }

    let (u0, v0) = xy_to_uv60(x0, y0);

    let dt = 50.0;
    let t_lo = (temp - dt).max(MIN_KELVIN);
    let t_hi = (temp + dt).min(MAX_KELVIN);
    let (x_lo, y_lo) = planckian_xy(t_lo);
    let (x_hi, y_hi) = planckian_xy(t_hi);
    let (u_lo, v_lo) = xy_to_uv60(x_lo, y_lo);
    let (u_hi, v_hi) = xy_to_uv60(x_hi, y_hi);

    let du = u_hi - u_lo;
    let dv = v_hi - v_lo;
    let len = (du * du + dv * dv).sqrt();

    // Tangent runs towards higher kelvin; (dv, -du) points above the locus
    let perp_u = dv / len;
    let perp_v = -du / len;

    uv60_to_xy(u0 + perp_u * duv, v0 + perp_v * duv)
}

fn xy_to_uv60(x: f64, y: f64) -> (f64, f64) {
    let d = -2.0 * x + 12.0 * y + 3.0;
    (4.0 * x / d, 6.0 * y / d)
}

fn uv60_to_xy(u: f64, v: f64) -> (f64, f64) {
    let d = 2.0 * u - 8.0 * v + 4.0;
    (3.0 * u / d, 2.0 * v / d)
}

fn xy_to_xyz(x: f64, y: f64) -> [f64; 3] {
    if y.abs() < 1e-10 {
        return [0.0, 1.0, 0.0];
    }
    [x / y, 1.0, (1.0 - x - y) / y]
}

fn mat3_vec(m: &[f64; 9], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: [f32; 3] = [1.0, 1.0, 1.0];

    #[test]
    fn neutral_settings_are_identity() {
        assert_eq!(compute_gains(0.0, 0.0, UNIT), UNIT);
        assert_eq!(compute_gains(0.0, 0.0, [1.2, 1.0, 0.8]), [1.2, 1.0, 0.8]);
    }

    #[test]
    fn warm_temp_boosts_red() {
        let g = compute_gains(40.0, 0.0, UNIT);
        assert!(g[0] > 1.0, "red should be boosted: {g:?}");
        assert!(g[2] < 1.0, "blue should be reduced: {g:?}");
    }

    #[test]
    fn cool_temp_boosts_blue() {
        let g = compute_gains(-40.0, 0.0, UNIT);
        assert!(g[0] < 1.0 && g[2] > 1.0, "{g:?}");
    }

    #[test]
    fn positive_tint_is_magenta() {
        let g = compute_gains(0.0, 50.0, UNIT);
        assert!(g[0] > g[1] && g[2] > g[1], "{g:?}");
        let g = compute_gains(0.0, -50.0, UNIT);
        assert!(g[0] < g[1] && g[2] < g[1], "{g:?}");
    }

    #[test]
    fn extreme_settings_stay_finite() {
        for temp in [-100.0_f32, -50.0, 0.0, 50.0, 100.0] {
            for tint in [-100.0_f32, 0.0, 100.0] {
                let g = compute_gains(temp, tint, UNIT);
                assert!(
                    g.iter().all(|v| v.is_finite() && *v > 0.0),
                    "temp={temp} tint={tint}: {g:?}"
                );
            }
        }
    }

    #[test]
    fn illuminant_white_positive_over_slider_range() {
        for temp in (-100..=100).step_by(10) {
            for tint in (-100..=100).step_by(10) {
                let white = white_rgb(temp_to_kelvin(temp as f32), tint as f64 * TINT_SCALE);
                assert!(white.iter().all(|v| *v > 0.0), "temp={temp} tint={tint}: {white:?}");
            }
        }
    }

    #[test]
    fn solve_roundtrip_full_grid() {
        let gray = [128.0_f32, 128.0, 128.0];
        let mut failures = Vec::new();
        for temp in (-100..=100).step_by(10) {
            for tint in (-100..=100).step_by(10) {
                let (temp, tint) = (temp as f32, tint as f32);
                let gains = compute_gains(temp, tint, UNIT);
                let cast: [f32; 3] = std::array::from_fn(|c| gray[c] / gains[c]);
                match solve_temp_tint(cast, UNIT) {
                    Some((t, s)) if (t - temp).abs() < 0.5 && (s - tint).abs() < 0.5 => {}
                    other => failures.push((temp, tint, other)),
                }
            }
        }
        assert!(failures.is_empty(), "{} failures: {failures:?}", failures.len());
    }

    #[test]
    fn kelvin_mapping() {
        assert!((temp_to_kelvin(0.0) - REF_KELVIN).abs() < 1e-6);
        assert!(temp_to_kelvin(50.0) > REF_KELVIN);
        assert!(temp_to_kelvin(-50.0) < REF_KELVIN);
        assert!(temp_to_kelvin(1000.0) <= MAX_KELVIN);
    }

    #[test]
    fn solve_roundtrip() {
        let gray = [128.0_f32, 128.0, 128.0];
        for (temp, tint) in [
            (0.0_f32, 0.0_f32),
            (25.0, 0.0),
            (-30.0, 10.0),
            (60.0, -20.0),
            (-75.0, 40.0),
            (10.0, -60.0),
        ] {
            let gains = compute_gains(temp, tint, UNIT);
            let cast: [f32; 3] = std::array::from_fn(|c| gray[c] / gains[c]);
            let (t, s) = solve_temp_tint(cast, UNIT).expect("solvable");
            assert!(
                (t - temp).abs() < 0.5 && (s - tint).abs() < 0.5,
                "({temp},{tint}) solved as ({t},{s})"
            );
        }
    }

    #[test]
    fn solved_gains_neutralize_sample() {
        let base = [1.1, 1.0, 0.9];
        let sample = [140.0_f32, 120.0, 100.0];
        let (t, s) = solve_temp_tint(sample, base).unwrap();
        let g = compute_gains(t, s, base);
        let out: Vec<f32> = (0..3).map(|c| sample[c] * g[c]).collect();
        let spread = out.iter().cloned().fold(f32::MIN, f32::max)
            - out.iter().cloned().fold(f32::MAX, f32::min);
        assert!(spread / out[1] < 0.02, "not neutral: {out:?}");
    }

    #[test]
    fn degenerate_samples_are_rejected() {
        assert_eq!(solve_temp_tint([0.0, 0.0, 0.0], UNIT), None);
        assert_eq!(solve_temp_tint([f32::NAN, 1.0, 1.0], UNIT), None);
        assert_eq!(solve_temp_tint([10.0, 10.0, 10.0], [0.0, 1.0, 1.0]), None);
    }

    #[test]
    fn planckian_xy_known_values() {
        // D65 is approximately 6504K, should be near (0.3127, 0.3290)
        let (x, y) = planckian_xy(6504.0);
        assert!((x - 0.3127).abs() < 0.003, "D65 x={x}");
        assert!((y - 0.3290).abs() < 0.006, "D65 y={y}");

        // 2856K (Illuminant A) should be near (0.4476, 0.4074)
        let (x, y) = planckian_xy(2856.0);
        assert!((x - 0.4476).abs() < 0.005, "IllA x={x}");
        assert!((y - 0.4074).abs() < 0.008, "IllA y={y}");
    }

    #[test]
    fn uv60_roundtrip() {
        let (x, y) = (0.3127, 0.3290);
        let (u, v) = xy_to_uv60(x, y);
        let (x2, y2) = uv60_to_xy(u, v);
        assert!((x - x2).abs() < 1e-10, "x roundtrip: {x} vs {x2}");
        assert!((y - y2).abs() < 1e-10, "y roundtrip: {y} vs {y2}");
    }

    #[test]
    fn red_blue_ratio_monotonic_in_temp() {
        let mut prev = 0.0_f32;
        for temp in (-100..=100).step_by(10) {
            let g = compute_gains(temp as f32, 0.0, UNIT);
            let ratio = g[0] / g[2];
            assert!(ratio > prev, "R/B should increase with temp: {temp} ratio={ratio} prev={prev}");
            prev = ratio;
        }
    }
}
