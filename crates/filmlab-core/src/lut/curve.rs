//! Control points -> 256-entry LUT.
//!
//! Monotone cubic Hermite interpolation (Fritsch & Carlson 1980): the
//! curve passes through every control point and never overshoots
//! between two of them, so a monotone set of points yields a monotone
//! mapping. Outside the first/last point the curve is held flat.

use super::{LUT1D_SIZE, Lut1d};
use crate::params::CurvePoint;

/// Bake curve control points into a 1D LUT of integer levels.
///
/// Points are clamped to [0,255], sorted, and de-duplicated on x (the
/// last point wins). Fewer than two points produce the identity map.
pub fn curve_to_lut(points: &[CurvePoint]) -> Lut1d {
    let pts = sanitize(points);
    if pts.len() < 2 {
        return super::identity_lut();
    }

    let tangents = tangents(&pts);
    let (first, last) = (pts[0], pts[pts.len() - 1]);

    let mut lut = [0.0_f32; LUT1D_SIZE];
    let mut seg = 0;
    for (i, entry) in lut.iter_mut().enumerate() {
        let x = i as f64;
        let y = if x <= first.0 {
            first.1
        } else if x >= last.0 {
            last.1
        } else {
            while x > pts[seg + 1].0 {
                seg += 1;
            }
            hermite(pts[seg], pts[seg + 1], tangents[seg], tangents[seg + 1], x)
        };
        *entry = y.round().clamp(0.0, 255.0) as f32;
    }
    lut
}

fn sanitize(points: &[CurvePoint]) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .map(|p| {
            (
                (p.x as f64).clamp(0.0, 255.0),
                (p.y as f64).clamp(0.0, 255.0),
            )
        })
        .collect();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut out: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for p in pts {
        match out.last_mut() {
            Some(prev) if (prev.0 - p.0).abs() < 1e-9 => *prev = p,
            _ => out.push(p),
        }
    }
    out
}

/// Fritsch-Carlson tangents.
fn tangents(pts: &[(f64, f64)]) -> Vec<f64> {
    let n = pts.len();
    let secants: Vec<f64> = pts
        .windows(2)
        .map(|w| (w[1].1 - w[0].1) / (w[1].0 - w[0].0))
        .collect();

    let mut m = vec![0.0; n];
    m[0] = secants[0];
    m[n - 1] = secants[n - 2];
    for k in 1..n - 1 {
        m[k] = if secants[k - 1] * secants[k] <= 0.0 {
            0.0
        } else {
            (secants[k - 1] + secants[k]) * 0.5
        };
    }

    for k in 0..n - 1 {
        let d = secants[k];
        if d == 0.0 {
            m[k] = 0.0;
            m[k + 1] = 0.0;
            continue;
        }
        let a = m[k] / d;
        let b = m[k + 1] / d;
        let s = a * a + b * b;
        if s > 9.0 {
            let tau = 3.0 / s.sqrt();
            m[k] = tau * a * d;
            m[k + 1] = tau * b * d;
        }
    }
    m
}

fn hermite(p0: (f64, f64), p1: (f64, f64), m0: f64, m1: f64, x: f64) -> f64 {
    let h = p1.0 - p0.0;
    let t = (x - p0.0) / h;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * p0.1 + h10 * h * m0 + h01 * p1.1 + h11 * h * m1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::identity_curve;

    fn pts(raw: &[(f32, f32)]) -> Vec<CurvePoint> {
        raw.iter().map(|&(x, y)| CurvePoint::new(x, y)).collect()
    }

    #[test]
    fn identity_points_give_identity_map() {
        let lut = curve_to_lut(&identity_curve());
        for (i, &v) in lut.iter().enumerate() {
            assert_eq!(v, i as f32, "identity broken at {i}");
        }
    }

    #[test]
    fn too_few_points_is_identity() {
        assert_eq!(curve_to_lut(&[]), crate::lut::identity_lut());
        assert_eq!(
            curve_to_lut(&pts(&[(128.0, 10.0)])),
            crate::lut::identity_lut()
        );
    }

    #[test]
    fn passes_through_control_points() {
        let curve = pts(&[(0.0, 0.0), (64.0, 90.0), (192.0, 210.0), (255.0, 255.0)]);
        let lut = curve_to_lut(&curve);
        assert_eq!(lut[0], 0.0);
        assert_eq!(lut[64], 90.0);
        assert_eq!(lut[192], 210.0);
        assert_eq!(lut[255], 255.0);
    }

    #[test]
    fn monotone_points_stay_monotone() {
        let curve = pts(&[(0.0, 0.0), (30.0, 120.0), (40.0, 125.0), (255.0, 255.0)]);
        let lut = curve_to_lut(&curve);
        for i in 1..LUT1D_SIZE {
            assert!(lut[i] >= lut[i - 1], "not monotone at {i}: {} < {}", lut[i], lut[i - 1]);
        }
    }

    #[test]
    fn flat_outside_endpoints() {
        let lut = curve_to_lut(&pts(&[(20.0, 40.0), (230.0, 200.0)]));
        assert!(lut[..=20].iter().all(|&v| v == 40.0));
        assert!(lut[230..].iter().all(|&v| v == 200.0));
    }

    #[test]
    fn unsorted_and_duplicate_points_are_tolerated() {
        let lut = curve_to_lut(&pts(&[(255.0, 255.0), (0.0, 0.0), (0.0, 10.0)]));
        assert_eq!(lut[0], 10.0);
        assert_eq!(lut[255], 255.0);
    }

    #[test]
    fn inverted_curve() {
        let lut = curve_to_lut(&pts(&[(0.0, 255.0), (255.0, 0.0)]));
        for (i, &v) in lut.iter().enumerate() {
            assert_eq!(v, 255.0 - i as f32);
        }
    }

    #[test]
    fn out_of_range_points_are_clamped() {
        let lut = curve_to_lut(&pts(&[(-20.0, -5.0), (300.0, 400.0)]));
        assert_eq!(lut[0], 0.0);
        assert_eq!(lut[255], 255.0);
    }
}
