use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LutError;
use crate::params::LutSlot;

pub const MIN_CUBE_SIZE: usize = 2;
pub const MAX_CUBE_SIZE: usize = 256;

/// A 3D colour cube with RGB triples in [0,1].
///
/// Entries are stored in `.cube` order: red varies fastest, then green,
/// then blue. The content digest is computed once at construction and
/// identifies the cube in fingerprints and cache keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CubeRepr", into = "CubeRepr")]
pub struct Lut3d {
    title: Option<String>,
    size: usize,
    data: Vec<[f32; 3]>,
    digest: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct CubeRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    size: usize,
    data: Vec<[f32; 3]>,
}

impl TryFrom<CubeRepr> for Lut3d {
    type Error = LutError;

    fn try_from(repr: CubeRepr) -> Result<Self, Self::Error> {
        Ok(Self::from_data(repr.size, repr.data)?.with_title(repr.title))
    }
}

impl From<Lut3d> for CubeRepr {
    fn from(lut: Lut3d) -> Self {
        Self {
            title: lut.title,
            size: lut.size,
            data: lut.data,
        }
    }
}

fn check_size(size: usize) -> Result<(), LutError> {
    if (MIN_CUBE_SIZE..=MAX_CUBE_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(LutError::UnsupportedSize(size))
    }
}

fn digest_of(size: usize, data: &[[f32; 3]]) -> [u8; 32] {
    let mut h = blake3::Hasher::new();
    h.update(&(size as u32).to_le_bytes());
    for rgb in data {
        for v in rgb {
            h.update(&v.to_le_bytes());
        }
    }
    *h.finalize().as_bytes()
}

impl Lut3d {
    pub fn from_data(size: usize, data: Vec<[f32; 3]>) -> Result<Self, LutError> {
        check_size(size)?;
        let expected = size * size * size;
        if data.len() != expected {
            return Err(LutError::WrongEntryCount {
                expected,
                found: data.len(),
            });
        }
        let digest = digest_of(size, &data);
        Ok(Self {
            title: None,
            size,
            data,
            digest,
        })
    }

    /// The identity cube. `size` is clamped to the supported range.
    pub fn identity(size: usize) -> Self {
        let size = size.clamp(MIN_CUBE_SIZE, MAX_CUBE_SIZE);
        Self::from_fn(size, |rgb| rgb)
    }

    /// Build a cube by evaluating `f` at every grid point.
    pub fn from_fn(size: usize, mut f: impl FnMut([f32; 3]) -> [f32; 3]) -> Self {
        let size = size.clamp(MIN_CUBE_SIZE, MAX_CUBE_SIZE);
        let max = (size - 1) as f32;
        let mut data = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    data.push(f([r as f32 / max, g as f32 / max, b as f32 / max]));
                }
            }
        }
        let digest = digest_of(size, &data);
        Self {
            title: None,
            size,
            data,
            digest,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &[[f32; 3]] {
        &self.data
    }

    pub fn digest(&self) -> [u8; 32] {
        self.digest
    }

    fn at(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.data[r + g * self.size + b * self.size * self.size]
    }

    /// Parse `.cube` text.
    ///
    /// Understands `TITLE`, `LUT_3D_SIZE`, `DOMAIN_MIN`/`DOMAIN_MAX`,
    /// `#` comments and blank lines. A non-unit input domain is
    /// resampled onto the unit cube.
    pub fn parse_cube(text: &str) -> Result<Self, LutError> {
        let mut title = None;
        let mut size = None;
        let mut domain_min = [0.0_f32; 3];
        let mut domain_max = [1.0_f32; 3];
        let mut data = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |reason: &str| LutError::Malformed {
                line: line_no,
                reason: reason.to_string(),
            };

            let mut parts = line.split_whitespace();
            let Some(head) = parts.next() else { continue };
            match head.to_ascii_uppercase().as_str() {
                "TITLE" => {
                    let rest = line[head.len()..].trim();
                    title = Some(rest.trim_matches('"').to_string());
                }
                "LUT_1D_SIZE" => return Err(LutError::OneDimensional),
                "LUT_3D_SIZE" => {
                    let n: usize = parts
                        .next()
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| malformed("LUT_3D_SIZE needs an integer"))?;
                    check_size(n)?;
                    data.reserve(n * n * n);
                    size = Some(n);
                }
                "DOMAIN_MIN" => domain_min = parse_triple(parts, line_no)?,
                "DOMAIN_MAX" => domain_max = parse_triple(parts, line_no)?,
                // Other keywords (LUT_3D_INPUT_RANGE etc.) are ignored.
                kw if kw.starts_with(|c: char| c.is_ascii_alphabetic()) => {}
                _ => {
                    let rgb = parse_triple(line.split_whitespace(), line_no)?;
                    data.push(rgb);
                }
            }
        }

        let size = size.ok_or(LutError::MissingSize)?;
        if (0..3).any(|c| domain_min[c] >= domain_max[c]) {
            return Err(LutError::InvalidDomain);
        }

        let lut = Self::from_data(size, data)?.with_title(title);
        let unit_domain = domain_min == [0.0; 3] && domain_max == [1.0; 3];
        if unit_domain {
            return Ok(lut);
        }

        debug!(?domain_min, ?domain_max, size, "resampling cube domain");
        let title = lut.title.clone();
        let resampled = Self::from_fn(size, |p| {
            let q = std::array::from_fn(|c| {
                (p[c] - domain_min[c]) / (domain_max[c] - domain_min[c])
            });
            lut.sample(q)
        });
        Ok(resampled.with_title(title))
    }

    /// Serialize as `.cube` text: optional `TITLE`, `LUT_3D_SIZE n`, then
    /// one `r g b` line per grid point with blue major and red minor.
    pub fn to_cube_string(&self) -> String {
        let mut out = String::with_capacity(self.data.len() * 27 + 32);
        if let Some(title) = &self.title {
            let _ = writeln!(out, "TITLE \"{title}\"");
        }
        let _ = writeln!(out, "LUT_3D_SIZE {}", self.size);
        for [r, g, b] in &self.data {
            let _ = writeln!(out, "{r:.6} {g:.6} {b:.6}");
        }
        out
    }

    /// Trilinear lookup, inputs in [0,1].
    pub fn sample(&self, rgb: [f32; 3]) -> [f32; 3] {
        let out = self.sample_f64(rgb.map(f64::from));
        out.map(|v| v as f32)
    }

    fn sample_f64(&self, rgb: [f64; 3]) -> [f64; 3] {
        let n = self.size;
        let max = (n - 1) as f64;
        let mut i0 = [0usize; 3];
        let mut t = [0.0_f64; 3];
        for c in 0..3 {
            let v = if rgb[c].is_finite() {
                rgb[c].clamp(0.0, 1.0) * max
            } else {
                0.0
            };
            i0[c] = (v.floor() as usize).min(n - 2);
            t[c] = v - i0[c] as f64;
        }

        let mut out = [0.0_f64; 3];
        for corner in 0..8 {
            let dr = corner & 1;
            let dg = (corner >> 1) & 1;
            let db = (corner >> 2) & 1;
            let w = if dr == 1 { t[0] } else { 1.0 - t[0] }
                * if dg == 1 { t[1] } else { 1.0 - t[1] }
                * if db == 1 { t[2] } else { 1.0 - t[2] };
            if w == 0.0 {
                continue;
            }
            let v = self.at(i0[0] + dr, i0[1] + dg, i0[2] + db);
            for c in 0..3 {
                out[c] += w * v[c] as f64;
            }
        }
        out
    }

    /// This cube re-gridded at `size` by trilinear lookup.
    pub fn resampled(&self, size: usize) -> Self {
        if size == self.size {
            return self.clone();
        }
        Self::from_fn(size, |rgb| self.sample(rgb)).with_title(self.title.clone())
    }

    /// Pack into an RGBA8 atlas `size` wide and `size²` tall: grid cell
    /// `(r,g,b)` lands at pixel `(x = r, y = g + b * size)`.
    pub fn pack_for_texture(&self) -> Vec<u8> {
        let n = self.size;
        let mut atlas = vec![0u8; n * n * n * 4];
        for b in 0..n {
            for g in 0..n {
                for r in 0..n {
                    let y = g + b * n;
                    let px = (y * n + r) * 4;
                    let v = self.at(r, g, b);
                    for c in 0..3 {
                        atlas[px + c] = (v[c].clamp(0.0, 1.0) * 255.0).round() as u8;
                    }
                    atlas[px + 3] = 255;
                }
            }
        }
        atlas
    }

    /// Numerically invert the cube: for every grid point `t` of the
    /// result, find `x` in the unit cube with `self(x) ≈ t`.
    ///
    /// Damped Gauss-Newton with a central-difference Jacobian and a
    /// backtracking line search. Targets outside the cube's range settle
    /// on the closest reachable colour.
    pub fn inverted(&self, size: usize) -> Self {
        const MAX_ITERS: usize = 60;
        const TOLERANCE: f64 = 1e-10;

        let solve = |target: [f64; 3]| -> [f64; 3] {
            let mut x = target;
            let mut err = residual_norm(&self.sample_f64(x), &target);
            for _ in 0..MAX_ITERS {
                if err < TOLERANCE {
                    break;
                }
                let fx = self.sample_f64(x);
                let r: [f64; 3] = std::array::from_fn(|c| fx[c] - target[c]);
                let jac = self.jacobian(x);
                let Some(step) = gauss_newton_step(&jac, &r) else {
                    break;
                };

                let mut alpha = 1.0;
                let mut improved = false;
                for _ in 0..12 {
                    let cand: [f64; 3] =
                        std::array::from_fn(|c| (x[c] + alpha * step[c]).clamp(0.0, 1.0));
                    let cand_err = residual_norm(&self.sample_f64(cand), &target);
                    if cand_err < err {
                        x = cand;
                        err = cand_err;
                        improved = true;
                        break;
                    }
                    alpha *= 0.5;
                }
                if !improved {
                    break;
                }
            }
            x
        };

        let out = Self::from_fn(size, |t| solve(t.map(f64::from)).map(|v| v as f32));
        debug!(from = self.size, to = out.size, "inverted 3D LUT");
        out
    }

    /// Central-difference Jacobian, columns are d(out)/d(in_c).
    fn jacobian(&self, x: [f64; 3]) -> [[f64; 3]; 3] {
        const EPS: f64 = 1e-6;
        let mut jac = [[0.0; 3]; 3];
        for c in 0..3 {
            let mut hi = x;
            let mut lo = x;
            hi[c] = (x[c] + EPS).min(1.0);
            lo[c] = (x[c] - EPS).max(0.0);
            let span = hi[c] - lo[c];
            let (f_hi, f_lo) = (self.sample_f64(hi), self.sample_f64(lo));
            for row in 0..3 {
                jac[row][c] = (f_hi[row] - f_lo[row]) / span;
            }
        }
        jac
    }
}

fn residual_norm(f: &[f64; 3], target: &[f64; 3]) -> f64 {
    (0..3).map(|c| (f[c] - target[c]).powi(2)).sum()
}

/// Solve `(JᵀJ + λI) δ = -Jᵀr`.
fn gauss_newton_step(jac: &[[f64; 3]; 3], r: &[f64; 3]) -> Option<[f64; 3]> {
    const DAMPING: f64 = 1e-9;
    let mut a = [[0.0_f64; 3]; 3];
    let mut rhs = [0.0_f64; 3];
    for i in 0..3 {
        for j in 0..3 {
            a[i][j] = (0..3).map(|k| jac[k][i] * jac[k][j]).sum();
        }
        a[i][i] += DAMPING;
        rhs[i] = -(0..3).map(|k| jac[k][i] * r[k]).sum::<f64>();
    }
    solve3(&a, &rhs)
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Cramer's rule.
fn solve3(a: &[[f64; 3]; 3], b: &[f64; 3]) -> Option<[f64; 3]> {
    let det = det3(a);
    if det.abs() < 1e-300 || !det.is_finite() {
        return None;
    }
    let mut out = [0.0; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut m = *a;
        for row in 0..3 {
            m[row][col] = b[row];
        }
        *slot = det3(&m) / det;
    }
    Some(out)
}

fn parse_triple<'a>(
    mut parts: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<[f32; 3], LutError> {
    let mut out = [0.0_f32; 3];
    for slot in &mut out {
        let token = parts.next().ok_or_else(|| LutError::Malformed {
            line,
            reason: "expected three values".to_string(),
        })?;
        *slot = token
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| LutError::Malformed {
                line,
                reason: format!("not a number: {token}"),
            })?;
    }
    if parts.next().is_some() {
        return Err(LutError::Malformed {
            line,
            reason: "expected three values".to_string(),
        });
    }
    Ok(out)
}

/// Fold two weighted cubes into one, A first.
///
/// Starts from the identity cube, blends A over it by A's intensity,
/// then blends the result with B by B's intensity. The result has A's
/// size (B is resampled when needed), or B's size when A is absent.
/// Returns `None` when both slots are empty.
pub fn combine_lut3d(a: Option<&LutSlot>, b: Option<&LutSlot>) -> Option<Lut3d> {
    let size = a.or(b)?.lut.size();
    let mut data = Lut3d::identity(size).data;

    for slot in [a, b].into_iter().flatten() {
        let weight = slot.intensity.clamp(0.0, 1.0);
        if weight == 0.0 {
            continue;
        }
        let resampled;
        let cube = if slot.lut.size() == size {
            slot.lut.as_ref()
        } else {
            resampled = slot.lut.resampled(size);
            &resampled
        };
        for (dst, src) in data.iter_mut().zip(&cube.data) {
            for c in 0..3 {
                dst[c] = dst[c] * (1.0 - weight) + src[c] * weight;
            }
        }
    }

    let digest = digest_of(size, &data);
    Some(Lut3d {
        title: None,
        size,
        data,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gamma_cube(size: usize, gamma: f32) -> Lut3d {
        Lut3d::from_fn(size, |rgb| rgb.map(|v| v.powf(gamma)))
    }

    fn max_diff(a: &Lut3d, b: &Lut3d) -> f32 {
        a.data()
            .iter()
            .zip(b.data())
            .flat_map(|(x, y)| (0..3).map(move |c| (x[c] - y[c]).abs()))
            .fold(0.0, f32::max)
    }

    #[test]
    fn identity_order_is_red_fastest() {
        let lut = Lut3d::identity(2);
        assert_eq!(lut.data()[0], [0.0, 0.0, 0.0]);
        assert_eq!(lut.data()[1], [1.0, 0.0, 0.0]);
        assert_eq!(lut.data()[2], [0.0, 1.0, 0.0]);
        assert_eq!(lut.data()[4], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn parse_basic_cube() {
        let text = "# comment\nTITLE \"warm\"\nLUT_3D_SIZE 2\n\n\
                    0 0 0\n1 0 0\n0 1 0\n1 1 0\n0 0 1\n1 0 1\n0 1 1\n1 1 1\n";
        let lut = Lut3d::parse_cube(text).unwrap();
        assert_eq!(lut.size(), 2);
        assert_eq!(lut.title(), Some("warm"));
        assert_eq!(lut.data(), Lut3d::identity(2).data());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(Lut3d::parse_cube("0 0 0\n"), Err(LutError::MissingSize));
        assert_eq!(
            Lut3d::parse_cube("LUT_1D_SIZE 4\n"),
            Err(LutError::OneDimensional)
        );
        assert_eq!(
            Lut3d::parse_cube("LUT_3D_SIZE 1\n0 0 0\n"),
            Err(LutError::UnsupportedSize(1))
        );
        assert_eq!(
            Lut3d::parse_cube("LUT_3D_SIZE 2\n0 0 0\n"),
            Err(LutError::WrongEntryCount {
                expected: 8,
                found: 1
            })
        );
        assert!(matches!(
            Lut3d::parse_cube("LUT_3D_SIZE 2\n0 0 x\n"),
            Err(LutError::Malformed { line: 2, .. })
        ));
        let bad_domain = format!(
            "LUT_3D_SIZE 2\nDOMAIN_MIN 1 0 0\nDOMAIN_MAX 0 1 1\n{}",
            "0 0 0\n".repeat(8)
        );
        assert_eq!(Lut3d::parse_cube(&bad_domain), Err(LutError::InvalidDomain));
    }

    #[test]
    fn export_parse_roundtrip_keeps_values() {
        let lut = gamma_cube(5, 2.2).with_title(Some("gamma".into()));
        let text = lut.to_cube_string();
        assert!(text.starts_with("TITLE \"gamma\"\nLUT_3D_SIZE 5\n"));
        let back = Lut3d::parse_cube(&text).unwrap();
        assert!(max_diff(&lut, &back) < 1e-6);
    }

    #[test]
    fn export_identity_size_two() {
        let text = Lut3d::identity(2).to_cube_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "LUT_3D_SIZE 2");
        assert_eq!(
            &lines[1..],
            [
                "0.000000 0.000000 0.000000",
                "1.000000 0.000000 0.000000",
                "0.000000 1.000000 0.000000",
                "1.000000 1.000000 0.000000",
                "0.000000 0.000000 1.000000",
                "1.000000 0.000000 1.000000",
                "0.000000 1.000000 1.000000",
                "1.000000 1.000000 1.000000",
            ]
        );
    }

    #[test]
    fn domain_is_resampled_to_unit() {
        // Identity over [0,2]: a unit-domain lookup of v must return v.
        let mut text = String::from("LUT_3D_SIZE 3\nDOMAIN_MIN 0 0 0\nDOMAIN_MAX 2 2 2\n");
        for b in 0..3 {
            for g in 0..3 {
                for r in 0..3 {
                    text.push_str(&format!("{} {} {}\n", r, g, b));
                }
            }
        }
        let lut = Lut3d::parse_cube(&text).unwrap();
        let out = lut.sample([0.5, 1.0, 0.0]);
        assert!((out[0] - 0.5).abs() < 1e-5, "{out:?}");
        assert!((out[1] - 1.0).abs() < 1e-5, "{out:?}");
    }

    #[test]
    fn trilinear_sampling() {
        let lut = Lut3d::identity(9);
        for rgb in [[0.0, 0.0, 0.0], [0.3, 0.61, 0.99], [1.0, 1.0, 1.0]] {
            let out = lut.sample(rgb);
            for c in 0..3 {
                assert!((out[c] - rgb[c]).abs() < 1e-6, "{rgb:?} -> {out:?}");
            }
        }
        let out = lut.sample([-1.0, 2.0, f32::NAN]);
        assert_eq!(out, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn combine_single_full_intensity_is_exact() {
        let a = LutSlot::new(gamma_cube(17, 0.45), 1.0);
        let combined = combine_lut3d(Some(&a), None).unwrap();
        assert_eq!(combined.data(), a.lut.data());
    }

    #[test]
    fn combine_zero_intensity_is_identity() {
        let a = LutSlot::new(gamma_cube(17, 0.45), 0.0);
        let b = LutSlot::new(gamma_cube(17, 2.2), 0.0);
        let combined = combine_lut3d(Some(&a), Some(&b)).unwrap();
        assert_eq!(combined.data(), Lut3d::identity(17).data());
        assert!(combine_lut3d(None, None).is_none());
    }

    #[test]
    fn combine_order_matters() {
        let a = LutSlot::new(gamma_cube(9, 0.5), 1.0);
        let b = LutSlot::new(gamma_cube(9, 2.0), 0.5);
        let ab = combine_lut3d(Some(&a), Some(&b)).unwrap();
        let ba = combine_lut3d(Some(&b), Some(&a)).unwrap();
        assert!(max_diff(&ab, &ba) > 1e-3);
        // A fully applied, then half of B.
        let mid = ab.sample([0.25, 0.25, 0.25]);
        let expected = 0.5 * 0.5 + 0.5 * 0.0625;
        assert!((mid[0] - expected).abs() < 0.02, "{mid:?}");
    }

    #[test]
    fn combine_resamples_second_cube() {
        let a = LutSlot::new(Lut3d::identity(17), 1.0);
        let b = LutSlot::new(gamma_cube(33, 1.0), 1.0);
        let combined = combine_lut3d(Some(&a), Some(&b)).unwrap();
        assert_eq!(combined.size(), 17);
        assert!(max_diff(&combined, &Lut3d::identity(17)) < 1e-5);
    }

    #[test]
    fn pack_atlas_layout() {
        let lut = Lut3d::identity(3);
        let atlas = lut.pack_for_texture();
        assert_eq!(atlas.len(), 3 * 9 * 4);
        // (r=2, g=1, b=2) -> (x=2, y=1+2*3=7)
        let px = (7 * 3 + 2) * 4;
        assert_eq!(&atlas[px..px + 4], &[255, 128, 255, 255]);
        assert_eq!(&atlas[0..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn identity_inverts_to_identity() {
        let inv = Lut3d::identity(9).inverted(9);
        assert!(max_diff(&inv, &Lut3d::identity(9)) < 1e-4);
    }

    #[test]
    fn gamma_inverse_composes_to_identity() {
        let lut = gamma_cube(17, 2.0);
        let inv = lut.inverted(17);
        for v in [0.2_f32, 0.5, 0.8] {
            let round = lut.sample(inv.sample([v, v, v]));
            assert!((round[0] - v).abs() < 0.01, "{v} -> {round:?}");
        }
    }

    #[test]
    fn serde_roundtrip_restores_digest() {
        let lut = gamma_cube(3, 1.8);
        let json = serde_json::to_string(&lut).unwrap();
        let back: Lut3d = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lut);
        assert_eq!(back.digest(), lut.digest());
        assert!(serde_json::from_str::<Lut3d>(r#"{"size":2,"data":[[0,0,0]]}"#).is_err());
    }

    #[test]
    fn digest_distinguishes_content() {
        assert_ne!(gamma_cube(5, 1.0).digest(), gamma_cube(5, 2.0).digest());
        assert_eq!(gamma_cube(5, 1.0).digest(), Lut3d::identity(5).digest());
    }
}
