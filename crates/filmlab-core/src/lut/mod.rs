//! 1D curve LUTs and 3D colour cubes.

mod cube;
mod curve;

pub use cube::{Lut3d, combine_lut3d};
pub use curve::curve_to_lut;

/// Entries in every 1D LUT (one per 8-bit input level).
pub const LUT1D_SIZE: usize = 256;

pub type Lut1d = [f32; LUT1D_SIZE];

/// The identity 1D LUT.
pub fn identity_lut() -> Lut1d {
    std::array::from_fn(|i| i as f32)
}

/// Look up a fractional level, interpolating linearly between entries.
pub fn lut_lerp(lut: &Lut1d, v: f32) -> f32 {
    let v = v.clamp(0.0, 255.0);
    let i0 = (v.floor() as usize).min(LUT1D_SIZE - 2);
    let t = v - i0 as f32;
    lut[i0] + (lut[i0 + 1] - lut[i0]) * t
}
