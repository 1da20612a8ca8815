use crate::lut::LUT1D_SIZE;

/// A single step in the pixel pipeline.
///
/// Each stage carries both of its implementations: `apply` is the CPU
/// interpreter, `wgsl` the statements spliced into the generated compute
/// shader. Both operate on RGB in [0,255].
pub trait PixelStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, rgb: [f32; 3]) -> [f32; 3];

    /// WGSL statements updating `c: vec3<f32>` in place. They may read the
    /// `params` uniform and call the helpers in the shader prelude.
    fn wgsl(&self) -> &'static str;

    /// Write the uniforms and texture data the WGSL reads.
    fn pack(&self, payload: &mut GpuPayload);
}

/// Rows of the curves texture.
pub mod curve_row {
    pub const TONE: usize = 0;
    pub const RGB: usize = 1;
    pub const RED: usize = 2;
    pub const GREEN: usize = 3;
    pub const BLUE: usize = 4;
    pub const COUNT: usize = 5;
}

/// Uniform block read by stage WGSL. Every member is a `vec4<f32>` so
/// the layout matches WGSL's uniform rules without padding.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageUniforms {
    /// xyz = per-channel gains.
    pub gains: [f32; 4],
    /// (d_min, d_max - d_min, gamma, 1 / (10^-d_min - 10^-d_max)).
    pub film: [f32; 4],
    /// xyz = shadow chroma offset on the 0..255 scale.
    pub split_shadow: [f32; 4],
    /// xyz = highlight chroma offset on the 0..255 scale.
    pub split_highlight: [f32; 4],
    /// x = luminance pivot.
    pub split_params: [f32; 4],
    /// x = cube size.
    pub lut: [f32; 4],
    /// Per bucket: (hue shift degrees, saturation scale, lightness scale, 0).
    pub hsl: [[f32; 4]; 8],
}

/// RGBA8 atlas of a 3D LUT, `size` wide and `size²` tall.
#[derive(Clone, Debug, PartialEq)]
pub struct LutAtlas {
    pub size: u32,
    pub pixels: Vec<u8>,
}

/// Everything the GPU backend uploads for one Parameter Set.
#[derive(Clone, Debug, PartialEq)]
pub struct GpuPayload {
    pub uniforms: StageUniforms,
    /// `curve_row::COUNT` rows of `LUT1D_SIZE` levels, row-major.
    pub curves: Vec<f32>,
    pub lut: Option<LutAtlas>,
}

impl Default for GpuPayload {
    fn default() -> Self {
        let mut curves = Vec::with_capacity(curve_row::COUNT * LUT1D_SIZE);
        for _ in 0..curve_row::COUNT {
            curves.extend((0..LUT1D_SIZE).map(|i| i as f32));
        }
        Self {
            uniforms: StageUniforms::default(),
            curves,
            lut: None,
        }
    }
}

impl GpuPayload {
    pub fn set_curve(&mut self, row: usize, lut: &[f32; LUT1D_SIZE]) {
        let start = row * LUT1D_SIZE;
        self.curves[start..start + LUT1D_SIZE].copy_from_slice(lut);
    }
}
