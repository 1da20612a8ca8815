use crate::pipeline::module::{GpuPayload, PixelStage};

/// White-balance and base gains, multiplicative with a clamp.
pub struct Gains {
    pub gains: [f32; 3],
}

impl PixelStage for Gains {
    fn name(&self) -> &'static str {
        "gains"
    }

    fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        std::array::from_fn(|c| (rgb[c] * self.gains[c]).clamp(0.0, 255.0))
    }

    fn wgsl(&self) -> &'static str {
        "c = clamp(c * params.gains.xyz, vec3<f32>(0.0), vec3<f32>(255.0));"
    }

    fn pack(&self, payload: &mut GpuPayload) {
        let [r, g, b] = self.gains;
        payload.uniforms.gains = [r, g, b, 1.0];
    }
}
