use crate::lut::Lut3d;
use crate::pipeline::module::{GpuPayload, LutAtlas, PixelStage};

/// The combined creative cube, looked up trilinearly.
pub struct CubeLookup {
    lut: Lut3d,
}

impl CubeLookup {
    pub fn new(lut: Lut3d) -> Self {
        Self { lut }
    }
}

impl PixelStage for CubeLookup {
    fn name(&self) -> &'static str {
        "lut3d"
    }

    fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        self.lut.sample(rgb.map(|v| v / 255.0)).map(|v| v * 255.0)
    }

    fn wgsl(&self) -> &'static str {
        "c = sample_lut(c / 255.0) * 255.0;"
    }

    fn pack(&self, payload: &mut GpuPayload) {
        let size = self.lut.size() as u32;
        payload.uniforms.lut = [size as f32, 0.0, 0.0, 0.0];
        payload.lut = Some(LutAtlas {
            size,
            pixels: self.lut.pack_for_texture(),
        });
    }
}
