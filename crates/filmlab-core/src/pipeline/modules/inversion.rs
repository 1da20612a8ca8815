use crate::params::InversionMode;
use crate::pipeline::module::{GpuPayload, PixelStage};

/// Negative -> positive mapping. Only added to the pipeline when the
/// Parameter Set is effectively inverted.
pub struct Inversion {
    pub mode: InversionMode,
}

impl Inversion {
    fn invert(&self, v: f32) -> f32 {
        match self.mode {
            InversionMode::Linear => 255.0 - v,
            InversionMode::Log => 255.0 * (1.0 - (v + 1.0).ln() / 256.0_f32.ln()),
        }
    }
}

impl PixelStage for Inversion {
    fn name(&self) -> &'static str {
        match self.mode {
            InversionMode::Linear => "invert_linear",
            InversionMode::Log => "invert_log",
        }
    }

    fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        rgb.map(|v| self.invert(v))
    }

    fn wgsl(&self) -> &'static str {
        match self.mode {
            InversionMode::Linear => "c = vec3<f32>(255.0) - c;",
            InversionMode::Log => {
                "c = 255.0 * (vec3<f32>(1.0) - log(c + vec3<f32>(1.0)) / log(256.0));"
            }
        }
    }

    fn pack(&self, _payload: &mut GpuPayload) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_flips_levels() {
        let stage = Inversion {
            mode: InversionMode::Linear,
        };
        assert_eq!(stage.apply([0.0, 128.0, 255.0]), [255.0, 127.0, 0.0]);
    }

    #[test]
    fn log_hits_both_ends_and_is_decreasing() {
        let stage = Inversion {
            mode: InversionMode::Log,
        };
        let [lo, _, hi] = stage.apply([0.0, 0.0, 255.0]);
        assert!((lo - 255.0).abs() < 1e-4, "{lo}");
        assert!(hi.abs() < 1e-4, "{hi}");
        let mut prev = f32::MAX;
        for v in 0..=255 {
            let out = stage.apply([v as f32; 3])[0];
            assert!(out < prev, "not decreasing at {v}");
            prev = out;
        }
    }
}
