use crate::color::safe_pow;
use crate::config::FilmProfile;
use crate::pipeline::module::{GpuPayload, PixelStage};

/// Parametric characteristic curve: density rises as `x^gamma` between
/// `d_min` and `d_max`; output is the normalized transmittance drop.
pub struct FilmCurve {
    d_min: f32,
    d_span: f32,
    gamma: f32,
    top: f32,
    norm: f32,
}

impl FilmCurve {
    /// `None` when the profile has no usable density range.
    pub fn new(profile: FilmProfile) -> Option<Self> {
        let top = 10.0_f32.powf(-profile.d_min);
        let bottom = 10.0_f32.powf(-profile.d_max);
        let range = top - bottom;
        if !(range.is_finite() && range > 1e-6 && profile.gamma > 0.0) {
            return None;
        }
        Some(Self {
            d_min: profile.d_min,
            d_span: profile.d_max - profile.d_min,
            gamma: profile.gamma,
            top,
            norm: 1.0 / range,
        })
    }

    fn curve(&self, v: f32) -> f32 {
        let x = (v / 255.0).clamp(0.0, 1.0);
        let d = self.d_min + self.d_span * safe_pow(x, self.gamma);
        255.0 * (self.top - 10.0_f32.powf(-d)) * self.norm
    }
}

impl PixelStage for FilmCurve {
    fn name(&self) -> &'static str {
        "film_curve"
    }

    fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        rgb.map(|v| self.curve(v))
    }

    fn wgsl(&self) -> &'static str {
        "{
        let x = clamp(c / 255.0, vec3<f32>(0.0), vec3<f32>(1.0));
        let d = vec3<f32>(params.film.x) + params.film.y * safe_pow3(x, params.film.z);
        c = 255.0 * (vec3<f32>(pow(10.0, -params.film.x)) - pow(vec3<f32>(10.0), -d)) * params.film.w;
    }"
    }

    fn pack(&self, payload: &mut GpuPayload) {
        payload.uniforms.film = [self.d_min, self.d_span, self.gamma, self.norm];
    }
}
