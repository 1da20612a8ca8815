use crate::lut::{Lut1d, curve_to_lut, lut_lerp};
use crate::params::{Curves, is_identity_curve};
use crate::pipeline::module::{GpuPayload, PixelStage, curve_row};

/// Master RGB curve followed by the per-channel curves.
pub struct CurveSet {
    rgb: Lut1d,
    red: Lut1d,
    green: Lut1d,
    blue: Lut1d,
}

impl CurveSet {
    pub fn new(curves: &Curves) -> Self {
        Self {
            rgb: curve_to_lut(&curves.rgb),
            red: curve_to_lut(&curves.red),
            green: curve_to_lut(&curves.green),
            blue: curve_to_lut(&curves.blue),
        }
    }
}

pub fn is_neutral(curves: &Curves) -> bool {
    [&curves.rgb, &curves.red, &curves.green, &curves.blue]
        .into_iter()
        .all(|c| is_identity_curve(c))
}

impl PixelStage for CurveSet {
    fn name(&self) -> &'static str {
        "curves"
    }

    fn apply(&self, [r, g, b]: [f32; 3]) -> [f32; 3] {
        [
            lut_lerp(&self.red, lut_lerp(&self.rgb, r)),
            lut_lerp(&self.green, lut_lerp(&self.rgb, g)),
            lut_lerp(&self.blue, lut_lerp(&self.rgb, b)),
        ]
    }

    fn wgsl(&self) -> &'static str {
        "c = curve3(1u, c);
    c = vec3<f32>(curve(2u, c.r), curve(3u, c.g), curve(4u, c.b));"
    }

    fn pack(&self, payload: &mut GpuPayload) {
        payload.set_curve(curve_row::RGB, &self.rgb);
        payload.set_curve(curve_row::RED, &self.red);
        payload.set_curve(curve_row::GREEN, &self.green);
        payload.set_curve(curve_row::BLUE, &self.blue);
    }
}
