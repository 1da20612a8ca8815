use crate::color::{hsl_to_rgb, rgb_to_hsl, wrap_hue};
use crate::params::{HSL_BUCKET_CENTERS, HSL_BUCKET_COUNT, HslParams};
use crate::pipeline::module::{GpuPayload, PixelStage};

/// Degrees of hue rotation at a hue slider of ±100.
const MAX_HUE_SHIFT: f32 = 30.0;
/// Lightness change at a luminance slider of ±100, scaled by saturation.
const MAX_LIGHTNESS_SHIFT: f32 = 0.25;

/// Eight-bucket hue/saturation/luminance adjustment. Deltas are
/// interpolated linearly between neighbouring bucket centers.
pub struct HslAdjustments {
    /// Per bucket: (hue shift degrees, saturation scale, lightness scale).
    buckets: [[f32; 3]; HSL_BUCKET_COUNT],
}

impl HslAdjustments {
    pub fn new(params: &HslParams) -> Self {
        Self {
            buckets: params.buckets.map(|b| {
                [
                    b.hue / 100.0 * MAX_HUE_SHIFT,
                    b.saturation / 100.0,
                    b.luminance / 100.0 * MAX_LIGHTNESS_SHIFT,
                ]
            }),
        }
    }

    /// Adjustment at hue `h`, blended from the two surrounding buckets.
    fn at_hue(&self, h: f32) -> [f32; 3] {
        let h = wrap_hue(h);
        let mut k = 0;
        for (i, &center) in HSL_BUCKET_CENTERS.iter().enumerate() {
            if h >= center {
                k = i;
            }
        }
        let next = (k + 1) % HSL_BUCKET_COUNT;
        let lo = HSL_BUCKET_CENTERS[k];
        let hi = if next == 0 {
            360.0
        } else {
            HSL_BUCKET_CENTERS[next]
        };
        let t = (h - lo) / (hi - lo);
        std::array::from_fn(|c| self.buckets[k][c] * (1.0 - t) + self.buckets[next][c] * t)
    }
}

impl PixelStage for HslAdjustments {
    fn name(&self) -> &'static str {
        "hsl"
    }

    fn apply(&self, [r, g, b]: [f32; 3]) -> [f32; 3] {
        let (h, s, l) = rgb_to_hsl(r / 255.0, g / 255.0, b / 255.0);
        let [dh, ds, dl] = self.at_hue(h);
        let s2 = (s * (1.0 + ds)).clamp(0.0, 1.0);
        let l2 = (l + dl * s).clamp(0.0, 1.0);
        let (r, g, b) = hsl_to_rgb(h + dh, s2, l2);
        [r * 255.0, g * 255.0, b * 255.0]
    }

    fn wgsl(&self) -> &'static str {
        "{
        let hsl = rgb_to_hsl(c / 255.0);
        let adj = hsl_bucket(hsl.x);
        let s2 = clamp(hsl.y * (1.0 + adj.y), 0.0, 1.0);
        let l2 = clamp(hsl.z + adj.z * hsl.y, 0.0, 1.0);
        c = hsl_to_rgb(vec3<f32>(hsl.x + adj.x, s2, l2)) * 255.0;
    }"
    }

    fn pack(&self, payload: &mut GpuPayload) {
        for (slot, [dh, ds, dl]) in payload.uniforms.hsl.iter_mut().zip(self.buckets) {
            *slot = [dh, ds, dl, 0.0];
        }
    }
}
