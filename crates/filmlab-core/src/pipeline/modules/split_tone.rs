use crate::color::{hue_color, luma};
use crate::params::{SplitToning, ToneZone};
use crate::pipeline::module::{GpuPayload, PixelStage};

const MIN_PIVOT: f32 = 0.05;
const MAX_PIVOT: f32 = 0.95;

/// Luminance-weighted tinting of shadows and highlights.
///
/// Each zone adds the chroma of its tint (tint minus its own luma) so the
/// pixel's brightness is left roughly where it was.
pub struct SplitTone {
    shadow: [f32; 3],
    highlight: [f32; 3],
    pivot: f32,
}

impl SplitTone {
    pub fn new(params: &SplitToning) -> Self {
        Self {
            shadow: chroma_offset(&params.shadows),
            highlight: chroma_offset(&params.highlights),
            pivot: (0.5 + params.balance / 200.0).clamp(MIN_PIVOT, MAX_PIVOT),
        }
    }
}

fn chroma_offset(zone: &ToneZone) -> [f32; 3] {
    let (r, g, b) = hue_color(zone.hue);
    let y = luma(r, g, b);
    let strength = 255.0 * 0.5 * zone.saturation.clamp(0.0, 100.0) / 100.0;
    [(r - y) * strength, (g - y) * strength, (b - y) * strength]
}

impl PixelStage for SplitTone {
    fn name(&self) -> &'static str {
        "split_tone"
    }

    fn apply(&self, [r, g, b]: [f32; 3]) -> [f32; 3] {
        let y = luma(r, g, b) / 255.0;
        let ws = (1.0 - y / self.pivot).clamp(0.0, 1.0);
        let wh = ((y - self.pivot) / (1.0 - self.pivot)).clamp(0.0, 1.0);
        [
            r + self.shadow[0] * ws + self.highlight[0] * wh,
            g + self.shadow[1] * ws + self.highlight[1] * wh,
            b + self.shadow[2] * ws + self.highlight[2] * wh,
        ]
    }

    fn wgsl(&self) -> &'static str {
        "{
        let y = luma(c) / 255.0;
        let pivot = params.split_params.x;
        let ws = clamp(1.0 - y / pivot, 0.0, 1.0);
        let wh = clamp((y - pivot) / (1.0 - pivot), 0.0, 1.0);
        c = c + params.split_shadow.xyz * ws + params.split_highlight.xyz * wh;
    }"
    }

    fn pack(&self, payload: &mut GpuPayload) {
        let [sr, sg, sb] = self.shadow;
        let [hr, hg, hb] = self.highlight;
        payload.uniforms.split_shadow = [sr, sg, sb, 0.0];
        payload.uniforms.split_highlight = [hr, hg, hb, 0.0];
        payload.uniforms.split_params = [self.pivot, 0.0, 0.0, 0.0];
    }
}
