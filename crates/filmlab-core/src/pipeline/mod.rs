pub mod auto_adjust;
pub mod cpu;
pub mod module;
pub mod modules;

use tracing::{debug, warn};

use crate::config::FilmProfiles;
use crate::lut::{Lut3d, combine_lut3d};
use crate::params::ParameterSet;
use crate::white_balance::compute_gains;
pub use module::{GpuPayload, LutAtlas, PixelStage, StageUniforms, curve_row};

/// The per-pixel colour pipeline for one Parameter Set.
///
/// ```text
/// Invert -> Gains -> Film curve -> Tone LUT -> Curves -> HSL -> Split tone -> 3D LUT
/// ```
///
/// The stage list is the single description of the pipeline. The CPU
/// path interprets it with [`RenderCore::process_pixel`]; the GPU path
/// compiles [`RenderCore::wgsl_body`] into its shader. Stages whose
/// parameters are neutral are left out, so the default Parameter Set
/// yields an empty list.
pub struct RenderCore {
    stages: Vec<Box<dyn PixelStage>>,
}

impl RenderCore {
    /// Build every LUT and constant the stages need. Runs once per
    /// Parameter Set, never per pixel.
    pub fn prepare(params: &ParameterSet, profiles: &FilmProfiles) -> Self {
        let mut stages: Vec<Box<dyn PixelStage>> = Vec::new();
        let inverted = params.effective_inversion();

        if inverted {
            stages.push(Box::new(modules::Inversion {
                mode: params.inversion_mode,
            }));
        }

        let gains = compute_gains(params.temp, params.tint, params.base_gains());
        if gains != [1.0; 3] {
            stages.push(Box::new(modules::Gains { gains }));
        }

        if params.film_curve_enabled && inverted {
            let profile = profiles.resolve(&params.film_curve_profile);
            match modules::FilmCurve::new(profile) {
                Some(stage) => stages.push(Box::new(stage)),
                None => warn!(
                    profile = %params.film_curve_profile,
                    "film profile has no density range, skipping film curve"
                ),
            }
        }

        if !modules::tone_neutral(params) {
            stages.push(Box::new(modules::ToneCurve::new(params)));
        }

        if !modules::curves_neutral(&params.curves) {
            stages.push(Box::new(modules::CurveSet::new(&params.curves)));
        }

        if params.hsl_params.has_adjustments() {
            stages.push(Box::new(modules::HslAdjustments::new(&params.hsl_params)));
        }

        if params.split_toning.is_active() {
            stages.push(Box::new(modules::SplitTone::new(&params.split_toning)));
        }

        if let Some(cube) = active_cube(params) {
            stages.push(Box::new(modules::CubeLookup::new(cube)));
        }

        let core = Self { stages };
        debug!(stages = ?core.stage_names(), "prepared render core");
        core
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn is_identity(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage on one pixel, channels on the 0..255 scale. The
    /// result is neither clamped nor rounded.
    pub fn process_pixel(&self, rgb: [f32; 3]) -> [f32; 3] {
        self.stages.iter().fold(rgb, |c, stage| stage.apply(c))
    }

    /// Full per-pixel contract: stages, then clamp to [0,255] and round.
    pub fn render_pixel(&self, [r, g, b]: [u8; 3]) -> [u8; 3] {
        self.process_pixel([r as f32, g as f32, b as f32])
            .map(|v| v.clamp(0.0, 255.0).round() as u8)
    }

    /// WGSL statements for the whole stage list, in order.
    pub fn wgsl_body(&self) -> String {
        let mut body = String::new();
        for stage in &self.stages {
            body.push_str("    // ");
            body.push_str(stage.name());
            body.push_str("\n    ");
            body.push_str(stage.wgsl());
            body.push('\n');
        }
        body
    }

    /// Uniforms, curve rows and cube atlas for the GPU backend.
    pub fn gpu_payload(&self) -> GpuPayload {
        let mut payload = GpuPayload::default();
        for stage in &self.stages {
            stage.pack(&mut payload);
        }
        payload
    }
}

/// lut1 and lut2 folded into one cube, or `None` when neither slot
/// contributes anything.
fn active_cube(params: &ParameterSet) -> Option<Lut3d> {
    let live = |slot: &Option<crate::params::LutSlot>| {
        slot.as_ref().is_some_and(|s| s.intensity > 0.0)
    };
    if !live(&params.lut1) && !live(&params.lut2) {
        return None;
    }
    combine_lut3d(params.lut1.as_ref(), params.lut2.as_ref())
}

/// Sample the colour stages of `params` into a `size`³ cube. Geometry,
/// histograms and the final rounding are not part of a cube.
pub fn bake_cube(params: &ParameterSet, profiles: &FilmProfiles, size: usize) -> Lut3d {
    let core = RenderCore::prepare(params, profiles);
    let lut = Lut3d::from_fn(size, |rgb| {
        core.process_pixel(rgb.map(|v| v * 255.0))
            .map(|v| (v / 255.0).clamp(0.0, 1.0))
    });
    debug!(size = lut.size(), stages = core.stages.len(), "baked cube");
    lut
}
