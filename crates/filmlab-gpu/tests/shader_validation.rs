//! Every generated shader must parse and validate, whatever stages the
//! Parameter Set enables.

use filmlab_core::lut::Lut3d;
use filmlab_core::params::{CurvePoint, InversionMode, LutSlot, ToneZone};
use filmlab_core::{FilmProfiles, ParameterSet, RenderCore};
use filmlab_gpu::compose_shader;

fn validate(params: &ParameterSet) {
    let core = RenderCore::prepare(params, &FilmProfiles::default());
    let source = compose_shader(&core.wgsl_body());
    let module = naga::front::wgsl::parse_str(&source).unwrap_or_else(|e| {
        panic!(
            "stages {:?} failed to parse:\n{}",
            core.stage_names(),
            e.emit_to_string(&source)
        )
    });
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .unwrap_or_else(|e| panic!("stages {:?} failed validation: {e:?}", core.stage_names()));
}

fn variants() -> Vec<ParameterSet> {
    let mut all = ParameterSet::negative();
    all.temp = 15.0;
    all.film_curve_enabled = true;
    all.contrast = 30.0;
    all.curves.green.insert(1, CurvePoint::new(128.0, 140.0));
    all.hsl_params.buckets[4].hue = 25.0;
    all.split_toning.highlights = ToneZone {
        hue: 45.0,
        saturation: 30.0,
    };
    all.lut1 = Some(LutSlot::new(Lut3d::identity(9), 0.7));

    let mut log = all.clone();
    log.inversion_mode = InversionMode::Log;

    let mut tone_only = ParameterSet::default();
    tone_only.exposure = 20.0;

    let mut hsl_only = ParameterSet::default();
    hsl_only.hsl_params.buckets[0].saturation = -50.0;

    let mut cube_only = ParameterSet::default();
    cube_only.lut2 = Some(LutSlot::new(Lut3d::identity(2), 1.0));

    vec![ParameterSet::default(), all, log, tone_only, hsl_only, cube_only]
}

#[test]
fn generated_shaders_validate() {
    for params in variants() {
        validate(&params);
    }
}

#[test]
fn every_stage_appears_in_full_shader() {
    let core = RenderCore::prepare(&variants()[1], &FilmProfiles::default());
    let source = compose_shader(&core.wgsl_body());
    for name in core.stage_names() {
        assert!(source.contains(&format!("// {name}")), "{name} missing");
    }
    assert_eq!(core.stage_names().len(), 8);
}
