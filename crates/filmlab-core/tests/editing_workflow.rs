use filmlab_core::lut::Lut3d;
use filmlab_core::params::{CropRect, InversionMode, LutSlot, SourceType, to_flat_document};
use filmlab_core::{EditSession, EngineConfig, ImageBuf, ParameterSet, render};

fn scan() -> ImageBuf {
    let (w, h) = (24u32, 16u32);
    let mut data = Vec::new();
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&[
                (40 + x * 8) as u8,
                (60 + y * 10) as u8,
                (90 + (x + y) * 3) as u8,
                255,
            ]);
        }
    }
    ImageBuf::from_data(w, h, data).unwrap()
}

#[test]
fn edit_render_undo_returns_to_first_render() {
    let config = EngineConfig::default();
    let source = scan();
    let mut session = EditSession::new(ParameterSet::negative(), &config);
    let first = session.render(&source, 12, &config);

    for v in [5.0, 10.0, 15.0] {
        session.preview(|p| p.exposure = v);
    }
    session.commit(|p| p.exposure = 15.0);
    session.commit(|p| p.rotation = 45.0);
    let mut preset = ParameterSet::default();
    preset.lut1 = Some(LutSlot::new(
        Lut3d::from_fn(9, |[r, g, b]| [g, b, r]),
        1.0,
    ));
    session
        .apply_preset(&to_flat_document(&preset).unwrap())
        .unwrap();
    let edited = session.render(&source, 12, &config);
    assert_ne!(edited.image, first.image);
    assert_eq!(session.history().undo_depth(), 3);

    while session.undo() {}
    assert_eq!(session.params(), &ParameterSet::negative());
    assert_eq!(session.render(&source, 12, &config), first);

    while session.redo() {}
    assert_eq!(session.render(&source, 12, &config), edited);
}

#[test]
fn positive_source_never_inverts() {
    let source = scan();
    let plain = render(&ParameterSet::default(), &source, 0);
    for inverted in [false, true] {
        for mode in [InversionMode::Linear, InversionMode::Log] {
            let mut p = ParameterSet::default();
            p.inverted = inverted;
            p.inversion_mode = mode;
            p.source_type = SourceType::Positive;
            assert!(!p.effective_inversion());
            assert_eq!(render(&p, &source, 0).image, plain.image, "{inverted} {mode:?}");
        }
    }
}

#[test]
fn stored_crop_is_always_clamped_on_read() {
    let odd = [
        CropRect { x: -0.5, y: 0.2, w: 2.0, h: 0.9 },
        CropRect { x: 0.9, y: 0.95, w: 0.5, h: 0.5 },
        CropRect { x: 0.3, y: 0.3, w: -1.0, h: 0.0 },
        CropRect { x: f32::NAN, y: 0.0, w: 1.0, h: 1.0 },
        CropRect { x: 0.1, y: 0.1, w: f32::INFINITY, h: 0.2 },
        CropRect { x: 1.0, y: 1.0, w: 1.0, h: 1.0 },
    ];
    let source = scan();
    for rect in odd {
        let mut p = ParameterSet::default();
        p.set_crop(rect);
        let c = p.crop();
        assert!(c.x >= 0.0 && c.y >= 0.0, "{rect:?} -> {c:?}");
        assert!(c.x + c.w <= 1.0 + 1e-6 && c.y + c.h <= 1.0 + 1e-6, "{rect:?} -> {c:?}");
        assert!(c.w > 0.0 && c.h > 0.0, "{rect:?} -> {c:?}");

        let out = render(&p, &source, 0);
        assert!(out.image.width >= 1 && out.image.height >= 1);
    }
}

#[test]
fn preset_round_trip_renders_identically() {
    let mut p = ParameterSet::negative();
    p.contrast = 20.0;
    p.hsl_params.buckets[2].saturation = -40.0;
    p.lut2 = Some(LutSlot::new(
        Lut3d::from_fn(5, |[r, g, b]| [g, r, 1.0 - b]),
        0.5,
    ));
    let restored = filmlab_core::params::from_flat_document(&to_flat_document(&p).unwrap()).unwrap();
    assert_eq!(restored.fingerprint(), p.fingerprint());

    let source = scan();
    assert_eq!(render(&restored, &source, 0), render(&p, &source, 0));
}
