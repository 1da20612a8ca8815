mod preset;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::lut::Lut3d;

pub use preset::{FlatDocument, from_flat_document, to_flat_document};

/// How a negative is mapped to positive appearance.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InversionMode {
    #[default]
    Linear,
    Log,
}

/// What kind of film the scan came from.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Original,
    Negative,
    Positive,
}

/// Whether inversion actually runs. Positives are never inverted,
/// whatever the stored flag says.
pub fn effective_inversion(source_type: SourceType, inverted: bool) -> bool {
    match source_type {
        SourceType::Positive => false,
        SourceType::Original | SourceType::Negative => inverted,
    }
}

/// Quarter-turn orientation (EXIF style).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u16", into = "u16")]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    pub fn degrees(self) -> f32 {
        match self {
            Self::Deg0 => 0.0,
            Self::Deg90 => 90.0,
            Self::Deg180 => 180.0,
            Self::Deg270 => 270.0,
        }
    }

    /// Next quarter turn clockwise.
    pub fn rotated_cw(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }
}

impl TryFrom<u16> for Orientation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value % 360 {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(format!("orientation must be a quarter turn, got {other}")),
        }
    }
}

impl From<Orientation> for u16 {
    fn from(o: Orientation) -> u16 {
        o.degrees() as u16
    }
}

/// Smallest crop extent kept by [`CropRect::clamped`].
pub const MIN_CROP_EXTENT: f32 = 1e-3;

/// Crop rectangle normalized to the rotated bounding box.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Default for CropRect {
    fn default() -> Self {
        Self::FULL
    }
}

impl CropRect {
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        w: 1.0,
        h: 1.0,
    };

    /// Centered rect covering `fraction` of each axis.
    pub fn centered(fraction: f32) -> Self {
        let f = fraction.clamp(MIN_CROP_EXTENT, 1.0);
        Self {
            x: (1.0 - f) * 0.5,
            y: (1.0 - f) * 0.5,
            w: f,
            h: f,
        }
    }

    /// The rect with `0 <= x,y`, `x + w <= 1`, `y + h <= 1` and
    /// `w, h > 0` restored. Non-finite input collapses to the full frame.
    pub fn clamped(&self) -> Self {
        if ![self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite()) {
            return Self::FULL;
        }
        let (x, w) = clamp_span(self.x, self.w);
        let (y, h) = clamp_span(self.y, self.h);
        Self { x, y, w, h }
    }

    pub fn is_full(&self) -> bool {
        let c = self.clamped();
        c.x <= 0.0 && c.y <= 0.0 && c.w >= 1.0 && c.h >= 1.0
    }
}

fn clamp_span(start: f32, extent: f32) -> (f32, f32) {
    let start = start.clamp(0.0, 1.0 - MIN_CROP_EXTENT);
    let extent = extent.max(MIN_CROP_EXTENT).min(1.0 - start);
    (start, extent)
}

/// One curve control point on the 0..255 grid.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
}

impl CurvePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

pub fn identity_curve() -> Vec<CurvePoint> {
    vec![CurvePoint::new(0.0, 0.0), CurvePoint::new(255.0, 255.0)]
}

/// True when the points describe the straight diagonal.
pub fn is_identity_curve(points: &[CurvePoint]) -> bool {
    points.len() < 2 || points.iter().all(|p| (p.x - p.y).abs() < 1e-6)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Curves {
    pub rgb: Vec<CurvePoint>,
    pub red: Vec<CurvePoint>,
    pub green: Vec<CurvePoint>,
    pub blue: Vec<CurvePoint>,
}

impl Default for Curves {
    fn default() -> Self {
        Self {
            rgb: identity_curve(),
            red: identity_curve(),
            green: identity_curve(),
            blue: identity_curve(),
        }
    }
}

/// Hue/saturation/luminance deltas for one hue bucket, each in [-100,100].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HslAdjust {
    pub hue: f32,
    pub saturation: f32,
    pub luminance: f32,
}

impl HslAdjust {
    pub fn is_zero(&self) -> bool {
        self.hue == 0.0 && self.saturation == 0.0 && self.luminance == 0.0
    }
}

pub const HSL_BUCKET_COUNT: usize = 8;

/// Bucket names, in the order of [`HslParams::buckets`].
pub const HSL_BUCKET_NAMES: [&str; HSL_BUCKET_COUNT] = [
    "red", "orange", "yellow", "green", "aqua", "blue", "purple", "magenta",
];

/// Bucket centers in degrees.
pub const HSL_BUCKET_CENTERS: [f32; HSL_BUCKET_COUNT] =
    [0.0, 30.0, 60.0, 120.0, 180.0, 240.0, 270.0, 300.0];

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HslParams {
    pub buckets: [HslAdjust; HSL_BUCKET_COUNT],
}

impl HslParams {
    pub fn has_adjustments(&self) -> bool {
        self.buckets.iter().any(|b| !b.is_zero())
    }
}

/// Hue (degrees) and strength (0..100) of a split-toning tint.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToneZone {
    pub hue: f32,
    pub saturation: f32,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitToning {
    pub shadows: ToneZone,
    pub highlights: ToneZone,
    /// Moves the shadow/highlight pivot, [-100,100].
    pub balance: f32,
}

impl SplitToning {
    pub fn is_active(&self) -> bool {
        self.shadows.saturation > 0.0 || self.highlights.saturation > 0.0
    }
}

/// A 3D LUT reference. The cube itself is shared between clones so
/// history snapshots never duplicate it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LutSlot {
    pub lut: Arc<Lut3d>,
    pub intensity: f32,
}

impl LutSlot {
    pub fn new(lut: Lut3d, intensity: f32) -> Self {
        Self {
            lut: Arc::new(lut),
            intensity: intensity.clamp(0.0, 1.0),
        }
    }
}

/// The edit recipe: the only persisted and undoable state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ParameterSet {
    pub inverted: bool,
    pub inversion_mode: InversionMode,
    pub source_type: SourceType,

    pub exposure: f32,
    pub contrast: f32,
    pub highlights: f32,
    pub shadows: f32,
    pub whites: f32,
    pub blacks: f32,

    pub temp: f32,
    pub tint: f32,
    pub red: f32,
    pub green: f32,
    pub blue: f32,

    /// Free rotation in degrees.
    pub rotation: f32,
    pub orientation: Orientation,
    /// EXIF compensation, degrees.
    pub rotation_offset: f32,
    crop_rect: CropRect,

    pub curves: Curves,
    pub hsl_params: HslParams,
    pub split_toning: SplitToning,

    pub film_curve_enabled: bool,
    pub film_curve_profile: String,

    pub lut1: Option<LutSlot>,
    pub lut2: Option<LutSlot>,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            inverted: false,
            inversion_mode: InversionMode::Linear,
            source_type: SourceType::Original,
            exposure: 0.0,
            contrast: 0.0,
            highlights: 0.0,
            shadows: 0.0,
            whites: 0.0,
            blacks: 0.0,
            temp: 0.0,
            tint: 0.0,
            red: 1.0,
            green: 1.0,
            blue: 1.0,
            rotation: 0.0,
            orientation: Orientation::Deg0,
            rotation_offset: 0.0,
            crop_rect: CropRect::FULL,
            curves: Curves::default(),
            hsl_params: HslParams::default(),
            split_toning: SplitToning::default(),
            film_curve_enabled: false,
            film_curve_profile: crate::config::DEFAULT_PROFILE_KEY.to_string(),
            lut1: None,
            lut2: None,
        }
    }
}

impl ParameterSet {
    /// A negative scan with inversion switched on.
    pub fn negative() -> Self {
        Self {
            inverted: true,
            source_type: SourceType::Negative,
            ..Self::default()
        }
    }

    pub fn effective_inversion(&self) -> bool {
        effective_inversion(self.source_type, self.inverted)
    }

    /// Switch source type, keeping the inversion flag consistent.
    pub fn set_source_type(&mut self, source_type: SourceType) {
        self.source_type = source_type;
        self.inverted = match source_type {
            SourceType::Positive => false,
            SourceType::Negative => true,
            SourceType::Original => self.inverted,
        };
    }

    /// Rotation + orientation + EXIF offset, in degrees.
    pub fn total_rotation(&self) -> f32 {
        self.rotation + self.orientation.degrees() + self.rotation_offset
    }

    /// The crop rect, re-clamped on every read.
    pub fn crop(&self) -> CropRect {
        self.crop_rect.clamped()
    }

    /// Store a crop rect as given; reads always clamp.
    pub fn set_crop(&mut self, rect: CropRect) {
        self.crop_rect = rect;
    }

    pub fn base_gains(&self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }

    /// Structural fingerprint over every field. Two sets with equal
    /// fingerprints render identically; LUTs contribute their content
    /// digest rather than their payload.
    pub fn fingerprint(&self) -> Fingerprint {
        let crop = self.crop();
        let mut h = blake3::Hasher::new();
        let mut f = |v: f32| {
            h.update(&v.to_le_bytes());
        };
        for v in [
            self.exposure,
            self.contrast,
            self.highlights,
            self.shadows,
            self.whites,
            self.blacks,
            self.temp,
            self.tint,
            self.red,
            self.green,
            self.blue,
            self.rotation,
            self.orientation.degrees(),
            self.rotation_offset,
            crop.x,
            crop.y,
            crop.w,
            crop.h,
            self.split_toning.shadows.hue,
            self.split_toning.shadows.saturation,
            self.split_toning.highlights.hue,
            self.split_toning.highlights.saturation,
            self.split_toning.balance,
        ] {
            f(v);
        }
        for bucket in &self.hsl_params.buckets {
            f(bucket.hue);
            f(bucket.saturation);
            f(bucket.luminance);
        }
        for (tag, curve) in [
            (b'a', &self.curves.rgb),
            (b'r', &self.curves.red),
            (b'g', &self.curves.green),
            (b'b', &self.curves.blue),
        ] {
            h.update(&[tag]);
            h.update(&(curve.len() as u32).to_le_bytes());
            for p in curve {
                h.update(&p.x.to_le_bytes());
                h.update(&p.y.to_le_bytes());
            }
        }
        h.update(&[
            self.inverted as u8,
            self.inversion_mode as u8,
            self.source_type as u8,
            self.film_curve_enabled as u8,
        ]);
        h.update(&(self.film_curve_profile.len() as u32).to_le_bytes());
        h.update(self.film_curve_profile.as_bytes());
        for slot in [&self.lut1, &self.lut2] {
            match slot {
                Some(slot) => {
                    h.update(&[1]);
                    h.update(&slot.lut.digest());
                    h.update(&slot.intensity.to_le_bytes());
                }
                None => {
                    h.update(&[0]);
                }
            }
        }
        Fingerprint(*h.finalize().as_bytes())
    }
}

/// blake3 digest identifying a Parameter Set's rendering-relevant content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_never_inverts() {
        for inverted in [false, true] {
            for mode in [InversionMode::Linear, InversionMode::Log] {
                let p = ParameterSet {
                    inverted,
                    inversion_mode: mode,
                    source_type: SourceType::Positive,
                    ..Default::default()
                };
                assert!(!p.effective_inversion());
            }
        }
    }

    #[test]
    fn negative_and_original_follow_flag() {
        assert!(effective_inversion(SourceType::Negative, true));
        assert!(!effective_inversion(SourceType::Negative, false));
        assert!(effective_inversion(SourceType::Original, true));
    }

    #[test]
    fn set_source_type_keeps_flag_consistent() {
        let mut p = ParameterSet::negative();
        p.set_source_type(SourceType::Positive);
        assert!(!p.inverted);
        p.set_source_type(SourceType::Negative);
        assert!(p.inverted);
    }

    #[test]
    fn crop_clamp_always_valid() {
        let inputs = [
            CropRect { x: -0.5, y: -1.0, w: 3.0, h: 2.0 },
            CropRect { x: 0.9, y: 0.95, w: 0.5, h: 0.5 },
            CropRect { x: 0.2, y: 0.2, w: -0.1, h: 0.0 },
            CropRect { x: 1.5, y: 2.0, w: 1.0, h: 1.0 },
            CropRect { x: f32::NAN, y: 0.0, w: 1.0, h: 1.0 },
            CropRect { x: 0.3, y: 0.1, w: 0.7000001, h: 0.9000001 },
        ];
        for rect in inputs {
            let c = rect.clamped();
            assert!(c.x >= 0.0 && c.y >= 0.0, "{rect:?} -> {c:?}");
            assert!(c.x + c.w <= 1.0, "{rect:?} -> {c:?}");
            assert!(c.y + c.h <= 1.0, "{rect:?} -> {c:?}");
            assert!(c.w > 0.0 && c.h > 0.0, "{rect:?} -> {c:?}");
        }
    }

    #[test]
    fn crop_read_is_clamped() {
        let mut p = ParameterSet::default();
        p.set_crop(CropRect { x: 0.5, y: 0.5, w: 0.8, h: 0.8 });
        let c = p.crop();
        assert!(c.x + c.w <= 1.0 && c.y + c.h <= 1.0);
    }

    #[test]
    fn total_rotation_sums_components() {
        let p = ParameterSet {
            rotation: 12.5,
            orientation: Orientation::Deg90,
            rotation_offset: 180.0,
            ..Default::default()
        };
        assert_eq!(p.total_rotation(), 282.5);
    }

    #[test]
    fn orientation_serializes_as_degrees() {
        let json = serde_json::to_string(&Orientation::Deg270).unwrap();
        assert_eq!(json, "270");
        let o: Orientation = serde_json::from_str("90").unwrap();
        assert_eq!(o, Orientation::Deg90);
        assert!(serde_json::from_str::<Orientation>("45").is_err());
    }

    #[test]
    fn fingerprint_tracks_every_change() {
        let base = ParameterSet::default();
        let fp = base.fingerprint();
        assert_eq!(fp, base.clone().fingerprint());

        let mut changed = base.clone();
        changed.exposure = 1.0;
        assert_ne!(changed.fingerprint(), fp);

        let mut changed = base.clone();
        changed.set_crop(CropRect::centered(0.5));
        assert_ne!(changed.fingerprint(), fp);

        let mut changed = base.clone();
        changed.set_source_type(SourceType::Positive);
        assert_ne!(changed.fingerprint(), fp);

        let mut changed = base.clone();
        changed.curves.red.insert(1, CurvePoint::new(128.0, 140.0));
        assert_ne!(changed.fingerprint(), fp);

        let mut changed = base;
        changed.lut1 = Some(LutSlot::new(Lut3d::identity(2), 0.5));
        assert_ne!(changed.fingerprint(), fp);
    }

    #[test]
    fn fingerprint_uses_effective_crop() {
        let mut a = ParameterSet::default();
        a.set_crop(CropRect {
            x: -0.5,
            y: 0.0,
            w: 3.0,
            h: 1.0,
        });
        let mut b = ParameterSet::default();
        b.set_crop(CropRect {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 2.0,
        });
        assert_eq!(a.crop(), b.crop());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), ParameterSet::default().fingerprint());
    }

    #[test]
    fn clone_shares_lut_payload() {
        let p = ParameterSet {
            lut1: Some(LutSlot::new(Lut3d::identity(17), 1.0)),
            ..Default::default()
        };
        let snapshot = p.clone();
        let a = &p.lut1.as_ref().unwrap().lut;
        let b = &snapshot.lut1.as_ref().unwrap().lut;
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn json_roundtrip_uses_camel_case() {
        let mut p = ParameterSet::negative();
        p.film_curve_enabled = true;
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"filmCurveEnabled\":true"));
        assert!(json.contains("\"sourceType\":\"negative\""));
        let back: ParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
