//! Flat key/value preset documents.
//!
//! Nested groups are flattened into dotted camelCase keys
//! (`cropRect.x`, `splitToning.shadows.hue`); lists stay as JSON
//! arrays. LUT slots are stored as `.cube` text under `lutN.cube` plus
//! `lutN.intensity`.

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value, json};
use tracing::warn;

use super::{LutSlot, ParameterSet};
use crate::lut::Lut3d;

pub type FlatDocument = Map<String, Value>;

const LUT_SLOTS: [&str; 2] = ["lut1", "lut2"];

pub fn to_flat_document(params: &ParameterSet) -> Result<FlatDocument> {
    let Value::Object(mut root) = serde_json::to_value(params).context("encode parameter set")?
    else {
        bail!("parameter set did not encode to an object");
    };
    for key in LUT_SLOTS {
        root.remove(key);
    }

    let mut doc = FlatDocument::new();
    for (key, value) in root {
        flatten(key, value, &mut doc);
    }

    for (key, slot) in LUT_SLOTS.into_iter().zip([&params.lut1, &params.lut2]) {
        if let Some(slot) = slot {
            doc.insert(format!("{key}.cube"), Value::String(slot.lut.to_cube_string()));
            doc.insert(format!("{key}.intensity"), json!(slot.intensity));
        }
    }
    Ok(doc)
}

/// Rebuild a Parameter Set. Missing keys take their defaults and a LUT
/// slot whose cube fails to parse is left empty.
pub fn from_flat_document(doc: &FlatDocument) -> Result<ParameterSet> {
    let mut root = Map::new();
    for (key, value) in doc {
        let is_lut = LUT_SLOTS
            .iter()
            .any(|slot| key.strip_prefix(slot).is_some_and(|rest| rest.starts_with('.')));
        if !is_lut {
            insert_path(&mut root, key, value.clone());
        }
    }

    let mut params: ParameterSet =
        serde_json::from_value(Value::Object(root)).context("decode preset document")?;
    params.lut1 = read_slot(doc, LUT_SLOTS[0]);
    params.lut2 = read_slot(doc, LUT_SLOTS[1]);
    Ok(params)
}

fn flatten(key: String, value: Value, out: &mut FlatDocument) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                flatten(format!("{key}.{k}"), v, out);
            }
        }
        other => {
            out.insert(key, other);
        }
    }
}

fn insert_path(root: &mut Map<String, Value>, key: &str, value: Value) {
    let mut parts = key.split('.').peekable();
    let mut node = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            node.insert(part.to_string(), value);
            return;
        }
        let entry = node
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else { return };
        node = next;
    }
}

fn read_slot(doc: &FlatDocument, key: &str) -> Option<LutSlot> {
    let cube = doc.get(&format!("{key}.cube"))?;
    let Some(text) = cube.as_str() else {
        warn!(slot = key, "LUT slot is not cube text, leaving it empty");
        return None;
    };
    let intensity = doc
        .get(&format!("{key}.intensity"))
        .and_then(Value::as_f64)
        .unwrap_or(1.0) as f32;
    match Lut3d::parse_cube(text) {
        Ok(lut) => Some(LutSlot::new(lut, intensity)),
        Err(err) => {
            warn!(slot = key, %err, "rejecting malformed LUT");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{CropRect, CurvePoint, InversionMode};

    fn edited() -> ParameterSet {
        let mut p = ParameterSet::negative();
        p.inversion_mode = InversionMode::Log;
        p.exposure = 12.0;
        p.temp = -8.5;
        p.set_crop(CropRect::centered(0.5));
        p.curves.rgb.insert(1, CurvePoint::new(64.0, 80.0));
        p.hsl_params.buckets[5].saturation = -40.0;
        p.split_toning.shadows.hue = 210.0;
        p.split_toning.shadows.saturation = 25.0;
        p.film_curve_enabled = true;
        p.film_curve_profile = "portra400".into();
        p
    }

    #[test]
    fn keys_are_flat_and_dotted() {
        let doc = to_flat_document(&edited()).unwrap();
        assert_eq!(doc["cropRect.w"], json!(0.5));
        assert_eq!(doc["splitToning.shadows.hue"], json!(210.0));
        assert_eq!(doc["inversionMode"], json!("log"));
        assert!(doc["curves.rgb"].is_array());
        assert!(doc.values().all(|v| !v.is_object()), "nested object left in {doc:?}");
        assert!(!doc.contains_key("lut1"));
    }

    #[test]
    fn roundtrip_restores_parameters() {
        let p = edited();
        let back = from_flat_document(&to_flat_document(&p).unwrap()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let mut doc = FlatDocument::new();
        doc.insert("exposure".into(), json!(20.0));
        doc.insert("cropRect.x".into(), json!(0.25));
        let p = from_flat_document(&doc).unwrap();
        assert_eq!(p.exposure, 20.0);
        assert_eq!(p.crop().x, 0.25);
        assert_eq!(p.contrast, 0.0);
        assert_eq!(p.red, 1.0);
    }

    #[test]
    fn lut_slots_roundtrip_as_cube_text() {
        let mut p = ParameterSet::default();
        p.lut2 = Some(LutSlot::new(Lut3d::identity(3), 0.4));
        let doc = to_flat_document(&p).unwrap();
        assert!(doc["lut2.cube"].as_str().unwrap().starts_with("LUT_3D_SIZE 3"));
        let back = from_flat_document(&doc).unwrap();
        let slot = back.lut2.expect("lut2 restored");
        assert_eq!(slot.lut.size(), 3);
        assert!((slot.intensity - 0.4).abs() < 1e-6);
        assert!(back.lut1.is_none());
    }

    #[test]
    fn malformed_cube_rejects_only_its_slot() {
        let mut p = edited();
        p.lut1 = Some(LutSlot::new(Lut3d::identity(2), 1.0));
        p.lut2 = Some(LutSlot::new(Lut3d::identity(2), 0.7));
        let mut doc = to_flat_document(&p).unwrap();
        doc.insert("lut1.cube".into(), json!("LUT_3D_SIZE 2\n0 0 0\n"));

        let back = from_flat_document(&doc).unwrap();
        assert!(back.lut1.is_none());
        assert!(back.lut2.is_some());
        assert_eq!(back.exposure, p.exposure);
        assert_eq!(back.crop(), p.crop());
    }

    #[test]
    fn wrong_field_type_is_an_error() {
        let mut doc = FlatDocument::new();
        doc.insert("exposure".into(), json!("bright"));
        assert!(from_flat_document(&doc).is_err());
    }
}
