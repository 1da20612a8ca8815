use std::path::Path;

use anyhow::{Context, Result};
use filmlab_core::params::{FlatDocument, from_flat_document};
use filmlab_core::{ImageBuf, ParameterSet};
use image::{DynamicImage, RgbaImage};

pub fn load_image(path: &Path) -> Result<ImageBuf> {
    let img = image::open(path)
        .with_context(|| format!("failed to open image: {}", path.display()))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    ImageBuf::from_data(w, h, img.into_raw())
}

/// Save by extension. JPEG has no alpha, so transparent corners from a
/// rotation are flattened to black there.
pub fn save_image(buf: &ImageBuf, path: &Path) -> Result<()> {
    let rgba = RgbaImage::from_raw(buf.width, buf.height, buf.data.clone())
        .context("image buffer size does not match its dimensions")?;
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    let result = if is_jpeg {
        DynamicImage::ImageRgba8(rgba).into_rgb8().save(path)
    } else {
        rgba.save(path)
    };
    result.with_context(|| format!("failed to save image: {}", path.display()))
}

pub fn load_preset(path: Option<&Path>) -> Result<ParameterSet> {
    let Some(path) = path else {
        return Ok(ParameterSet::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read preset: {}", path.display()))?;
    let doc: FlatDocument = serde_json::from_str(&text)
        .with_context(|| format!("parse preset: {}", path.display()))?;
    from_flat_document(&doc)
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))
}
