/// 8-bit RGBA image buffer.
///
/// Pixel data is stored as interleaved RGBARGBA... in display-referred
/// (gamma encoded) values, which is what the decode collaborator hands
/// over and what every render produces. Alpha 0 marks pixels that fall
/// outside the rotated source.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuf {
    pub width: u32,
    pub height: u32,
    /// Flat pixel data: [R, G, B, A, R, G, B, A, ...].
    pub data: Vec<u8>,
}

/// Byte length of a `width x height` RGBA buffer, `None` if it does not
/// fit in `usize`.
pub fn rgba_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
}

impl ImageBuf {
    /// A fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; rgba_len(width, height).unwrap_or(usize::MAX)],
        }
    }

    pub fn from_data(width: u32, height: u32, data: Vec<u8>) -> anyhow::Result<Self> {
        let expected = rgba_len(width, height)
            .ok_or_else(|| anyhow::anyhow!("{width}x{height} RGBA does not fit in memory"))?;
        anyhow::ensure!(
            data.len() == expected,
            "expected {expected} bytes for {width}x{height} RGBA, got {}",
            data.len()
        );
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A uniform opaque buffer.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let len = rgba_len(width, height).unwrap_or(usize::MAX);
        let data = [rgb[0], rgb[1], rgb[2], 255]
            .into_iter()
            .cycle()
            .take(len)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Content digest of the pixels and dimensions.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.width.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&self.data);
        *hasher.finalize().as_bytes()
    }
}
