use crate::color::luma;

pub const NUM_BINS: usize = 256;

/// Raw per-channel counts, accumulated while rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramCounts {
    pub r: [u32; NUM_BINS],
    pub g: [u32; NUM_BINS],
    pub b: [u32; NUM_BINS],
    pub y: [u32; NUM_BINS],
}

impl Default for HistogramCounts {
    fn default() -> Self {
        Self {
            r: [0; NUM_BINS],
            g: [0; NUM_BINS],
            b: [0; NUM_BINS],
            y: [0; NUM_BINS],
        }
    }
}

impl HistogramCounts {
    pub fn add(&mut self, [r, g, b]: [u8; 3]) {
        self.r[r as usize] += 1;
        self.g[g as usize] += 1;
        self.b[b as usize] += 1;
        self.y[luma_bin(r, g, b)] += 1;
    }

    pub fn merge(mut self, other: &Self) -> Self {
        for (dst, src) in [
            (&mut self.r, &other.r),
            (&mut self.g, &other.g),
            (&mut self.b, &other.b),
            (&mut self.y, &other.y),
        ] {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
        self
    }

    pub fn total(&self) -> u64 {
        self.r.iter().map(|&c| c as u64).sum()
    }

    /// Every channel scaled to its own peak.
    pub fn normalized(&self) -> Histograms {
        Histograms {
            r: normalize(&self.r),
            g: normalize(&self.g),
            b: normalize(&self.b),
            y: normalize(&self.y),
        }
    }
}

/// Count every `stride`-th opaque pixel of an RGBA buffer. A stride of 0
/// is treated as 1.
pub fn accumulate(pixels: &[u8], stride: usize) -> HistogramCounts {
    let mut counts = HistogramCounts::default();
    for px in pixels.chunks_exact(4).step_by(stride.max(1)) {
        if px[3] != 0 {
            counts.add([px[0], px[1], px[2]]);
        }
    }
    counts
}

/// Four histograms, each in [0,1] relative to its own peak.
#[derive(Clone, Debug, PartialEq)]
pub struct Histograms {
    pub r: [f32; NUM_BINS],
    pub g: [f32; NUM_BINS],
    pub b: [f32; NUM_BINS],
    pub y: [f32; NUM_BINS],
}

impl Default for Histograms {
    fn default() -> Self {
        Self {
            r: [0.0; NUM_BINS],
            g: [0.0; NUM_BINS],
            b: [0.0; NUM_BINS],
            y: [0.0; NUM_BINS],
        }
    }
}

impl Histograms {
    pub fn from_rgba(pixels: &[u8], stride: usize) -> Self {
        accumulate(pixels, stride).normalized()
    }

    pub fn channels(&self) -> [&[f32; NUM_BINS]; 4] {
        [&self.r, &self.g, &self.b, &self.y]
    }
}

fn luma_bin(r: u8, g: u8, b: u8) -> usize {
    luma(r as f32, g as f32, b as f32).round().clamp(0.0, 255.0) as usize
}

fn normalize(counts: &[u32; NUM_BINS]) -> [f32; NUM_BINS] {
    let peak = counts.iter().copied().max().unwrap_or(0);
    if peak == 0 {
        return [0.0; NUM_BINS];
    }
    counts.map(|c| c as f32 / peak as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(pixels: &[[u8; 4]]) -> Vec<u8> {
        pixels.iter().flatten().copied().collect()
    }

    #[test]
    fn each_channel_peaks_at_one() {
        let data = rgba(&[
            [10, 200, 30, 255],
            [10, 100, 30, 255],
            [10, 100, 40, 255],
            [20, 100, 40, 255],
        ]);
        let h = Histograms::from_rgba(&data, 1);
        assert_eq!(h.r[10], 1.0);
        assert!((h.r[20] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(h.g[100], 1.0);
        assert!((h.g[200] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(h.b[30], 1.0);
        assert_eq!(h.b[40], 1.0);
        for channel in h.channels() {
            let peak = channel.iter().copied().fold(0.0_f32, f32::max);
            assert_eq!(peak, 1.0);
        }
    }

    #[test]
    fn luminance_uses_rec601_weights() {
        let data = rgba(&[[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]);
        let counts = accumulate(&data, 1);
        assert_eq!(counts.y[76], 1);
        assert_eq!(counts.y[150], 1);
        assert_eq!(counts.y[29], 1);
    }

    #[test]
    fn transparent_pixels_are_skipped() {
        let data = rgba(&[[0, 0, 0, 0], [0, 0, 0, 0], [50, 50, 50, 255]]);
        let counts = accumulate(&data, 1);
        assert_eq!(counts.total(), 1);
        assert_eq!(counts.r[50], 1);
        assert_eq!(counts.r[0], 0);
    }

    #[test]
    fn stride_subsamples() {
        let data = rgba(&[[1, 1, 1, 255]; 10]);
        assert_eq!(accumulate(&data, 1).total(), 10);
        assert_eq!(accumulate(&data, 4).total(), 3);
        assert_eq!(accumulate(&data, 0).total(), 10);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let h = Histograms::from_rgba(&[], 1);
        assert_eq!(h, Histograms::default());
    }

    #[test]
    fn merge_adds_counts() {
        let a = accumulate(&rgba(&[[5, 6, 7, 255]]), 1);
        let b = accumulate(&rgba(&[[5, 9, 7, 255]]), 1);
        let m = a.merge(&b);
        assert_eq!(m.r[5], 2);
        assert_eq!(m.g[6], 1);
        assert_eq!(m.g[9], 1);
        assert_eq!(m.total(), 2);
    }
}
