//! Per-channel RGB histogram comparison using the Bhattacharyya coefficient.

use super::unit;
use crate::core_modules::pixel_buffer::PixelBuffer;

const BINS: usize = 256;

/// Normalized R, G and B histograms of one buffer.
#[derive(Debug, Clone)]
pub struct ChannelHistograms {
    pub red: [f64; BINS],
    pub green: [f64; BINS],
    pub blue: [f64; BINS],
}

impl ChannelHistograms {
    pub fn of(buffer: &PixelBuffer) -> Self {
        let mut red = [0.0; BINS];
        let mut green = [0.0; BINS];
        let mut blue = [0.0; BINS];
        for pixel in buffer.pixels() {
            red[pixel.red as usize] += 1.0;
            green[pixel.green as usize] += 1.0;
            blue[pixel.blue as usize] += 1.0;
        }
        let total = buffer.pixel_count() as f64;
        for bin in red.iter_mut().chain(green.iter_mut()).chain(blue.iter_mut()) {
            *bin /= total;
        }
        Self { red, green, blue }
    }

    /// Bhattacharyya coefficient against another set, averaged over channels.
    pub fn similarity(&self, other: &ChannelHistograms) -> f64 {
        let coefficient = (bhattacharyya(&self.red, &other.red)
            + bhattacharyya(&self.green, &other.green)
            + bhattacharyya(&self.blue, &other.blue))
            / 3.0;
        unit(coefficient)
    }
}

fn bhattacharyya(a: &[f64; BINS], b: &[f64; BINS]) -> f64 {
    a.iter().zip(b.iter()).map(|(p, q)| (p * q).sqrt()).sum()
}

/// Mean Bhattacharyya coefficient over the three color channels.
/// 1.0 for identical distributions, 0.0 for disjoint ones.
pub fn histogram_similarity(a: &PixelBuffer, b: &PixelBuffer) -> f64 {
    ChannelHistograms::of(a).similarity(&ChannelHistograms::of(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;

    #[test]
    fn disjoint_histograms_score_zero() {
        let black = PixelBuffer::filled(16, 16, Pixel::gray(0)).unwrap();
        let white = PixelBuffer::filled(16, 16, Pixel::gray(255)).unwrap();
        assert_eq!(histogram_similarity(&black, &white), 0.0);
    }

    #[test]
    fn half_overlap_scores_between() {
        let gray = PixelBuffer::filled(16, 16, Pixel::gray(100)).unwrap();
        let half = gray.with_rect(0, 0, 16, 8, Pixel::gray(200));
        let score = histogram_similarity(&gray, &half);
        // sqrt(1.0 * 0.5) per channel.
        assert!((score - 0.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn identical_buffers_score_one() {
        let gray = PixelBuffer::filled(16, 16, Pixel::new(10, 200, 30, 255)).unwrap();
        assert!((histogram_similarity(&gray, &gray) - 1.0).abs() < 1e-9);
    }
}
