// THEORY:
// The `SmartBuffer` is a "smart" wrapper around a "dumb" canonical `PixelBuffer`,
// the same split as `Pixel`/`Chunk` vs. the analysers built on them. Its job is to
// make one-to-many comparisons cheap: a frame is compared against every reference of
// every category, and the per-image halves of the metrics (channel histograms, the
// surface signature) do not depend on the other image.
//
// Key architectural principles:
// 1.  **Lazy caching**: derived values are computed on first use through `OnceLock`
//     and reused afterwards. A frame only compared with standard-profile categories
//     never pays for its surface signature.
// 2.  **Shareable**: the buffer sits behind an `Arc` and the caches are write-once,
//     so a `SmartBuffer` can be handed to several comparison workers at once without
//     locks or copies.

use crate::core_modules::metrics::SurfaceSignature;
use crate::core_modules::metrics::histogram::ChannelHistograms;
use crate::core_modules::pixel_buffer::PixelBuffer;
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
pub struct SmartBuffer {
    buffer: Arc<PixelBuffer>,
    histograms: OnceLock<ChannelHistograms>,
    surface: OnceLock<SurfaceSignature>,
}

impl SmartBuffer {
    pub fn new(buffer: PixelBuffer) -> Self {
        Self::shared(Arc::new(buffer))
    }

    pub fn shared(buffer: Arc<PixelBuffer>) -> Self {
        Self {
            buffer,
            histograms: OnceLock::new(),
            surface: OnceLock::new(),
        }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn histograms(&self) -> &ChannelHistograms {
        self.histograms.get_or_init(|| ChannelHistograms::of(&self.buffer))
    }

    pub fn surface(&self) -> &SurfaceSignature {
        self.surface.get_or_init(|| SurfaceSignature::of(&self.buffer))
    }
}

impl From<PixelBuffer> for SmartBuffer {
    fn from(buffer: PixelBuffer) -> Self {
        Self::new(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;

    #[test]
    fn caches_are_computed_once_and_reused() {
        let smart = SmartBuffer::new(PixelBuffer::filled(16, 16, Pixel::gray(210)).unwrap());
        let first = smart.surface() as *const SurfaceSignature;
        let second = smart.surface() as *const SurfaceSignature;
        assert_eq!(first, second);
        assert_eq!(smart.surface().gloss_ratio, 1.0);
        assert_eq!(smart.histograms().red[210], 1.0);
    }
}
