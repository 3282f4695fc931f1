// THEORY:
// The `Chunk` module represents a rectangular block of luminance samples cut from a
// canonical buffer. It is the unit of regional analysis for the surface metrics:
// texture energy works on 8x8 chunks, local variance on 16x16 chunks.
//
// Key architectural principles:
// 1.  **Spatial Pooling**: summarising a block (mean, variance, contrast) instead of
//     individual pixels cancels single-pixel sensor noise and keeps the surface
//     metrics cheap.
// 2.  **Data Container**: like `Pixel`, a `Chunk` is "dumb". It holds its samples and
//     knows how to summarise itself. It never compares itself to another chunk;
//     that is the metric's job.
// 3.  **Tiling**: `tile` cuts a buffer into non-overlapping blocks, dropping a partial
//     last row or column so every chunk has the same sample count.

pub mod chunk {
    use crate::core_modules::pixel_buffer::PixelBuffer;

    /// A block of luminance samples, row-major.
    pub struct Chunk {
        pub width: u32,
        pub height: u32,
        pub samples: Vec<f64>,
    }

    impl Chunk {
        pub fn new(width: u32, height: u32, samples: Vec<f64>) -> Self {
            Self {
                width,
                height,
                samples,
            }
        }

        /// Extracts the `size` x `size` block whose top-left corner is (x, y).
        pub fn extract(buffer: &PixelBuffer, x: u32, y: u32, size: u32) -> Self {
            let mut samples = Vec::with_capacity((size * size) as usize);
            for py in y..y + size {
                for px in x..x + size {
                    samples.push(buffer.luminance(px, py));
                }
            }
            Self::new(size, size, samples)
        }

        /// Cuts `buffer` into non-overlapping `size` x `size` chunks.
        pub fn tile(buffer: &PixelBuffer, size: u32) -> Vec<Chunk> {
            if size == 0 {
                return Vec::new();
            }
            let mut chunks = Vec::new();
            let mut y = 0;
            while y + size <= buffer.height() {
                let mut x = 0;
                while x + size <= buffer.width() {
                    chunks.push(Self::extract(buffer, x, y, size));
                    x += size;
                }
                y += size;
            }
            chunks
        }

        pub fn mean(&self) -> f64 {
            if self.samples.is_empty() {
                return 0.0;
            }
            self.samples.iter().sum::<f64>() / self.samples.len() as f64
        }

        /// Population variance of the samples.
        pub fn variance(&self) -> f64 {
            if self.samples.is_empty() {
                return 0.0;
            }
            let mean = self.mean();
            self.samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.samples.len() as f64
        }

        /// Brightest minus darkest sample.
        pub fn contrast(&self) -> f64 {
            let (min, max) = self
                .samples
                .iter()
                .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            if self.samples.is_empty() { 0.0 } else { max - min }
        }

        /// 1 / (1 + mean |horizontal neighbour difference|). 1.0 for a flat block.
        pub fn homogeneity(&self) -> f64 {
            let w = self.width as usize;
            if w < 2 || self.samples.is_empty() {
                return 1.0;
            }
            let mut total = 0.0;
            let mut count = 0usize;
            for row in self.samples.chunks(w) {
                for pair in row.windows(2) {
                    total += (pair[0] - pair[1]).abs();
                    count += 1;
                }
            }
            if count == 0 {
                return 1.0;
            }
            1.0 / (1.0 + total / count as f64)
        }
    }
}
