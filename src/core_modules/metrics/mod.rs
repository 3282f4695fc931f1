// THEORY:
// The `metrics` module holds the independent pairwise comparison functions. Each one
// takes two canonical buffers and answers "how alike are these, from one angle?" on
// a [0, 1] scale where 1 means identical.
//
// Key architectural principles:
// 1.  **Multiple "Lenses"**: histograms see global color mix, the SSIM approximation
//     sees global structure, Sobel correlation sees edge layout, patches see local
//     pixel agreement and the HSV pass sees color distribution. The surface bundle is
//     a separate family for defects that show up as texture rather than shape.
// 2.  **Symmetry by construction**: every formula is built from commutative pieces
//     (|a-b|, a*b, a+b), so `metric(a, b) == metric(b, a)` holds bit-for-bit.
// 3.  **No NaN escapes**: degenerate inputs (flat images, zero variance, tiny
//     buffers) map to a documented fallback. A NaN in one component would silently
//     poison every fused score after it, so `unit` is the last step of every metric.
// 4.  **Shape tolerance**: metrics are meant for identically shaped canonical buffers
//     but never index past the smaller of the two.

pub mod color;
pub mod edge;
pub mod histogram;
pub mod patch;
pub mod structural;
pub mod surface;

pub use color::color_distribution_similarity;
pub use edge::{edge_similarity, sobel_magnitude_at, sobel_magnitudes};
pub use histogram::histogram_similarity;
pub use patch::patch_similarity;
pub use structural::structural_similarity;
pub use surface::{SurfaceScores, SurfaceSignature};

use crate::core_modules::pixel_buffer::PixelBuffer;

/// Maps any value into [0, 1]; NaN becomes 0.
#[inline]
pub fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// `max(0, 1 - |a - b| / scale)`, the shared difference-to-similarity mapping.
#[inline]
pub fn closeness(a: f64, b: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return if a == b { 1.0 } else { 0.0 };
    }
    unit(1.0 - (a - b).abs() / scale)
}

/// The region both buffers cover.
#[inline]
pub(crate) fn common_extent(a: &PixelBuffer, b: &PixelBuffer) -> (u32, u32) {
    (a.width().min(b.width()), a.height().min(b.height()))
}
