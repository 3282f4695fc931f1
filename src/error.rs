// THEORY:
// Every failure this engine can produce is local and recoverable. The worst case is
// "this image could not be read" or "this category cannot be evaluated this pass",
// so there is a single error enum and no fatal class. Decoding is split into two
// variants because callers treat a corrupt payload differently from a format the
// decoder simply does not support.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InspectionError>;

#[derive(Debug, Error)]
pub enum InspectionError {
    /// The payload is not a valid image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The payload was recognised but pixel data could not be extracted.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("pixel buffer length mismatch: expected {expected} bytes, got {actual}")]
    InvalidBuffer { expected: usize, actual: usize },

    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),

    #[error("threshold {value} for {category} is outside [0.30, 0.90]")]
    InvalidThreshold {
        category: crate::core_modules::defect::DefectCategory,
        value: f64,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("comparison pool failure: {0}")]
    WorkerPool(&'static str),
}

impl InspectionError {
    /// Maps an `image` decode failure onto the two decode variants.
    pub fn from_decode(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(inner) => Self::UnsupportedFormat(inner.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }

    pub fn from_encode(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }

    /// True for the two variants that mean "this payload is not a usable image".
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::UnsupportedFormat(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_variants_are_flagged() {
        assert!(InspectionError::Decode("bad".into()).is_decode_failure());
        assert!(InspectionError::UnsupportedFormat("tga".into()).is_decode_failure());
        assert!(!InspectionError::WorkerPool("closed").is_decode_failure());
    }

    #[test]
    fn garbage_bytes_map_to_a_decode_failure() {
        let err = image::load_from_memory(b"definitely not an image").unwrap_err();
        assert!(InspectionError::from_decode(err).is_decode_failure());
    }
}
