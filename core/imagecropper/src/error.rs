use crate::detector::DetectionKind;
use thiserror::Error;

/// Errors raised while building a cropper or encoding its output.
#[derive(Debug, Error)]
pub enum CropError {
    /// Input bytes are not a supported image.
    #[error("failed to decode image: {0}")]
    DecodeError(String),

    /// Width or height is zero.
    #[error("image dimensions are zero")]
    ZeroDimensions,

    /// Padding with a negative or non-finite inset.
    #[error("padding must be finite and non-negative, got {0:?}")]
    InvalidPadding(crate::Padding),

    /// The encoder rejected the cropped pixels.
    #[error("failed to encode image: {0}")]
    EncodeError(String),

    /// JPEG quality outside `0.0..=1.0`.
    #[error("quality must be between 0.0 and 1.0, got {0}")]
    InvalidQuality(f32),

    /// The async worker panicked or was cancelled.
    #[error("crop task did not complete: {0}")]
    TaskFailed(String),
}

/// Errors reported by a detection backend.
///
/// These are handed back to the caller untouched inside
/// [`crate::CropResult::Failure`].
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The backend has no way to detect this kind.
    #[error("{backend} backend cannot detect {kind}")]
    UnsupportedKind {
        /// The requested kind.
        kind: DetectionKind,
        /// Name of the backend that refused it.
        backend: &'static str,
    },

    /// Neither backend can run in this build or configuration.
    #[error("no detection backend is available")]
    NoBackend,

    /// A model file could not be read or parsed.
    #[error("failed to load detection model: {0}")]
    ModelLoad(String),

    /// The engine ran and reported a failure.
    #[error("detection failed: {0}")]
    Backend(String),

    /// The detector panicked; the payload message is kept.
    #[error("detector panicked: {0}")]
    Panicked(String),

    /// Any other engine error, passed through unchanged.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
