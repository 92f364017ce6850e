use image::DynamicImage;
use tracing::trace;

use crate::detector::{DetectionKind, Detector};
use crate::error::DetectionError;
use crate::geometry::NormalizedBox;

/// Face feature reported by a [`FeatureSource`].
///
/// Coordinates are pixels with the origin in the bottom-left corner of the
/// image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    /// Left edge.
    pub x: f64,
    /// Bottom edge.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

/// Engine behind the [`FeatureDetector`] backend.
pub trait FeatureSource: Send + Sync {
    /// Locate faces in `image`.
    fn face_features(&self, image: &DynamicImage) -> Result<Vec<FeatureBounds>, DetectionError>;
}

/// Feature-based fallback backend. Only faces are supported.
///
/// Any other kind fails with [`DetectionError::UnsupportedKind`] instead of
/// returning an empty result.
pub struct FeatureDetector {
    source: Box<dyn FeatureSource>,
}

impl FeatureDetector {
    /// Backend name reported in logs and errors.
    pub const NAME: &'static str = "feature";

    /// Wrap a face engine.
    pub fn new(source: impl FeatureSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

impl Detector for FeatureDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports(&self, kind: DetectionKind) -> bool {
        kind == DetectionKind::Face
    }

    fn detect(
        &self,
        image: &DynamicImage,
        kind: DetectionKind,
    ) -> Result<Vec<NormalizedBox>, DetectionError> {
        if !self.supports(kind) {
            return Err(DetectionError::UnsupportedKind {
                kind,
                backend: Self::NAME,
            });
        }

        let (width, height) = (image.width(), image.height());
        let features = self.source.face_features(image)?;
        trace!(count = features.len(), "feature source returned faces");

        Ok(features
            .into_iter()
            .map(|f| NormalizedBox::from_bottom_left_pixels(f.x, f.y, f.width, f.height, width, height))
            .collect())
    }
}
