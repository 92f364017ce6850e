use std::fmt;

use image::DynamicImage;

use crate::error::DetectionError;
use crate::geometry::NormalizedBox;

/// Category of object to locate in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum DetectionKind {
    /// Human faces.
    #[default]
    Face,
    /// Barcodes and QR codes.
    Barcode,
    /// Blocks of text.
    Text,
    /// Generic quadrilaterals such as documents or signs.
    Rectangle,
}

impl DetectionKind {
    /// Every kind, in declaration order.
    pub const ALL: [DetectionKind; 4] = [
        DetectionKind::Face,
        DetectionKind::Barcode,
        DetectionKind::Text,
        DetectionKind::Rectangle,
    ];

    /// Lowercase name used in logs and option strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionKind::Face => "face",
            DetectionKind::Barcode => "barcode",
            DetectionKind::Text => "text",
            DetectionKind::Rectangle => "rectangle",
        }
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "face" => Ok(DetectionKind::Face),
            "barcode" => Ok(DetectionKind::Barcode),
            "text" => Ok(DetectionKind::Text),
            "rectangle" => Ok(DetectionKind::Rectangle),
            _ => Err(format!("unknown detection kind: {s}")),
        }
    }
}

/// Pluggable detection backend.
///
/// Implement this trait to hand the cropper any detection engine and pass
/// it to [`crate::ImageCropper::detector`]. Boxes are returned in detector
/// order; the cropper preserves that order in its output.
pub trait Detector: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Whether this backend can serve `kind` at all.
    fn supports(&self, kind: DetectionKind) -> bool;

    /// Locate every object of `kind` in `image`.
    fn detect(
        &self,
        image: &DynamicImage,
        kind: DetectionKind,
    ) -> Result<Vec<NormalizedBox>, DetectionError>;
}

/// A single detection routine for one kind, run by [`crate::VisionDetector`].
pub trait DetectionRequest: Send + Sync {
    /// Run the request against `image`.
    fn perform(&self, image: &DynamicImage) -> Result<Vec<NormalizedBox>, DetectionError>;
}

impl<F> DetectionRequest for F
where
    F: Fn(&DynamicImage) -> Result<Vec<NormalizedBox>, DetectionError> + Send + Sync,
{
    fn perform(&self, image: &DynamicImage) -> Result<Vec<NormalizedBox>, DetectionError> {
        self(image)
    }
}
