use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use crate::detector::DetectionRequest;
use crate::error::DetectionError;
use crate::geometry::NormalizedBox;
use crate::legacy::{FeatureBounds, FeatureSource};

/// Face detector backed by the `rustface` crate (SeetaFace engine).
///
/// Serves both backends: as a [`DetectionRequest`] for
/// [`crate::VisionDetector`] and as a [`FeatureSource`] for
/// [`crate::FeatureDetector`]. The SeetaFace model is not bundled; load it
/// with [`RustfaceDetector::from_path`] or [`RustfaceDetector::from_reader`].
#[derive(Clone)]
pub struct RustfaceDetector {
    model: rustface::Model,
    min_face_size: u32,
    score_thresh: f64,
}

/// Top-left-origin pixel box as reported by SeetaFace.
struct FaceBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl RustfaceDetector {
    /// Load a SeetaFace model from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DetectionError> {
        let model =
            rustface::read_model(reader).map_err(|e| DetectionError::ModelLoad(e.to_string()))?;
        Ok(Self {
            model,
            min_face_size: 20,
            score_thresh: 2.0,
        })
    }

    /// Load a SeetaFace model file, e.g. `seeta_fd_frontal_v1.0.bin`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DetectionError::ModelLoad(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "loading SeetaFace model");
        Self::from_reader(BufReader::new(file))
    }

    /// Smallest face edge, in pixels, the detector looks for (default: 20).
    pub fn min_face_size(mut self, size: u32) -> Self {
        self.min_face_size = size;
        self
    }

    /// Minimum classifier score for a face to be reported (default: 2.0).
    pub fn score_threshold(mut self, threshold: f64) -> Self {
        self.score_thresh = threshold;
        self
    }

    fn detect_faces(&self, image: &DynamicImage) -> Vec<FaceBox> {
        let gray = image::imageops::grayscale(image);
        let (width, height) = (gray.width(), gray.height());

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_thresh);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));
        debug!(faces = faces.len(), width, height, "rustface pass finished");

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBox {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                }
            })
            .collect()
    }
}

impl DetectionRequest for RustfaceDetector {
    fn perform(&self, image: &DynamicImage) -> Result<Vec<NormalizedBox>, DetectionError> {
        let (width, height) = (image.width(), image.height());
        Ok(self
            .detect_faces(image)
            .into_iter()
            .map(|f| NormalizedBox::from_top_left_pixels(f.x, f.y, f.width, f.height, width, height))
            .collect())
    }
}

impl FeatureSource for RustfaceDetector {
    fn face_features(&self, image: &DynamicImage) -> Result<Vec<FeatureBounds>, DetectionError> {
        let height = image.height() as f64;
        Ok(self
            .detect_faces(image)
            .into_iter()
            .map(|f| FeatureBounds {
                x: f.x,
                y: height - (f.y + f.height),
                width: f.width,
                height: f.height,
            })
            .collect())
    }
}
