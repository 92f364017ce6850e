//! Crop faces, barcodes, text blocks and rectangles out of images.
//!
//! Detection is delegated to a [`Detector`] backend; this crate turns the
//! normalized boxes it reports into padded, clamped pixel regions and
//! sub-images.
//!
//! # Example
//!
//! ```no_run
//! use imagecropper::{CropResult, DetectionKind, ImageCropper, Padding};
//!
//! let raw_bytes = std::fs::read("group.jpg").unwrap();
//! let result = ImageCropper::from_bytes(&raw_bytes)
//!     .unwrap()
//!     .padding(Padding::uniform(10.0))
//!     .unwrap()
//!     .crop(DetectionKind::Face);
//!
//! match result {
//!     CropResult::Success(regions) => println!("found {} faces", regions.len()),
//!     CropResult::NotFound { .. } => println!("no faces"),
//!     CropResult::Failure { error, .. } => eprintln!("detection failed: {error}"),
//! }
//! ```
#![warn(missing_docs)]

/// Backend selection.
pub mod backend;
#[cfg(feature = "barcode")]
mod barcode;
mod crop;
/// Detection traits and the detection kind enum.
pub mod detector;
mod encode;
mod error;
/// Normalized-box to pixel-rectangle conversion.
pub mod geometry;
mod legacy;
#[cfg(feature = "rectangle")]
mod rectangle;
#[cfg(feature = "face-detection")]
mod rustface_backend;
mod vision;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, warn};

pub use backend::{
    cached_detector, select_detector, Backend, BackendConfig, DetectorCache, FACE_MODEL_ENV,
};
#[cfg(feature = "barcode")]
/// QR code locator for the vision backend.
pub use barcode::BarcodesRequest;
/// Crop a list of boxes out of an image without running a detector.
pub use crop::crop_regions;
pub use detector::{DetectionKind, DetectionRequest, Detector};
/// Output encodings for cropped regions.
pub use encode::OutputFormat;
/// Error types returned by imagecropper operations.
pub use error::{CropError, DetectionError};
pub use geometry::{CropRect, CropRegion, NormalizedBox, Padding};
/// Face-only fallback backend and its engine trait.
pub use legacy::{FeatureBounds, FeatureDetector, FeatureSource};
#[cfg(feature = "rectangle")]
/// Quadrilateral finder for the vision backend.
pub use rectangle::RectanglesRequest;
#[cfg(feature = "face-detection")]
/// SeetaFace-based face detector usable by both backends.
pub use rustface_backend::RustfaceDetector;
/// Request-based detection backend.
pub use vision::VisionDetector;

/// One cropped object.
#[derive(Debug, Clone)]
pub struct CroppedRegion {
    /// The cropped pixels.
    pub image: DynamicImage,

    /// Where the crop was taken from in the source image.
    pub region: CropRegion,
}

impl CroppedRegion {
    /// Encode the cropped pixels for storage or display.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, CropError> {
        encode::encode_image(&self.image, format)
    }
}

/// Outcome of a detect-and-crop operation.
#[derive(Debug)]
pub enum CropResult {
    /// One region per detected object, in detector order.
    Success(Vec<CroppedRegion>),

    /// The detector found nothing inside the image.
    NotFound {
        /// The untouched source image.
        image: DynamicImage,
        /// The full-image rectangle.
        rect: CropRegion,
    },

    /// The detector reported an error.
    Failure {
        /// The untouched source image.
        image: DynamicImage,
        /// The full-image rectangle.
        rect: CropRegion,
        /// The detector's error, unchanged.
        error: DetectionError,
    },
}

impl CropResult {
    /// True for [`CropResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, CropResult::Success(_))
    }

    /// The cropped regions; empty unless the crop succeeded.
    pub fn regions(&self) -> &[CroppedRegion] {
        match self {
            CropResult::Success(regions) => regions,
            _ => &[],
        }
    }

    /// Consume the result, keeping only the cropped regions.
    pub fn into_regions(self) -> Vec<CroppedRegion> {
        match self {
            CropResult::Success(regions) => regions,
            _ => Vec::new(),
        }
    }

    /// The detector error, if the crop failed.
    pub fn error(&self) -> Option<&DetectionError> {
        match self {
            CropResult::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Deserializable crop settings, e.g. from a JSON config file.
///
/// All fields are optional.
#[derive(Debug, Clone, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "camelCase", default)
)]
pub struct CropOptions {
    /// What to detect (default: faces).
    pub kind: DetectionKind,
    /// Padding around every detected box.
    pub padding: Padding,
    /// Force a backend instead of checking availability.
    pub backend: Option<Backend>,
    /// SeetaFace model used for face detection.
    pub face_model: Option<std::path::PathBuf>,
}

/// Builder for detect-and-crop operations on a single image.
///
/// Holds the source image, the padding to apply, and the detector. When no
/// detector is given, the process-wide one for the backend config is used
/// (see [`cached_detector`]); it is selected on the first crop and reused.
pub struct ImageCropper {
    image: DynamicImage,
    padding: Padding,
    detector: Option<Arc<dyn Detector>>,
    backend: Option<BackendConfig>,
}

impl ImageCropper {
    /// Create a cropper for an already decoded image.
    pub fn new(image: DynamicImage) -> Result<Self, CropError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CropError::ZeroDimensions);
        }

        Ok(Self {
            image,
            padding: Padding::ZERO,
            detector: None,
            backend: None,
        })
    }

    /// Create a cropper from encoded image bytes (JPEG, PNG, or WebP).
    pub fn from_bytes(input: &[u8]) -> Result<Self, CropError> {
        Self::new(encode::decode_image(input)?)
    }

    /// Set the padding applied around each detected box (default: none).
    ///
    /// Insets must be finite and non-negative.
    pub fn padding(mut self, padding: Padding) -> Result<Self, CropError> {
        if !padding.is_valid() {
            return Err(CropError::InvalidPadding(padding));
        }
        self.padding = padding;
        Ok(self)
    }

    /// Provide a custom detector implementation.
    ///
    /// ```no_run
    /// use image::DynamicImage;
    /// use imagecropper::{DetectionError, DetectionKind, Detector, ImageCropper, NormalizedBox};
    ///
    /// struct MyDetector;
    /// impl Detector for MyDetector {
    ///     fn name(&self) -> &'static str { "mine" }
    ///     fn supports(&self, kind: DetectionKind) -> bool { kind == DetectionKind::Text }
    ///     fn detect(
    ///         &self,
    ///         _image: &DynamicImage,
    ///         _kind: DetectionKind,
    ///     ) -> Result<Vec<NormalizedBox>, DetectionError> {
    ///         Ok(vec![])
    ///     }
    /// }
    ///
    /// let bytes = std::fs::read("page.png").unwrap();
    /// let result = ImageCropper::from_bytes(&bytes).unwrap()
    ///     .detector(MyDetector)
    ///     .crop(DetectionKind::Text);
    /// ```
    pub fn detector(self, detector: impl Detector + 'static) -> Self {
        self.shared_detector(Arc::new(detector))
    }

    /// Use a detector shared with other croppers.
    pub fn shared_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Configure backend selection used when no detector is set.
    ///
    /// Defaults to [`BackendConfig::from_env`], read once per process.
    pub fn backend_config(mut self, config: BackendConfig) -> Self {
        self.backend = Some(config);
        self
    }

    /// Apply deserialized [`CropOptions`], returning the kind to crop.
    pub fn options(mut self, options: &CropOptions) -> Result<(Self, DetectionKind), CropError> {
        if options.face_model.is_some() || options.backend.is_some() {
            let backend = self
                .backend
                .get_or_insert_with(|| backend::env_config().clone());
            if let Some(path) = &options.face_model {
                backend.face_model = Some(path.clone());
            }
            if options.backend.is_some() {
                backend.prefer = options.backend;
            }
        }
        let cropper = self.padding(options.padding)?;
        Ok((cropper, options.kind))
    }

    /// Detect objects of `kind` and crop them out.
    ///
    /// A panicking detector is reported as [`DetectionError::Panicked`].
    pub fn crop(self, kind: DetectionKind) -> CropResult {
        let detection = match &self.detector {
            Some(detector) => run_detector(detector.as_ref(), &self.image, kind),
            None => {
                let config = self.backend.as_ref().unwrap_or_else(|| backend::env_config());
                cached_detector(config)
                    .and_then(|detector| run_detector(detector.as_ref(), &self.image, kind))
            }
        };
        crop::extract(self.image, detection, self.padding)
    }

    /// Run [`ImageCropper::crop`] on tokio's blocking pool.
    ///
    /// Must be awaited inside a tokio runtime.
    #[cfg(feature = "async")]
    pub async fn crop_async(self, kind: DetectionKind) -> Result<CropResult, CropError> {
        tokio::task::spawn_blocking(move || self.crop(kind))
            .await
            .map_err(|e| CropError::TaskFailed(e.to_string()))
    }

    /// Run [`ImageCropper::crop`] on a new thread and hand the result to
    /// `completion` once it is ready.
    ///
    /// `completion` runs exactly once, detector panics included. A panic
    /// inside `completion` itself surfaces through the returned handle.
    pub fn crop_with<F>(self, kind: DetectionKind, completion: F) -> std::thread::JoinHandle<()>
    where
        F: FnOnce(CropResult) + Send + 'static,
    {
        std::thread::spawn(move || completion(self.crop(kind)))
    }
}

fn run_detector(
    detector: &dyn Detector,
    image: &DynamicImage,
    kind: DetectionKind,
) -> Result<Vec<NormalizedBox>, DetectionError> {
    debug!(
        backend = detector.name(),
        kind = %kind,
        width = image.width(),
        height = image.height(),
        "running detector"
    );
    panic::catch_unwind(AssertUnwindSafe(|| detector.detect(image, kind))).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(backend = detector.name(), %message, "detector panicked");
        Err(DetectionError::Panicked(message))
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
