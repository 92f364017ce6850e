//! Picks the detection backend available in this build.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::detector::{DetectionKind, DetectionRequest, Detector};
use crate::error::DetectionError;
#[cfg(not(feature = "face-detection"))]
use crate::geometry::NormalizedBox;
use crate::legacy::{FeatureDetector, FeatureSource};
use crate::vision::VisionDetector;

/// Environment variable holding the path of a SeetaFace model file.
pub const FACE_MODEL_ENV: &str = "IMAGECROPPER_FACE_MODEL";

/// Detection backends shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Backend {
    /// Request-based [`VisionDetector`], one request per kind.
    Vision,
    /// Face-only [`FeatureDetector`].
    Feature,
}

/// Inputs to [`select_detector`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BackendConfig {
    /// SeetaFace model used for face detection.
    pub face_model: Option<PathBuf>,
    /// Force a backend instead of checking availability.
    pub prefer: Option<Backend>,
}

impl BackendConfig {
    /// Read the face model path from [`FACE_MODEL_ENV`].
    pub fn from_env() -> Self {
        Self {
            face_model: std::env::var_os(FACE_MODEL_ENV).map(PathBuf::from),
            prefer: None,
        }
    }
}

/// Environment-derived configuration, read on first use.
static ENV_CONFIG: Lazy<BackendConfig> = Lazy::new(BackendConfig::from_env);

static DETECTORS: Lazy<DetectorCache> = Lazy::new(DetectorCache::default);

/// [`BackendConfig::from_env`] as read the first time it was needed.
pub fn env_config() -> &'static BackendConfig {
    &ENV_CONFIG
}

/// The process-wide detector for `config`, selected on first use.
///
/// Later calls with an equal config share the same detector, so model files
/// are read once per process. Failed selections are not cached.
pub fn cached_detector(config: &BackendConfig) -> Result<Arc<dyn Detector>, DetectionError> {
    DETECTORS.get_or_select(config)
}

/// Detectors keyed by the [`BackendConfig`] that selected them.
#[derive(Default)]
pub struct DetectorCache {
    entries: Mutex<HashMap<BackendConfig, Arc<dyn Detector>>>,
}

impl DetectorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached detector for `config`, running [`select_detector`] on a miss.
    pub fn get_or_select(&self, config: &BackendConfig) -> Result<Arc<dyn Detector>, DetectionError> {
        self.get_or_insert_with(config, select_detector)
    }

    fn get_or_insert_with<F>(
        &self,
        config: &BackendConfig,
        select: F,
    ) -> Result<Arc<dyn Detector>, DetectionError>
    where
        F: FnOnce(&BackendConfig) -> Result<Arc<dyn Detector>, DetectionError>,
    {
        // held across selection so concurrent misses load the model once
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(detector) = entries.get(config) {
            return Ok(detector.clone());
        }
        let detector = select(config)?;
        entries.insert(config.clone(), detector.clone());
        Ok(detector)
    }
}

/// Build the best backend available.
///
/// The vision backend is available when this build compiles in at least one
/// model-free request (`barcode` or `rectangle`); it then also serves faces
/// if the face model loads. Otherwise the feature backend is the fallback
/// and needs a face model. With neither, returns
/// [`DetectionError::NoBackend`].
///
/// Every call selects again and reads the model file; use
/// [`cached_detector`] to select once per process.
pub fn select_detector(config: &BackendConfig) -> Result<Arc<dyn Detector>, DetectionError> {
    #[cfg(feature = "face-detection")]
    let face = load_face_model(config);
    #[cfg(not(feature = "face-detection"))]
    let face: Option<NoFaceModel> = None;

    assemble(builtin_vision(), face, config.prefer)
}

fn assemble<F>(
    mut vision: VisionDetector,
    face: Option<F>,
    prefer: Option<Backend>,
) -> Result<Arc<dyn Detector>, DetectionError>
where
    F: DetectionRequest + FeatureSource + Clone + 'static,
{
    let vision_available = !vision.is_empty();
    let use_vision = match prefer {
        Some(Backend::Vision) => true,
        Some(Backend::Feature) => false,
        None => vision_available || face.is_none(),
    };

    if use_vision {
        if let Some(face) = &face {
            vision.register(DetectionKind::Face, Box::new(face.clone()));
        }
        if vision.is_empty() {
            warn!("no detection backend available");
            return Err(DetectionError::NoBackend);
        }
        debug!(backend = VisionDetector::NAME, kinds = ?vision.kinds(), "selected detection backend");
        return Ok(Arc::new(vision));
    }

    match face {
        Some(face) => {
            debug!(backend = FeatureDetector::NAME, "selected detection backend");
            Ok(Arc::new(FeatureDetector::new(face)))
        }
        None => {
            warn!("no detection backend available");
            Err(DetectionError::NoBackend)
        }
    }
}

/// A [`VisionDetector`] holding every model-free request compiled into this build.
fn builtin_vision() -> VisionDetector {
    #[allow(unused_mut)]
    let mut vision = VisionDetector::new();

    #[cfg(feature = "barcode")]
    {
        vision.register(DetectionKind::Barcode, Box::new(crate::BarcodesRequest));
    }
    #[cfg(feature = "rectangle")]
    {
        vision.register(DetectionKind::Rectangle, Box::new(crate::RectanglesRequest::new()));
    }

    vision
}

#[cfg(feature = "face-detection")]
fn load_face_model(config: &BackendConfig) -> Option<crate::RustfaceDetector> {
    let path = config.face_model.as_ref()?;
    match crate::RustfaceDetector::from_path(path) {
        Ok(detector) => {
            debug!(path = %path.display(), "loaded face model");
            Some(detector)
        }
        Err(error) => {
            warn!(%error, "face model unavailable, face detection disabled");
            None
        }
    }
}

/// Stand-in face engine type for builds without `face-detection`.
#[cfg(not(feature = "face-detection"))]
#[derive(Clone)]
enum NoFaceModel {}

#[cfg(not(feature = "face-detection"))]
impl DetectionRequest for NoFaceModel {
    fn perform(&self, _image: &image::DynamicImage) -> Result<Vec<NormalizedBox>, DetectionError> {
        match *self {}
    }
}

#[cfg(not(feature = "face-detection"))]
impl FeatureSource for NoFaceModel {
    fn face_features(
        &self,
        _image: &image::DynamicImage,
    ) -> Result<Vec<crate::legacy::FeatureBounds>, DetectionError> {
        match *self {}
    }
}
