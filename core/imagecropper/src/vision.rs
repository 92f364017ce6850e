use std::collections::HashMap;

use image::DynamicImage;
use tracing::debug;

use crate::detector::{DetectionKind, DetectionRequest, Detector};
use crate::error::DetectionError;
use crate::geometry::NormalizedBox;

/// Request-based detection backend.
///
/// Holds one [`DetectionRequest`] per [`DetectionKind`]. Kinds without a
/// registered request are rejected with [`DetectionError::UnsupportedKind`].
#[derive(Default)]
pub struct VisionDetector {
    requests: HashMap<DetectionKind, Box<dyn DetectionRequest>>,
}

impl VisionDetector {
    /// Backend name reported in logs and errors.
    pub const NAME: &'static str = "vision";

    /// An empty detector with no requests registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `request` for `kind`, replacing any previous one.
    pub fn with_request(mut self, kind: DetectionKind, request: impl DetectionRequest + 'static) -> Self {
        self.register(kind, Box::new(request));
        self
    }

    /// Register `request` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: DetectionKind, request: Box<dyn DetectionRequest>) {
        debug!(kind = %kind, "registered vision request");
        self.requests.insert(kind, request);
    }

    /// Kinds this detector can serve, in [`DetectionKind::ALL`] order.
    pub fn kinds(&self) -> Vec<DetectionKind> {
        DetectionKind::ALL
            .into_iter()
            .filter(|kind| self.requests.contains_key(kind))
            .collect()
    }

    /// True when no request is registered.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Detector for VisionDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports(&self, kind: DetectionKind) -> bool {
        self.requests.contains_key(&kind)
    }

    fn detect(
        &self,
        image: &DynamicImage,
        kind: DetectionKind,
    ) -> Result<Vec<NormalizedBox>, DetectionError> {
        let request = self
            .requests
            .get(&kind)
            .ok_or(DetectionError::UnsupportedKind {
                kind,
                backend: Self::NAME,
            })?;
        request.perform(image)
    }
}
