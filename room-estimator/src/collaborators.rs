//! Interfaces to the inference models the analyzer depends on
//!
//! The analyzer never loads models itself; each model is handed in as a
//! trait object so deployments can point at a sidecar service and tests can
//! substitute in-process fakes.

use crate::depth::DepthMap;
use crate::Detection;
use async_trait::async_trait;
use image::{DynamicImage, GrayImage};

/// Object and crack detector.
///
/// Returned boxes are `[x, y, w, h]` in the source image's pixel frame, with
/// crack detections flagged via `is_crack`.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>>;

    /// Get model info
    fn model_info(&self) -> String;
}

/// Monocular relative-depth model; output matches the source resolution
#[async_trait]
pub trait DepthEstimator: Send + Sync {
    async fn estimate_depth(&self, image: &DynamicImage) -> anyhow::Result<DepthMap>;

    fn model_info(&self) -> String;
}

/// Semantic segmentation model; one class id per pixel at any resolution
#[async_trait]
pub trait FloorSegmenter: Send + Sync {
    async fn segment(&self, image: &DynamicImage) -> anyhow::Result<GrayImage>;

    fn model_info(&self) -> String;
}

/// Zero-shot scene classifier; one probability per label, in label order
#[async_trait]
pub trait SceneClassifier: Send + Sync {
    async fn classify(&self, image: &DynamicImage, labels: &[&str]) -> anyhow::Result<Vec<f64>>;

    fn model_info(&self) -> String;
}

/// Stand-in for a model that is not deployed; every call fails, which the
/// analyzer treats as the signal being absent.
#[derive(Debug, Clone)]
pub struct Unavailable {
    name: String,
}

impl Unavailable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn error(&self) -> anyhow::Error {
        anyhow::anyhow!("{} is not configured", self.name)
    }
}

#[async_trait]
impl ObjectDetector for Unavailable {
    async fn detect(&self, _image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        Err(self.error())
    }

    fn model_info(&self) -> String {
        format!("Unavailable ({})", self.name)
    }
}

#[async_trait]
impl DepthEstimator for Unavailable {
    async fn estimate_depth(&self, _image: &DynamicImage) -> anyhow::Result<DepthMap> {
        Err(self.error())
    }

    fn model_info(&self) -> String {
        format!("Unavailable ({})", self.name)
    }
}

#[async_trait]
impl FloorSegmenter for Unavailable {
    async fn segment(&self, _image: &DynamicImage) -> anyhow::Result<GrayImage> {
        Err(self.error())
    }

    fn model_info(&self) -> String {
        format!("Unavailable ({})", self.name)
    }
}

#[async_trait]
impl SceneClassifier for Unavailable {
    async fn classify(&self, _image: &DynamicImage, _labels: &[&str]) -> anyhow::Result<Vec<f64>> {
        Err(self.error())
    }

    fn model_info(&self) -> String {
        format!("Unavailable ({})", self.name)
    }
}
