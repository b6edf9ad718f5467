use crate::aggregator::aggregate_results;
use crate::calibration;
use crate::collaborators::{DepthEstimator, FloorSegmenter, ObjectDetector, SceneClassifier, Unavailable};
use crate::config::AnalyzerConfig;
use crate::depth::summarize_depth;
use crate::error::{EstimatorError, Result};
use crate::estimator::{estimate_spatial, SpatialSignals};
use crate::floor::{estimate_floor_coverage, FloorCoverage};
use crate::fusion::{compare_claimed_area, fuse_room, AreaComparison, FusedRoomEstimate};
use crate::scene::{candidate_prompts, resolve_room_type, RoomTypeEstimate};
use crate::ImageAnalysis;
use futures::future::join_all;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Model handles injected into the analyzer
#[derive(Clone)]
pub struct Collaborators {
    pub detector: Arc<dyn ObjectDetector>,
    pub depth: Arc<dyn DepthEstimator>,
    pub segmenter: Arc<dyn FloorSegmenter>,
    pub classifier: Arc<dyn SceneClassifier>,
}

impl Collaborators {
    /// No models at all; every photo lands in the room-type default tier
    pub fn unavailable() -> Self {
        Self {
            detector: Arc::new(Unavailable::new("object detector")),
            depth: Arc::new(Unavailable::new("depth estimator")),
            segmenter: Arc::new(Unavailable::new("floor segmenter")),
            classifier: Arc::new(Unavailable::new("scene classifier")),
        }
    }
}

/// Per-photo analyses of one room plus their fused estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomReconstruction {
    pub analyses: Vec<ImageAnalysis>,
    pub room: FusedRoomEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_comparison: Option<AreaComparison>,
}

/// Fuse finished analyses. Calibration status is true if any photo resolved a scale.
pub fn summarize_batch(
    analyses: Vec<ImageAnalysis>,
    claimed_area: Option<f64>,
) -> Result<RoomReconstruction> {
    let estimates: Vec<_> = analyses.iter().map(|a| a.spatial.clone()).collect();
    let room = fuse_room(&estimates)?;

    let area_comparison =
        claimed_area.and_then(|claimed| compare_claimed_area(room.spatial.area, claimed));

    Ok(RoomReconstruction {
        analyses,
        room,
        area_comparison,
    })
}

/// Runs the collaborators for a photo and turns their output into a
/// spatial estimate. Never fails on a single photo: missing signals
/// degrade the estimate instead.
pub struct RoomAnalyzer {
    collaborators: Collaborators,
    config: AnalyzerConfig,
}

impl RoomAnalyzer {
    pub fn new(collaborators: Collaborators, config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Room analyzer ready: detector={}, depth={}, segmenter={}, classifier={}",
            collaborators.detector.model_info(),
            collaborators.depth.model_info(),
            collaborators.segmenter.model_info(),
            collaborators.classifier.model_info()
        );

        Ok(Self {
            collaborators,
            config,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze an image on disk; unreadable files give a zeroed result
    pub async fn analyze_image(&self, path: impl AsRef<Path>) -> ImageAnalysis {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(bytes) => self.analyze_image_bytes(&bytes).await,
            Err(e) => {
                warn!("Failed to read image {}: {}", path.display(), e);
                ImageAnalysis::unreadable()
            }
        }
    }

    /// Analyze encoded image bytes (PNG, JPEG)
    pub async fn analyze_image_bytes(&self, bytes: &[u8]) -> ImageAnalysis {
        match image::load_from_memory(bytes) {
            Ok(image) => self.analyze_decoded(image).await,
            Err(e) => {
                warn!("Failed to decode image ({} bytes): {}", bytes.len(), e);
                ImageAnalysis::unreadable()
            }
        }
    }

    pub async fn analyze_decoded(&self, image: DynamicImage) -> ImageAnalysis {
        let span = info_span!("analyze_image", photo = %Uuid::new_v4());
        self.run_analysis(image).instrument(span).await
    }

    /// Photos are independent, so they are analyzed concurrently
    pub async fn analyze_batch<B: AsRef<[u8]>>(&self, images: &[B]) -> Vec<ImageAnalysis> {
        join_all(images.iter().map(|bytes| self.analyze_image_bytes(bytes.as_ref()))).await
    }

    pub async fn analyze_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<ImageAnalysis> {
        join_all(paths.iter().map(|path| self.analyze_image(path))).await
    }

    /// Analyze every photo of a room, then fuse
    pub async fn reconstruct_room<B: AsRef<[u8]>>(
        &self,
        images: &[B],
        claimed_area: Option<f64>,
    ) -> Result<RoomReconstruction> {
        if images.is_empty() {
            return Err(EstimatorError::EmptyFusionInput);
        }
        let analyses = self.analyze_batch(images).await;
        summarize_batch(analyses, claimed_area)
    }

    async fn run_analysis(&self, image: DynamicImage) -> ImageAnalysis {
        let start = Instant::now();
        let (width, height) = (image.width(), image.height());
        let image = Arc::new(image);

        // contour search is CPU-bound; keep it off the async workers
        let sheet_task = {
            let image = Arc::clone(&image);
            let config = self.config.calibration.clone();
            tokio::task::spawn_blocking(move || {
                calibration::detect_reference_sheet(&image.to_luma8(), &config)
            })
        };

        let prompts = candidate_prompts();
        let (detections, depth_map, mask, probabilities) = tokio::join!(
            self.bounded("object detection", self.collaborators.detector.detect(&image)),
            self.bounded("depth estimation", self.collaborators.depth.estimate_depth(&image)),
            self.bounded("floor segmentation", self.collaborators.segmenter.segment(&image)),
            self.bounded(
                "scene classification",
                self.collaborators.classifier.classify(&image, &prompts)
            ),
        );

        let sheet = match sheet_task.await {
            Ok(sheet) => sheet,
            Err(e) => {
                warn!("Reference sheet search aborted: {}", e);
                None
            }
        };

        let detections = detections.unwrap_or_default();
        let depth = depth_map.as_ref().map(summarize_depth).unwrap_or_default();
        let floor = mask
            .as_ref()
            .map(|m| estimate_floor_coverage(m, self.config.floor_class_id, (width, height)));
        let room = probabilities.as_deref().and_then(resolve_room_type);
        if probabilities.is_some() && room.is_none() {
            warn!("Scene classifier output does not match the candidate labels");
        }

        let calibration = calibration::resolve(sheet, &detections);

        let spatial = estimate_spatial(&SpatialSignals {
            calibration: calibration.as_ref(),
            depth,
            floor: floor.unwrap_or_else(FloorCoverage::empty),
            room: room.unwrap_or_else(RoomTypeEstimate::unknown),
        });

        let analysis_results =
            aggregate_results(calibration.as_ref(), room.as_ref(), floor.as_ref(), &detections);

        info!(
            "{}x{} image: {:.2} m² {} via {} (confidence {:.1}) in {}ms",
            width,
            height,
            spatial.area,
            spatial.room_type.as_str(),
            spatial.estimation_method,
            spatial.area_confidence,
            start.elapsed().as_millis()
        );

        ImageAnalysis {
            detections,
            analysis_results,
            spatial,
            is_calibrated: calibration.is_some(),
            image_size: [height, width],
        }
    }

    /// Await a collaborator call; errors and timeouts become an absent signal
    async fn bounded<T, F>(&self, signal: &'static str, call: F) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.config.collaborator_timeout(), call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("{} failed, continuing without it: {:#}", signal, e);
                None
            }
            Err(_) => {
                warn!(
                    "{} timed out after {}s, continuing without it",
                    signal, self.config.collaborator_timeout_secs
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpatialEstimate;

    #[test]
    fn test_summarize_empty_batch() {
        assert!(matches!(
            summarize_batch(Vec::new(), None),
            Err(EstimatorError::EmptyFusionInput)
        ));
    }

    #[test]
    fn test_summarize_uses_analysis_calibration_flag() {
        // calibrated photo whose floor mask failed: estimate is default tier
        let mut calibrated = ImageAnalysis::unreadable();
        calibrated.is_calibrated = true;
        calibrated.spatial = SpatialEstimate {
            width: 4.12,
            length: 3.37,
            height: 2.7,
            area: 14.0,
            is_calibrated: true,
            ..SpatialEstimate::zeroed()
        };

        let summary = summarize_batch(vec![calibrated, ImageAnalysis::unreadable()], Some(14.0)).unwrap();
        assert!(summary.room.is_calibrated());
        assert_eq!(summary.room.photo_count, 2);
        assert_eq!(summary.room.spatial.area, 13.88);
        assert_eq!(summary.area_comparison.unwrap().discrepancy_percent, -0.9);
    }

    #[tokio::test]
    async fn test_reconstruct_rejects_empty_upload() {
        let analyzer = RoomAnalyzer::new(Collaborators::unavailable(), AnalyzerConfig::default()).unwrap();
        let images: Vec<Vec<u8>> = Vec::new();
        assert!(analyzer.reconstruct_room(&images, None).await.is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AnalyzerConfig::default();
        config.collaborator_timeout_secs = 0;
        assert!(RoomAnalyzer::new(Collaborators::unavailable(), config).is_err());
    }
}
