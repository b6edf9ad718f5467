use crate::error::{EstimatorError, Result};
use crate::floor::ADE20K_FLOOR_CLASS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an optional JSON config file
pub const CONFIG_PATH_ENV: &str = "ESTIMATOR_CONFIG";

/// Reference-sheet search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Gaussian blur sigma applied before thresholding
    pub blur_sigma: f32,
    /// Grayscale level above which a pixel counts as paper
    pub brightness_threshold: u8,
    /// Contours enclosing less than this many px² are noise
    pub min_contour_area: f64,
    /// Douglas-Peucker tolerance as a fraction of contour perimeter
    pub approx_epsilon_ratio: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    /// Confidence reported when the sheet is found
    pub sheet_confidence: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            brightness_threshold: 220,
            min_contour_area: 3000.0,
            approx_epsilon_ratio: 0.02,
            min_aspect: 1.2,
            max_aspect: 1.7,
            sheet_confidence: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub calibration: CalibrationConfig,
    /// Class id the segmentation model uses for floor
    pub floor_class_id: u8,
    /// Upper bound on a single collaborator call
    pub collaborator_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            floor_class_id: ADE20K_FLOOR_CLASS,
            collaborator_timeout_secs: 30,
        }
    }
}

impl AnalyzerConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let cal = &self.calibration;
        if !(cal.blur_sigma.is_finite() && cal.blur_sigma > 0.0) {
            return Err(EstimatorError::InvalidConfig(
                "calibration.blur_sigma must be a positive finite number".to_string(),
            ));
        }
        if !(cal.approx_epsilon_ratio > 0.0 && cal.approx_epsilon_ratio < 1.0) {
            return Err(EstimatorError::InvalidConfig(
                "calibration.approx_epsilon_ratio must be in (0, 1)".to_string(),
            ));
        }
        if !(cal.min_aspect >= 1.0 && cal.min_aspect < cal.max_aspect) {
            return Err(EstimatorError::InvalidConfig(format!(
                "calibration aspect range [{}, {}] is empty",
                cal.min_aspect, cal.max_aspect
            )));
        }
        if !(0.0..=1.0).contains(&cal.sheet_confidence) {
            return Err(EstimatorError::InvalidConfig(
                "calibration.sheet_confidence must be in [0, 1]".to_string(),
            ));
        }
        if self.collaborator_timeout_secs == 0 {
            return Err(EstimatorError::InvalidConfig(
                "collaborator_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| EstimatorError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `ESTIMATOR_CONFIG` if set, otherwise defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_json_file(path),
            Err(_) => Ok(Self::default()),
        }
    }
}
