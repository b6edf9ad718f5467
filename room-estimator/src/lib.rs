use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod analyzer;
pub mod calibration;
pub mod collaborators;
pub mod config;
pub mod depth;
pub mod error;
pub mod estimator;
pub mod floor;
pub mod fusion;
pub mod reference;
pub mod scene;

pub use aggregator::{aggregate_results, ResultEntry};
pub use analyzer::{Collaborators, RoomAnalyzer, RoomReconstruction};
pub use calibration::{Calibration, CalibrationSource};
pub use config::{AnalyzerConfig, CalibrationConfig};
pub use error::{EstimatorError, Result};
pub use fusion::{fuse, fuse_room, AreaComparison, FusedRoomEstimate};

/// A labeled box reported by the object/crack detector.
///
/// `bbox` is `[x, y, w, h]` in source-image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
    #[serde(default)]
    pub is_crack: bool,
    #[serde(default)]
    pub is_calibration: bool,
}

impl Detection {
    pub fn object(label: impl Into<String>, confidence: f64, bbox: [f64; 4]) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
            is_crack: false,
            is_calibration: false,
        }
    }

    pub fn crack(confidence: f64, bbox: [f64; 4]) -> Self {
        Self {
            label: "Structural Crack".to_string(),
            confidence,
            bbox,
            is_crack: true,
            is_calibration: false,
        }
    }

    /// Build a detection from a detector-native `[x1, y1, x2, y2]` box
    pub fn from_corners(
        label: impl Into<String>,
        confidence: f64,
        corners: [f64; 4],
        is_crack: bool,
    ) -> Self {
        let [x1, y1, x2, y2] = corners;
        Self {
            label: label.into(),
            confidence,
            bbox: [x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs()],
            is_crack,
            is_calibration: false,
        }
    }

    pub fn width(&self) -> f64 {
        self.bbox[2]
    }

    pub fn height(&self) -> f64 {
        self.bbox[3]
    }
}

/// Scene category assigned by the zero-shot classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Bedroom,
    LivingRoom,
    Kitchen,
    Bathroom,
    Office,
    /// Classifier failed or the image could not be read
    Unknown,
}

impl RoomType {
    /// Labels offered to the scene classifier, in this order
    pub const CANDIDATES: [RoomType; 5] = [
        RoomType::Bedroom,
        RoomType::LivingRoom,
        RoomType::Kitchen,
        RoomType::Bathroom,
        RoomType::Office,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bedroom => "bedroom",
            Self::LivingRoom => "living_room",
            Self::Kitchen => "kitchen",
            Self::Bathroom => "bathroom",
            Self::Office => "office",
            Self::Unknown => "unknown",
        }
    }

    /// Text prompt used for zero-shot classification
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Bedroom => "a photo of a bedroom",
            Self::LivingRoom => "a photo of a living room",
            Self::Kitchen => "a photo of a kitchen",
            Self::Bathroom => "a photo of a bathroom",
            Self::Office => "a photo of an office",
            Self::Unknown => "a photo of a room",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
}

impl SizeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Fallback tier that produced a [`SpatialEstimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EstimationMethod {
    /// Floor area scaled by a detected A4 reference sheet
    A4Calibration,
    /// Floor area scaled by a known-size object
    ReferenceObject,
    /// Average size for the room type, bucketed by floor ratio
    RoomAverage(SizeCategory),
    /// Medium average for the room type, no floor signal
    RoomTypeDefault,
    /// Image was unreadable
    None,
}

impl EstimationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A4Calibration => "a4_calibration",
            Self::ReferenceObject => "reference_object",
            Self::RoomAverage(SizeCategory::Small) => "room_average_small",
            Self::RoomAverage(SizeCategory::Medium) => "room_average_medium",
            Self::RoomAverage(SizeCategory::Large) => "room_average_large",
            Self::RoomTypeDefault => "room_type_default",
            Self::None => "none",
        }
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self, Self::A4Calibration | Self::ReferenceObject)
    }
}

impl std::fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EstimationMethod> for String {
    fn from(method: EstimationMethod) -> Self {
        method.as_str().to_string()
    }
}

impl TryFrom<String> for EstimationMethod {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "a4_calibration" => Ok(Self::A4Calibration),
            "reference_object" => Ok(Self::ReferenceObject),
            "room_average_small" => Ok(Self::RoomAverage(SizeCategory::Small)),
            "room_average_medium" => Ok(Self::RoomAverage(SizeCategory::Medium)),
            "room_average_large" => Ok(Self::RoomAverage(SizeCategory::Large)),
            "room_type_default" => Ok(Self::RoomTypeDefault),
            "none" => Ok(Self::None),
            other => Err(format!("unknown estimation method: {}", other)),
        }
    }
}

/// Room dimensions estimated from a single photo (meters / m²).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialEstimate {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub area: f64,
    pub room_type: RoomType,
    pub room_confidence: f64,
    /// 0-100, fixed per tier
    pub area_confidence: f64,
    pub estimation_method: EstimationMethod,
    pub reference_object_used: Option<String>,
    /// Informational only; never enters the dimension arithmetic
    #[serde(default)]
    pub relative_depth_range: f64,
    /// A scale was resolved for the photo, even if the tier could not use it
    #[serde(default)]
    pub is_calibrated: bool,
}

impl SpatialEstimate {
    /// Estimate reported for an image that could not be decoded
    pub fn zeroed() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            length: 0.0,
            area: 0.0,
            room_type: RoomType::Unknown,
            room_confidence: 0.0,
            area_confidence: 0.0,
            estimation_method: EstimationMethod::None,
            reference_object_used: None,
            relative_depth_range: 0.0,
            is_calibrated: false,
        }
    }
}

/// Everything the analyzer learned about one photo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub detections: Vec<Detection>,
    pub analysis_results: Vec<ResultEntry>,
    pub spatial: SpatialEstimate,
    pub is_calibrated: bool,
    /// `[height, width]` of the source image
    pub image_size: [u32; 2],
}

impl ImageAnalysis {
    pub fn unreadable() -> Self {
        Self {
            detections: Vec::new(),
            analysis_results: Vec::new(),
            spatial: SpatialEstimate::zeroed(),
            is_calibrated: false,
            image_size: [0, 0],
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners() {
        let det = Detection::from_corners("bed", 0.9, [110.0, 20.0, 10.0, 120.0], false);
        assert_eq!(det.bbox, [10.0, 20.0, 100.0, 100.0]);
        assert!(!det.is_crack);
    }

    #[test]
    fn test_estimation_method_serde() {
        let json = serde_json::to_string(&EstimationMethod::RoomAverage(SizeCategory::Medium)).unwrap();
        assert_eq!(json, "\"room_average_medium\"");

        let parsed: EstimationMethod = serde_json::from_str("\"a4_calibration\"").unwrap();
        assert_eq!(parsed, EstimationMethod::A4Calibration);

        assert!(serde_json::from_str::<EstimationMethod>("\"laser\"").is_err());
    }

    #[test]
    fn test_zeroed_estimate() {
        let zero = SpatialEstimate::zeroed();
        assert_eq!(zero.room_type, RoomType::Unknown);
        assert_eq!(zero.estimation_method, EstimationMethod::None);
        assert!(!zero.is_calibrated);

        let json = serde_json::to_value(&zero).unwrap();
        assert_eq!(json["room_type"], "unknown");
        assert_eq!(json["estimation_method"], "none");
        assert_eq!(json["is_calibrated"], false);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(2.675, 1), 2.7);
    }
}
