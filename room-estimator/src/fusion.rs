//! Cross-photo fusion: many per-photo estimates of one room into one.
//!
//! Each axis takes the maximum over photos, on the assumption that a photo
//! under-captures the room rather than over-captures it. Area is recomputed
//! from the fused width and length, never taken as the max of photo areas.

use crate::error::{EstimatorError, Result};
use crate::{round_to, SpatialEstimate};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRoomEstimate {
    #[serde(flatten)]
    pub spatial: SpatialEstimate,
    pub photo_count: usize,
}

impl FusedRoomEstimate {
    /// True if any photo resolved a scale, by sheet or reference object
    pub fn is_calibrated(&self) -> bool {
        self.spatial.is_calibrated
    }
}

fn max_of(estimates: &[SpatialEstimate], axis: impl Fn(&SpatialEstimate) -> f64) -> Option<f64> {
    estimates
        .iter()
        .map(|e| OrderedFloat(axis(e)))
        .max()
        .map(OrderedFloat::into_inner)
}

/// Fuse per-photo estimates. Fails only on an empty input.
///
/// Room type, confidences, method and reference object come from the most
/// trusted photo (highest area confidence, earliest on ties).
pub fn fuse(estimates: &[SpatialEstimate]) -> Result<SpatialEstimate> {
    let width = max_of(estimates, |e| e.width).ok_or(EstimatorError::EmptyFusionInput)?;
    let height = max_of(estimates, |e| e.height).ok_or(EstimatorError::EmptyFusionInput)?;
    let length = max_of(estimates, |e| e.length).ok_or(EstimatorError::EmptyFusionInput)?;
    let depth_range =
        max_of(estimates, |e| e.relative_depth_range).ok_or(EstimatorError::EmptyFusionInput)?;
    let is_calibrated = estimates.iter().any(|e| e.is_calibrated);

    let most_trusted = estimates
        .iter()
        .fold(None, |best: Option<&SpatialEstimate>, e| match best {
            Some(current) if current.area_confidence >= e.area_confidence => Some(current),
            _ => Some(e),
        })
        .ok_or(EstimatorError::EmptyFusionInput)?;

    Ok(SpatialEstimate {
        width,
        height,
        length,
        area: round_to(width * length, 2),
        room_type: most_trusted.room_type,
        room_confidence: most_trusted.room_confidence,
        area_confidence: most_trusted.area_confidence,
        estimation_method: most_trusted.estimation_method,
        reference_object_used: most_trusted.reference_object_used.clone(),
        relative_depth_range: depth_range,
        is_calibrated,
    })
}

/// [`fuse`] plus batch-level calibration status
pub fn fuse_room(estimates: &[SpatialEstimate]) -> Result<FusedRoomEstimate> {
    let spatial = fuse(estimates)?;

    info!(
        "Fused {} photos: {:.2} x {:.2} x {:.2} m, area {:.2} m² (calibrated: {})",
        estimates.len(),
        spatial.width,
        spatial.length,
        spatial.height,
        spatial.area,
        spatial.is_calibrated
    );

    Ok(FusedRoomEstimate {
        spatial,
        photo_count: estimates.len(),
    })
}

/// Estimated area against a declared one (e.g. a listing's claimed size)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaComparison {
    pub claimed_area: f64,
    pub estimated_area: f64,
    /// Positive when the room is larger than claimed
    pub discrepancy_percent: f64,
}

pub fn compare_claimed_area(estimated_area: f64, claimed_area: f64) -> Option<AreaComparison> {
    if !(claimed_area.is_finite() && claimed_area > 0.0) {
        return None;
    }
    Some(AreaComparison {
        claimed_area,
        estimated_area,
        discrepancy_percent: round_to((estimated_area - claimed_area) / claimed_area * 100.0, 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EstimationMethod, RoomType, SizeCategory};

    fn estimate(width: f64, length: f64, method: EstimationMethod, confidence: f64) -> SpatialEstimate {
        SpatialEstimate {
            width,
            height: 2.7,
            length,
            area: round_to(width * length, 2),
            room_type: RoomType::Kitchen,
            room_confidence: 0.6,
            area_confidence: confidence,
            estimation_method: method,
            reference_object_used: None,
            relative_depth_range: 1.0,
            is_calibrated: method.is_calibrated(),
        }
    }

    #[test]
    fn test_max_then_recompute_area() {
        let a = estimate(3.0, 4.0, EstimationMethod::RoomTypeDefault, 25.0);
        let b = estimate(5.0, 2.0, EstimationMethod::RoomTypeDefault, 25.0);

        let fused = fuse(&[a, b]).unwrap();
        assert_eq!(fused.width, 5.0);
        assert_eq!(fused.length, 4.0);
        assert_eq!(fused.area, 20.0);
        assert_eq!(fused.height, 2.7);
    }

    #[test]
    fn test_order_independent() {
        let a = estimate(3.3, 4.1, EstimationMethod::RoomAverage(SizeCategory::Small), 40.0);
        let b = estimate(5.2, 2.9, EstimationMethod::A4Calibration, 85.0);

        let ab = fuse(&[a.clone(), b.clone()]).unwrap();
        let ba = fuse(&[b, a]).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.estimation_method, EstimationMethod::A4Calibration);
        assert_eq!(ab.area, 21.32);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(fuse(&[]), Err(EstimatorError::EmptyFusionInput)));
        assert!(fuse_room(&[]).is_err());
    }

    #[test]
    fn test_calibration_status() {
        let plain = estimate(3.0, 3.0, EstimationMethod::RoomTypeDefault, 25.0);
        let referenced = estimate(3.0, 3.0, EstimationMethod::ReferenceObject, 72.0);

        let fused = fuse_room(&[plain.clone(), SpatialEstimate::zeroed()]).unwrap();
        assert!(!fused.is_calibrated());
        assert_eq!(fused.photo_count, 2);

        let fused = fuse_room(&[plain, referenced]).unwrap();
        assert!(fused.is_calibrated());
    }

    #[test]
    fn test_scale_without_floor_still_counts_as_calibrated() {
        // sheet found but no floor mask: default tier, scale still resolved
        let mut sheet_only = estimate(3.74, 3.74, EstimationMethod::RoomTypeDefault, 25.0);
        sheet_only.is_calibrated = true;
        let plain = estimate(3.0, 3.0, EstimationMethod::RoomAverage(SizeCategory::Large), 40.0);

        let fused = fuse_room(&[plain, sheet_only]).unwrap();
        assert!(fused.is_calibrated());
        assert_eq!(fused.spatial.estimation_method, EstimationMethod::RoomAverage(SizeCategory::Large));
    }

    #[test]
    fn test_unreadable_photo_does_not_shrink_room() {
        let good = estimate(3.5, 3.0, EstimationMethod::RoomTypeDefault, 25.0);
        let fused = fuse(&[SpatialEstimate::zeroed(), good]).unwrap();
        assert_eq!(fused.width, 3.5);
        assert_eq!(fused.room_type, RoomType::Kitchen);
    }

    #[test]
    fn test_flattened_serialization() {
        let fused = fuse_room(&[estimate(3.0, 4.0, EstimationMethod::A4Calibration, 85.0)]).unwrap();
        let json = serde_json::to_value(&fused).unwrap();
        assert_eq!(json["area"], 12.0);
        assert_eq!(json["is_calibrated"], true);
        assert_eq!(json["estimation_method"], "a4_calibration");
    }

    #[test]
    fn test_claimed_area_comparison() {
        let cmp = compare_claimed_area(20.78, 20.0).unwrap();
        assert_eq!(cmp.discrepancy_percent, 3.9);
        assert!(compare_claimed_area(20.0, 0.0).is_none());
        assert!(compare_claimed_area(20.0, f64::NAN).is_none());
    }
}
