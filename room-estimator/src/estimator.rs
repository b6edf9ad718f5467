//! Per-image room dimensions from calibration, floor, and scene signals.
//!
//! Exactly one tier applies, chosen by which signals are present:
//!
//! | calibrated | floor pixels | method                     | area confidence |
//! |------------|--------------|----------------------------|-----------------|
//! | yes        | > 0          | `a4_calibration`           | 85              |
//! | yes        | > 0          | `reference_object`         | ref conf × 80   |
//! | no         | > 0          | `room_average_<size>`      | 40              |
//! | any        | 0            | `room_type_default`        | 25              |

use crate::calibration::{Calibration, CalibrationSource};
use crate::depth::DepthSummary;
use crate::floor::FloorCoverage;
use crate::reference::{average_room_size, DEFAULT_ROOM_AREA_M2};
use crate::scene::RoomTypeEstimate;
use crate::{round_to, EstimationMethod, RoomType, SizeCategory, SpatialEstimate};
use tracing::debug;

pub const MIN_PLAUSIBLE_AREA_M2: f64 = 2.0;
pub const MAX_PLAUSIBLE_AREA_M2: f64 = 200.0;
pub const AREA_CORRECTION_FACTOR: f64 = 10.0;

/// Rooms are reported slightly wider than long
pub const WIDTH_FACTOR: f64 = 1.1;
pub const LENGTH_FACTOR: f64 = 0.9;
pub const STANDARD_CEILING_HEIGHT_M: f64 = 2.7;

pub const SHEET_AREA_CONFIDENCE: f64 = 85.0;
pub const REFERENCE_AREA_CONFIDENCE_SCALE: f64 = 80.0;
pub const ROOM_AVERAGE_CONFIDENCE: f64 = 40.0;
pub const ROOM_DEFAULT_CONFIDENCE: f64 = 25.0;

/// Floor ratio above which the camera is assumed close to the walls
pub const SMALL_ROOM_FLOOR_RATIO: f64 = 0.4;
pub const MEDIUM_ROOM_FLOOR_RATIO: f64 = 0.2;

/// Signals gathered for one image
#[derive(Debug, Clone, Copy)]
pub struct SpatialSignals<'a> {
    pub calibration: Option<&'a Calibration>,
    pub depth: DepthSummary,
    pub floor: FloorCoverage,
    pub room: RoomTypeEstimate,
}

/// Correct gross under/over-counts of floor area.
///
/// Below 2 m² is multiplied by 10, above 200 m² divided by 10.
pub fn sanity_clamp_area(raw_area: f64) -> f64 {
    if raw_area < MIN_PLAUSIBLE_AREA_M2 {
        raw_area * AREA_CORRECTION_FACTOR
    } else if raw_area > MAX_PLAUSIBLE_AREA_M2 {
        raw_area / AREA_CORRECTION_FACTOR
    } else {
        raw_area
    }
}

pub fn size_category_for_ratio(floor_ratio: f64) -> SizeCategory {
    if floor_ratio > SMALL_ROOM_FLOOR_RATIO {
        SizeCategory::Small
    } else if floor_ratio > MEDIUM_ROOM_FLOOR_RATIO {
        SizeCategory::Medium
    } else {
        SizeCategory::Large
    }
}

/// Table area for a room type; unknown rooms use the bedroom row
pub fn average_area(room_type: RoomType, category: SizeCategory) -> f64 {
    average_room_size(room_type)
        .or_else(|| average_room_size(RoomType::Bedroom))
        .map_or(DEFAULT_ROOM_AREA_M2, |row| row.area(category))
}

fn default_area(room_type: RoomType) -> f64 {
    average_room_size(room_type).map_or(DEFAULT_ROOM_AREA_M2, |row| row.medium)
}

struct TierOutcome {
    area: f64,
    method: EstimationMethod,
    confidence: f64,
    reference_object: Option<String>,
}

fn calibrated_tier(calibration: &Calibration, floor: &FloorCoverage) -> TierOutcome {
    let raw_area = floor.projected_pixel_count() * calibration.meters_per_pixel.powi(2);
    let area = sanity_clamp_area(raw_area);

    debug!("Calibrated floor area {:.3} m² (raw {:.3} m²)", area, raw_area);

    match &calibration.source {
        CalibrationSource::ReferenceSheet => TierOutcome {
            area,
            method: EstimationMethod::A4Calibration,
            confidence: SHEET_AREA_CONFIDENCE,
            reference_object: calibration.reference_label().map(str::to_string),
        },
        CalibrationSource::ReferenceObject { label } => TierOutcome {
            area,
            method: EstimationMethod::ReferenceObject,
            confidence: calibration.confidence * REFERENCE_AREA_CONFIDENCE_SCALE,
            reference_object: Some(label.clone()),
        },
    }
}

/// Produce the single estimate for one image
pub fn estimate_spatial(signals: &SpatialSignals<'_>) -> SpatialEstimate {
    let room_type = signals.room.room_type;

    let outcome = match (signals.calibration, signals.floor.has_floor()) {
        (Some(calibration), true) => calibrated_tier(calibration, &signals.floor),
        (None, true) => {
            let category = size_category_for_ratio(signals.floor.ratio);
            TierOutcome {
                area: average_area(room_type, category),
                method: EstimationMethod::RoomAverage(category),
                confidence: ROOM_AVERAGE_CONFIDENCE,
                reference_object: None,
            }
        }
        (_, false) => TierOutcome {
            area: default_area(room_type),
            method: EstimationMethod::RoomTypeDefault,
            confidence: ROOM_DEFAULT_CONFIDENCE,
            reference_object: None,
        },
    };

    let side = outcome.area.sqrt();

    SpatialEstimate {
        width: round_to(side * WIDTH_FACTOR, 2),
        height: STANDARD_CEILING_HEIGHT_M,
        length: round_to(side * LENGTH_FACTOR, 2),
        area: round_to(outcome.area, 2),
        room_type,
        room_confidence: signals.room.confidence,
        area_confidence: round_to(outcome.confidence, 1),
        estimation_method: outcome.method,
        reference_object_used: outcome.reference_object,
        relative_depth_range: signals.depth.range,
        is_calibrated: signals.calibration.is_some(),
    }
}
