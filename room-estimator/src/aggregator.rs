use crate::calibration::Calibration;
use crate::floor::FloorCoverage;
use crate::scene::RoomTypeEstimate;
use crate::Detection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorSummary {
    pub pixel_count: u64,
    pub ratio: f64,
    pub projected_pixel_count: f64,
}

impl From<&FloorCoverage> for FloorSummary {
    fn from(coverage: &FloorCoverage) -> Self {
        Self {
            pixel_count: coverage.pixel_count,
            ratio: coverage.ratio,
            projected_pixel_count: coverage.projected_pixel_count(),
        }
    }
}

/// One line of the per-image result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultEntry {
    CalibrationReference(Detection),
    RoomType(RoomTypeEstimate),
    FloorSegmentation(FloorSummary),
    Object(Detection),
    Crack(Detection),
}

/// Assemble the display list for one image.
///
/// Order: reference sheet, room type, floor summary, objects, cracks. An
/// entry appears only when its signal was produced.
pub fn aggregate_results(
    calibration: Option<&Calibration>,
    room_type: Option<&RoomTypeEstimate>,
    floor: Option<&FloorCoverage>,
    detections: &[Detection],
) -> Vec<ResultEntry> {
    let mut entries = Vec::with_capacity(detections.len() + 3);

    if let Some(sheet) = calibration.and_then(Calibration::as_detection) {
        entries.push(ResultEntry::CalibrationReference(sheet));
    }
    if let Some(room) = room_type {
        entries.push(ResultEntry::RoomType(*room));
    }
    if let Some(coverage) = floor {
        entries.push(ResultEntry::FloorSegmentation(coverage.into()));
    }

    let (cracks, objects): (Vec<&Detection>, Vec<&Detection>) =
        detections.iter().partition(|d| d.is_crack);
    entries.extend(objects.into_iter().cloned().map(ResultEntry::Object));
    entries.extend(cracks.into_iter().cloned().map(ResultEntry::Crack));

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationSource;
    use crate::RoomType;

    fn sheet() -> Calibration {
        Calibration {
            meters_per_pixel: 0.001,
            source_bbox: Some([10.0, 10.0, 297.0, 210.0]),
            confidence: 0.95,
            source: CalibrationSource::ReferenceSheet,
        }
    }

    #[test]
    fn test_full_ordering() {
        let detections = vec![
            Detection::crack(0.3, [0.0, 0.0, 5.0, 50.0]),
            Detection::object("bed", 0.9, [0.0, 0.0, 100.0, 80.0]),
            Detection::object("chair", 0.8, [0.0, 0.0, 20.0, 40.0]),
        ];
        let room = RoomTypeEstimate { room_type: RoomType::Bedroom, confidence: 0.9 };
        let floor = FloorCoverage { pixel_count: 10, ratio: 0.1, rescale_factor: 2.0 };

        let entries = aggregate_results(Some(&sheet()), Some(&room), Some(&floor), &detections);

        assert_eq!(entries.len(), 6);
        assert!(matches!(&entries[0], ResultEntry::CalibrationReference(d) if d.is_calibration));
        assert!(matches!(entries[1], ResultEntry::RoomType(_)));
        assert!(matches!(&entries[2], ResultEntry::FloorSegmentation(f) if f.projected_pixel_count == 20.0));
        assert!(matches!(&entries[3], ResultEntry::Object(d) if d.label == "bed"));
        assert!(matches!(&entries[4], ResultEntry::Object(d) if d.label == "chair"));
        assert!(matches!(&entries[5], ResultEntry::Crack(_)));
    }

    #[test]
    fn test_missing_signals_are_omitted() {
        let object_calibration = Calibration {
            meters_per_pixel: 0.01,
            source_bbox: Some([0.0, 0.0, 100.0, 200.0]),
            confidence: 1.0,
            source: CalibrationSource::ReferenceObject { label: "bed".to_string() },
        };
        let detections = vec![Detection::object("bed", 0.9, [0.0, 0.0, 100.0, 200.0])];

        let entries = aggregate_results(Some(&object_calibration), None, None, &detections);
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], ResultEntry::Object(_)));

        assert!(aggregate_results(None, None, None, &[]).is_empty());
    }

    #[test]
    fn test_entry_serialization_is_tagged() {
        let json = serde_json::to_value(ResultEntry::Crack(Detection::crack(0.5, [1.0, 2.0, 3.0, 4.0]))).unwrap();
        assert_eq!(json["kind"], "crack");
        assert_eq!(json["is_crack"], true);
        assert_eq!(json["label"], "Structural Crack");
    }
}
