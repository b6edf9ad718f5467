//! Static lookup tables: known-size reference objects and average room sizes.

use crate::{RoomType, SizeCategory};
use serde::Serialize;

/// Real-world size of an object the detector can find
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceObjectSpec {
    pub label: &'static str,
    pub real_width_m: f64,
    pub real_height_m: f64,
    /// Lower is more trusted
    pub priority: u8,
}

impl ReferenceObjectSpec {
    pub fn larger_dimension(&self) -> f64 {
        self.real_width_m.max(self.real_height_m)
    }

    /// Calibration confidence: 1.0 for priority 1, minus 0.1 per rank, floored at 0.5
    pub fn confidence(&self) -> f64 {
        (1.0 - (f64::from(self.priority) - 1.0) * 0.1).max(0.5)
    }
}

/// One entry per label. Order breaks ties between equal priorities.
pub const REFERENCE_OBJECTS: &[ReferenceObjectSpec] = &[
    ReferenceObjectSpec { label: "bed", real_width_m: 1.52, real_height_m: 2.03, priority: 1 },
    ReferenceObjectSpec { label: "door", real_width_m: 0.91, real_height_m: 2.03, priority: 2 },
    ReferenceObjectSpec { label: "refrigerator", real_width_m: 0.75, real_height_m: 1.75, priority: 2 },
    ReferenceObjectSpec { label: "couch", real_width_m: 2.0, real_height_m: 0.85, priority: 3 },
    ReferenceObjectSpec { label: "dining table", real_width_m: 1.5, real_height_m: 0.75, priority: 3 },
    ReferenceObjectSpec { label: "toilet", real_width_m: 0.4, real_height_m: 0.75, priority: 3 },
    ReferenceObjectSpec { label: "chair", real_width_m: 0.45, real_height_m: 0.9, priority: 4 },
    ReferenceObjectSpec { label: "tv", real_width_m: 1.2, real_height_m: 0.7, priority: 4 },
];

/// Look up a detector label, returning its table position and spec
pub fn reference_spec(label: &str) -> Option<(usize, &'static ReferenceObjectSpec)> {
    let label = label.trim();
    REFERENCE_OBJECTS
        .iter()
        .enumerate()
        .find(|(_, spec)| spec.label.eq_ignore_ascii_case(label))
}

/// Typical floor area (m²) per size bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoomSizeRow {
    pub small: f64,
    pub medium: f64,
    pub large: f64,
}

impl RoomSizeRow {
    pub fn area(&self, category: SizeCategory) -> f64 {
        match category {
            SizeCategory::Small => self.small,
            SizeCategory::Medium => self.medium,
            SizeCategory::Large => self.large,
        }
    }
}

const BEDROOM: RoomSizeRow = RoomSizeRow { small: 9.0, medium: 14.0, large: 20.0 };
const LIVING_ROOM: RoomSizeRow = RoomSizeRow { small: 15.0, medium: 22.0, large: 35.0 };
const KITCHEN: RoomSizeRow = RoomSizeRow { small: 7.0, medium: 12.0, large: 18.0 };
const BATHROOM: RoomSizeRow = RoomSizeRow { small: 4.0, medium: 6.0, large: 10.0 };
const OFFICE: RoomSizeRow = RoomSizeRow { small: 8.0, medium: 12.0, large: 18.0 };

/// Area used when no floor signal exists and the room type is unknown
pub const DEFAULT_ROOM_AREA_M2: f64 = 14.0;

/// `None` for [`RoomType::Unknown`]
pub fn average_room_size(room_type: RoomType) -> Option<&'static RoomSizeRow> {
    match room_type {
        RoomType::Bedroom => Some(&BEDROOM),
        RoomType::LivingRoom => Some(&LIVING_ROOM),
        RoomType::Kitchen => Some(&KITCHEN),
        RoomType::Bathroom => Some(&BATHROOM),
        RoomType::Office => Some(&OFFICE),
        RoomType::Unknown => None,
    }
}
