//! Meters-per-pixel scale from a reference sheet or a known-size object.
//!
//! Resolution order:
//! 1. An A4 sheet found by contour analysis (treated as ground truth)
//! 2. The most trusted reference object among the detections
//! 3. Nothing; the image stays uncalibrated

use crate::config::CalibrationConfig;
use crate::reference::reference_spec;
use crate::Detection;
use geo::{Area, BoundingRect, EuclideanLength, LineString, Polygon, Simplify};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Long side of an A4 sheet in meters
pub const A4_LONG_SIDE_M: f64 = 0.297;
/// Ideal long/short ratio of an A4 sheet
pub const A4_ASPECT_RATIO: f64 = 1.414;
/// Label used for the sheet in result lists
pub const REFERENCE_SHEET_LABEL: &str = "A4 Reference";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalibrationSource {
    ReferenceSheet,
    ReferenceObject { label: String },
}

/// Resolved image scale. An uncalibrated image has no `Calibration` at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub meters_per_pixel: f64,
    pub source_bbox: Option<[f64; 4]>,
    pub confidence: f64,
    pub source: CalibrationSource,
}

impl Calibration {
    pub fn is_reference_sheet(&self) -> bool {
        matches!(self.source, CalibrationSource::ReferenceSheet)
    }

    pub fn reference_label(&self) -> Option<&str> {
        match &self.source {
            CalibrationSource::ReferenceSheet => Some(REFERENCE_SHEET_LABEL),
            CalibrationSource::ReferenceObject { label } => Some(label.as_str()),
        }
    }

    /// The sheet rendered as a detection, for result lists
    pub fn as_detection(&self) -> Option<Detection> {
        if !self.is_reference_sheet() {
            return None;
        }
        let bbox = self.source_bbox?;
        Some(Detection {
            label: REFERENCE_SHEET_LABEL.to_string(),
            confidence: self.confidence,
            bbox,
            is_crack: false,
            is_calibration: true,
        })
    }
}

/// Quadrilateral that might be the reference sheet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetCandidate {
    pub long_side_px: f64,
    pub short_side_px: f64,
    /// Axis-aligned `[x, y, w, h]` of the simplified quadrilateral
    pub bbox: [f64; 4],
}

impl SheetCandidate {
    pub fn aspect(&self) -> f64 {
        self.long_side_px / self.short_side_px
    }

    /// 1.0 for a perfect A4 ratio, lower the further off
    pub fn score(&self) -> f64 {
        1.0 - (self.aspect() - A4_ASPECT_RATIO).abs()
    }
}

/// Pick the candidate closest to the A4 ratio; the first one wins exact ties.
pub fn select_sheet_candidate<I>(candidates: I, config: &CalibrationConfig) -> Option<SheetCandidate>
where
    I: IntoIterator<Item = SheetCandidate>,
{
    candidates
        .into_iter()
        .filter(|c| c.short_side_px > 0.0)
        .filter(|c| (config.min_aspect..=config.max_aspect).contains(&c.aspect()))
        .fold(None, |best, candidate| match best {
            Some(current) if current.score() >= candidate.score() => Some(current),
            _ => Some(candidate),
        })
}

fn threshold_bright(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut binary = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let val = if pixel[0] > threshold { 255 } else { 0 };
        binary.put_pixel(x, y, Luma([val]));
    }
    binary
}

fn to_polygon(points: &[Point<i32>]) -> Polygon<f64> {
    let ring: LineString<f64> = points
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect::<Vec<_>>()
        .into();
    Polygon::new(ring, vec![])
}

/// Side lengths of the minimum-area rectangle around `points`, shortest first
fn rect_sides(points: &[Point<i32>]) -> (f64, f64) {
    let corners = min_area_rect(points)
        .map(|p| Point2::new(f64::from(p.x), f64::from(p.y)));

    // two shortest distances from one corner are the sides, the longest the diagonal
    let mut dists = [
        nalgebra::distance(&corners[0], &corners[1]),
        nalgebra::distance(&corners[0], &corners[2]),
        nalgebra::distance(&corners[0], &corners[3]),
    ];
    dists.sort_by(|a, b| a.total_cmp(b));
    (dists[0], dists[1])
}

/// Bright four-cornered regions above the noise floor, in contour order
pub fn find_sheet_candidates(gray: &GrayImage, config: &CalibrationConfig) -> Vec<SheetCandidate> {
    let blurred = gaussian_blur_f32(gray, config.blur_sigma);
    let mask = threshold_bright(&blurred, config.brightness_threshold);

    let mut candidates = Vec::new();

    for contour in find_contours::<i32>(&mask) {
        if contour.border_type != BorderType::Outer || contour.points.len() < 4 {
            continue;
        }

        let polygon = to_polygon(&contour.points);
        if polygon.unsigned_area() < config.min_contour_area {
            continue;
        }

        let perimeter = polygon.exterior().euclidean_length();
        let simplified = polygon.simplify(&(config.approx_epsilon_ratio * perimeter));

        // ring is closed, so the last coordinate repeats the first
        let vertices = simplified.exterior().0.len().saturating_sub(1);
        if vertices != 4 {
            continue;
        }

        let (short_side_px, long_side_px) = rect_sides(&contour.points);
        if short_side_px <= 0.0 {
            continue;
        }

        let Some(rect) = simplified.bounding_rect() else {
            continue;
        };

        candidates.push(SheetCandidate {
            long_side_px,
            short_side_px,
            bbox: [rect.min().x, rect.min().y, rect.width(), rect.height()],
        });
    }

    candidates
}

/// Tier A: look for an A4 sheet in the frame
pub fn detect_reference_sheet(gray: &GrayImage, config: &CalibrationConfig) -> Option<Calibration> {
    let candidates = find_sheet_candidates(gray, config);
    let candidate_count = candidates.len();
    let best = select_sheet_candidate(candidates, config)?;

    debug!(
        "Reference sheet selected from {} candidates (aspect {:.3}, long side {:.1}px)",
        candidate_count,
        best.aspect(),
        best.long_side_px
    );

    Some(Calibration {
        meters_per_pixel: A4_LONG_SIDE_M / best.long_side_px,
        source_bbox: Some(best.bbox),
        confidence: config.sheet_confidence,
        source: CalibrationSource::ReferenceSheet,
    })
}

/// Tier B: scale from the most trusted known-size object.
///
/// Lowest priority wins, then table order, then detection confidence, so the
/// outcome does not depend on the order of `detections`.
pub fn resolve_reference_object(detections: &[Detection]) -> Option<Calibration> {
    let (_, spec, detection) = detections
        .iter()
        .filter(|d| !d.is_crack && !d.is_calibration)
        .filter(|d| d.width() > 0.0 && d.height() > 0.0)
        .filter_map(|d| reference_spec(&d.label).map(|(rank, spec)| (rank, spec, d)))
        .min_by(|a, b| {
            a.1.priority
                .cmp(&b.1.priority)
                .then(a.0.cmp(&b.0))
                .then(b.2.confidence.total_cmp(&a.2.confidence))
        })?;

    // larger on-screen side is assumed to match the larger real side
    let pixel_extent = detection.width().max(detection.height());

    debug!(
        "Reference object '{}' (priority {}) spans {:.1}px",
        spec.label, spec.priority, pixel_extent
    );

    Some(Calibration {
        meters_per_pixel: spec.larger_dimension() / pixel_extent,
        source_bbox: Some(detection.bbox),
        confidence: spec.confidence(),
        source: CalibrationSource::ReferenceObject {
            label: spec.label.to_string(),
        },
    })
}

/// Combine an already-computed sheet result with the detection fallback
pub fn resolve(sheet: Option<Calibration>, detections: &[Detection]) -> Option<Calibration> {
    sheet.or_else(|| resolve_reference_object(detections))
}

pub fn resolve_calibration(
    gray: &GrayImage,
    detections: &[Detection],
    config: &CalibrationConfig,
) -> Option<Calibration> {
    resolve(detect_reference_sheet(gray, config), detections)
}
