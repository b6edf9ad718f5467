use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// Unitless per-pixel relative depth, same resolution as the source image
pub type DepthMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Spread of relative depth across the scene.
///
/// Only meaningful as a proportionality factor within one image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthSummary {
    pub range: f64,
}

/// `max - min` over the finite samples; flat or empty maps give 0
pub fn summarize_depth(map: &DepthMap) -> DepthSummary {
    let bounds = map
        .pixels()
        .map(|p| p[0])
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f32, f32)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });

    let range = bounds.map_or(0.0, |(lo, hi)| f64::from(hi) - f64::from(lo));
    DepthSummary { range }
}
