use image::GrayImage;
use serde::{Deserialize, Serialize};

/// "floor" in the ADE20K label set (0-indexed)
pub const ADE20K_FLOOR_CLASS: u8 = 3;

/// Floor pixels in a segmentation mask, plus the factor mapping the mask
/// grid onto the source image grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorCoverage {
    pub pixel_count: u64,
    /// Fraction of mask pixels that are floor
    pub ratio: f64,
    pub rescale_factor: f64,
}

impl FloorCoverage {
    /// No floor signal
    pub fn empty() -> Self {
        Self {
            pixel_count: 0,
            ratio: 0.0,
            rescale_factor: 1.0,
        }
    }

    pub fn has_floor(&self) -> bool {
        self.pixel_count > 0
    }

    /// Floor pixel count expressed in source-image pixels
    pub fn projected_pixel_count(&self) -> f64 {
        self.pixel_count as f64 * self.rescale_factor
    }
}

/// Count `floor_class` pixels in `mask` and relate them to a source image
/// of `original_size` = `(width, height)`.
pub fn estimate_floor_coverage(
    mask: &GrayImage,
    floor_class: u8,
    original_size: (u32, u32),
) -> FloorCoverage {
    let (mask_w, mask_h) = mask.dimensions();
    let total = u64::from(mask_w) * u64::from(mask_h);
    if total == 0 {
        return FloorCoverage::empty();
    }

    let pixel_count = mask.pixels().filter(|p| p[0] == floor_class).count() as u64;
    let (orig_w, orig_h) = original_size;
    let rescale_factor =
        (f64::from(orig_h) / f64::from(mask_h)) * (f64::from(orig_w) / f64::from(mask_w));

    FloorCoverage {
        pixel_count,
        ratio: pixel_count as f64 / total as f64,
        rescale_factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_coverage_and_rescale() {
        // bottom quarter of a 4x4 mask is floor
        let mask = GrayImage::from_fn(4, 4, |_, y| {
            if y == 3 { Luma([ADE20K_FLOOR_CLASS]) } else { Luma([0]) }
        });

        let coverage = estimate_floor_coverage(&mask, ADE20K_FLOOR_CLASS, (16, 8));
        assert_eq!(coverage.pixel_count, 4);
        assert!((coverage.ratio - 0.25).abs() < 1e-12);
        assert!((coverage.rescale_factor - 8.0).abs() < 1e-12);
        assert!((coverage.projected_pixel_count() - 32.0).abs() < 1e-12);
        assert!(coverage.has_floor());
    }

    #[test]
    fn test_no_floor_pixels() {
        let mask = GrayImage::from_pixel(10, 10, Luma([12]));
        let coverage = estimate_floor_coverage(&mask, ADE20K_FLOOR_CLASS, (10, 10));
        assert_eq!(coverage.pixel_count, 0);
        assert_eq!(coverage.ratio, 0.0);
        assert!(!coverage.has_floor());
    }

    #[test]
    fn test_empty_mask() {
        let coverage = estimate_floor_coverage(&GrayImage::new(0, 0), ADE20K_FLOOR_CLASS, (640, 480));
        assert_eq!(coverage, FloorCoverage::empty());
    }
}
