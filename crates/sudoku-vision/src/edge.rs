//! Canny edge detection followed by edge thickening.
//!
//! Dilating the Canny output closes the small gaps that photographed grid
//! borders tend to have, so the outer border traces as one contour.

use image::GrayImage;
use imageproc::distance_transform::Norm;

/// Minimum allowed Canny threshold.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Detect edges using the Canny algorithm.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge. Both
/// thresholds are clamped to at least [`MIN_THRESHOLD`] and the low
/// threshold to at most the high one.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Grow white regions by `radius` pixels with a square structuring element.
///
/// A radius of 1 is the 3x3 rectangular kernel.
#[must_use = "returns the dilated image"]
pub fn dilate(image: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return image.clone();
    }
    imageproc::morphology::dilate(image, Norm::LInf, radius)
}
