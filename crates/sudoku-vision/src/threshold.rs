//! Global and adaptive binarisation of grayscale images.

use image::{GrayImage, Luma};
use imageproc::contrast::ThresholdType;

/// Global threshold: pixels brighter than `level` become 255, the rest 0.
#[must_use = "returns the binary image"]
pub fn binary(image: &GrayImage, level: u8) -> GrayImage {
    imageproc::contrast::threshold(image, level, ThresholdType::Binary)
}

/// Adaptive threshold against the local mean, inverted so that dark ink
/// on light paper comes out white.
///
/// A pixel becomes 255 when it is at most `local_mean - offset`, where the
/// local mean is taken over a `(2 * block_radius + 1)` square window.
#[must_use = "returns the binary image"]
pub fn adaptive_mean_inverted(image: &GrayImage, block_radius: u32, offset: i16) -> GrayImage {
    let means = imageproc::filter::box_filter(image, block_radius, block_radius);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = i32::from(image.get_pixel(x, y).0[0]);
        let local = i32::from(means.get_pixel(x, y).0[0]);
        if value > local - i32::from(offset) {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

/// Number of non-zero pixels.
#[must_use]
pub fn count_foreground(image: &GrayImage) -> u64 {
    image.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}
