//! Image decoding, contrast enhancement, and grayscale conversion.
//!
//! Contrast is stretched around the image's mean luminance with a single
//! lookup table applied to every channel, which keeps hue roughly intact
//! while pushing paper towards white and ink towards black.

use image::{GrayImage, RgbImage};

use crate::types::VisionError;

/// Decode raw image bytes into an RGB buffer.
///
/// # Errors
///
/// Returns [`VisionError::EmptyImage`] if `bytes` is empty or decodes to
/// a zero-sized image, and [`VisionError::ImageDecode`] if the data is not
/// a supported image.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::EmptyImage);
    }
    let img = image::load_from_memory(bytes)?.to_rgb8();
    if img.width() == 0 || img.height() == 0 {
        return Err(VisionError::EmptyImage);
    }
    Ok(img)
}

/// Mean luminance using `0.299*R + 0.587*G + 0.114*B` over the per-channel
/// means. Returns 0 for an empty image.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn luminance_mean(image: &RgbImage) -> f64 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0.0;
    }
    let mut sums = [0_u64; 3];
    for pixel in image.pixels() {
        for (sum, &c) in sums.iter_mut().zip(&pixel.0) {
            *sum += u64::from(c);
        }
    }
    let [r, g, b] = sums.map(|s| s as f64 / count as f64);
    0.114f64.mul_add(b, 0.587f64.mul_add(g, 0.299 * r))
}

/// Stretch contrast by `factor` around the mean luminance.
///
/// Each channel value `v` maps to `factor * (v - mean) + mean`, truncated
/// towards zero and clamped to `0..=255`.
///
/// # Errors
///
/// Returns [`VisionError::InvalidArgument`] if `factor` is not a positive
/// finite number.
pub fn enhance_contrast(image: &RgbImage, factor: f64) -> Result<RgbImage, VisionError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(VisionError::InvalidArgument(format!(
            "contrast factor must be positive, got {factor}"
        )));
    }
    let mean = luminance_mean(image);
    let lut = contrast_lut(factor, mean);

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for c in &mut pixel.0 {
            *c = lut[usize::from(*c)];
        }
    }
    Ok(out)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn contrast_lut(factor: f64, mean: f64) -> [u8; 256] {
    let mut lut = [0_u8; 256];
    for (value, slot) in (0_u8..=255).zip(lut.iter_mut()) {
        let stretched = factor.mul_add(f64::from(value) - mean, mean).trunc();
        *slot = stretched.clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Convert to single-channel luminance.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}
