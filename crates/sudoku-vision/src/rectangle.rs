//! Contour-based grid detection.
//!
//! The grid's thick outer border is usually the largest closed shape in
//! the photo. After contrast stretching and thresholding, its edges are
//! traced as an outer contour, reduced to a quadrilateral, and the four
//! vertices are sorted into canonical order around the polygon centroid.
//!
//! # Pipeline
//!
//! 1. Contrast enhancement around the mean luminance
//! 2. Grayscale conversion
//! 3. Binary threshold
//! 4. Canny edge detection
//! 5. 3x3 dilation
//! 6. External contour tracing
//! 7. Largest contour above the minimum area
//! 8. Four-vertex polygon approximation
//! 9. Quadrant sort around the centroid

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::triangle::SQUARE_TOLERANCE;
use crate::types::{Point, Quadrilateral, VisionError};
use crate::{contour, edge, grayscale, simplify, threshold};

/// Named parameter sets for [`RectangleDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RectanglePreset {
    /// Threshold at 225.
    #[default]
    Standard,
    /// Threshold at 250, for photos with bright, washed-out paper.
    HighThreshold,
    /// Standard parameters, then snap the result to the axis-aligned
    /// rectangle spanned by its most square-like diagonal.
    SquareSnap,
}

impl RectanglePreset {
    /// All presets in declaration order.
    pub const ALL: [Self; 3] = [Self::Standard, Self::HighThreshold, Self::SquareSnap];

    /// The parameter set this preset stands for.
    #[must_use]
    pub fn params(self) -> RectangleParams {
        let standard = RectangleParams::default();
        match self {
            Self::Standard => standard,
            Self::HighThreshold => RectangleParams {
                threshold: 250,
                ..standard
            },
            Self::SquareSnap => RectangleParams {
                snap_to_square: true,
                ..standard
            },
        }
    }

    /// Short identifier used in detector names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::HighThreshold => "HighThreshold",
            Self::SquareSnap => "SquareSnap",
        }
    }
}

/// Tunables for [`RectangleDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectangleParams {
    /// Contrast stretch factor.
    pub contrast: f64,
    /// Binary threshold level.
    pub threshold: u8,
    /// Canny low threshold.
    pub canny_low: f32,
    /// Canny high threshold.
    pub canny_high: f32,
    /// Contours must enclose strictly more than this many square pixels.
    pub min_contour_area: f64,
    /// Fallback simplification tolerance as a fraction of the perimeter.
    pub epsilon_factor: f64,
    /// Replace the quadrilateral by the axis-aligned rectangle of its most
    /// square-like vertex pair.
    pub snap_to_square: bool,
}

impl Default for RectangleParams {
    fn default() -> Self {
        Self {
            contrast: 3.0,
            threshold: 225,
            canny_low: 100.0,
            canny_high: 255.0,
            min_contour_area: 1000.0,
            epsilon_factor: 0.04,
            snap_to_square: false,
        }
    }
}

/// Finds the grid as the largest four-sided outer contour.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectangleDetector {
    params: RectangleParams,
}

impl RectangleDetector {
    /// Detector using a preset's parameters.
    #[must_use]
    pub fn new(preset: RectanglePreset) -> Self {
        Self::from_params(preset.params())
    }

    /// Detector using explicit parameters.
    #[must_use]
    pub const fn from_params(params: RectangleParams) -> Self {
        Self { params }
    }

    /// The active parameters.
    #[must_use]
    pub const fn params(&self) -> &RectangleParams {
        &self.params
    }

    /// Locate the grid in a photo.
    ///
    /// Returns `Ok(None)` when no contour survives or it does not reduce
    /// to four vertices in four distinct quadrants.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::EmptyImage`] for a zero-sized image and
    /// [`VisionError::InvalidArgument`] for a non-positive contrast factor.
    pub fn detect(&self, image: &RgbImage) -> Result<Option<Quadrilateral>, VisionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VisionError::EmptyImage);
        }
        let enhanced = grayscale::enhance_contrast(image, self.params.contrast)?;
        let gray = grayscale::to_gray(&enhanced);
        let binary = threshold::binary(&gray, self.params.threshold);
        let edges = edge::canny(&binary, self.params.canny_low, self.params.canny_high);
        let edges = edge::dilate(&edges, 1);
        Ok(self.find_quadrilateral(&edges))
    }

    /// Run the contour stages on an already prepared edge map.
    #[must_use]
    pub fn find_quadrilateral(&self, edges: &image::GrayImage) -> Option<Quadrilateral> {
        let contours = contour::external_contours(edges);
        let largest = contour::largest_contour(&contours, self.params.min_contour_area)?;

        let polygon = simplify::approximate_quad(largest, self.params.epsilon_factor);
        if polygon.len() != simplify::TARGET_VERTICES {
            log::debug!(
                "largest of {} contours reduced to {} vertices",
                contours.len(),
                polygon.len(),
            );
            return None;
        }
        let center = contour::centroid(&polygon)?;
        let quad = Quadrilateral::from_quadrants(&polygon, center)?;

        if self.params.snap_to_square {
            snap_to_square(&quad.corners())
        } else {
            Some(quad)
        }
    }
}

/// Axis-aligned rectangle spanned by the most compact square-like pair.
///
/// A pair is square-like when its horizontal and vertical separations
/// differ by at most [`SQUARE_TOLERANCE`] of the larger one. Among those,
/// the pair with the smallest `dx + dy` wins; earlier pairs win ties.
#[must_use]
pub fn snap_to_square(points: &[Point]) -> Option<Quadrilateral> {
    let mut best: Option<(Point, Point, f64)> = None;
    for (i, &a) in points.iter().enumerate() {
        for &b in &points[i + 1..] {
            let dx = (a.x - b.x).abs();
            let dy = (a.y - b.y).abs();
            if (dx - dy).abs() > SQUARE_TOLERANCE * dx.max(dy) {
                continue;
            }
            let spread = dx + dy;
            if best.is_none_or(|(_, _, s)| spread < s) {
                best = Some((a, b, spread));
            }
        }
    }
    let (a, b, _) = best?;
    let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
    Some(Quadrilateral::new(
        Point::new(min_x, min_y),
        Point::new(max_x, min_y),
        Point::new(min_x, max_y),
        Point::new(max_x, max_y),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;

    /// Black filled square on white paper.
    fn dark_square(x0: u32, y0: u32, side: u32) -> RgbImage {
        RgbImage::from_fn(200, 200, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                Rgb([10, 10, 10])
            } else {
                Rgb([245, 245, 245])
            }
        })
    }

    fn near(p: Point, x: f64, y: f64) -> bool {
        (p.x - x).abs() <= 4.0 && (p.y - y).abs() <= 4.0
    }

    #[test]
    fn presets_differ_only_where_named() {
        let standard = RectanglePreset::Standard.params();
        assert_eq!(RectanglePreset::HighThreshold.params().threshold, 250);
        assert!(RectanglePreset::SquareSnap.params().snap_to_square);
        assert!(!standard.snap_to_square);
        assert_eq!(standard.threshold, 225);
    }

    #[test]
    fn finds_dark_square() {
        let img = dark_square(40, 50, 100);
        let quad = RectangleDetector::new(RectanglePreset::Standard)
            .detect(&img)
            .unwrap()
            .unwrap();
        assert!(near(quad.top_left, 40.0, 50.0), "{quad:?}");
        assert!(near(quad.top_right, 139.0, 50.0), "{quad:?}");
        assert!(near(quad.bottom_left, 40.0, 149.0), "{quad:?}");
        assert!(near(quad.bottom_right, 139.0, 149.0), "{quad:?}");
    }

    #[test]
    fn blank_page_has_no_result() {
        let img = RgbImage::from_pixel(120, 120, Rgb([250, 250, 250]));
        let result = RectangleDetector::new(RectanglePreset::Standard).detect(&img);
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn small_shapes_are_ignored() {
        // 20x20 encloses less than the 1000 px minimum.
        let img = dark_square(90, 90, 20);
        let result = RectangleDetector::new(RectanglePreset::Standard).detect(&img);
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn empty_image_is_an_error() {
        let img = RgbImage::new(0, 0);
        let result = RectangleDetector::default().detect(&img);
        assert!(matches!(result, Err(VisionError::EmptyImage)));
    }

    #[test]
    fn snap_uses_smallest_square_diagonal() {
        let points = [
            Point::new(10.0, 10.0),
            Point::new(110.0, 12.0),
            Point::new(8.0, 108.0),
            Point::new(109.0, 111.0),
        ];
        let quad = snap_to_square(&points).unwrap();
        assert_eq!(quad.top_left, Point::new(10.0, 10.0));
        assert_eq!(quad.bottom_right, Point::new(109.0, 111.0));
        assert_eq!(quad.top_right, Point::new(109.0, 10.0));
        assert_eq!(quad.bottom_left, Point::new(10.0, 111.0));
    }

    #[test]
    fn snap_without_square_pair_is_none() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(0.0, 30.0),
            Point::new(100.0, 30.0),
        ];
        assert!(snap_to_square(&points).is_none());
    }
}
