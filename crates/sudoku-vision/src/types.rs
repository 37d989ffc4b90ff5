//! Shared types for the sudoku-vision pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hand cell tiles around
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can pass decoded photos to
/// the detection engine without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Exact bit pattern of the coordinates, usable as a hash/ordering key.
    ///
    /// `-0.0` is folded into `0.0` so that equal points share a key.
    #[must_use]
    pub fn key(self) -> (u64, u64) {
        ((self.x + 0.0).to_bits(), (self.y + 0.0).to_bits())
    }
}

/// The four corners of a detected puzzle grid, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    /// Corner closest to the image origin.
    pub top_left: Point,
    /// Upper corner on the right-hand side.
    pub top_right: Point,
    /// Lower corner on the left-hand side.
    pub bottom_left: Point,
    /// Corner farthest from the image origin.
    pub bottom_right: Point,
}

impl Quadrilateral {
    /// Create a quadrilateral from corners already in canonical order.
    #[must_use]
    pub const fn new(
        top_left: Point,
        top_right: Point,
        bottom_left: Point,
        bottom_right: Point,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        }
    }

    /// Build a quadrilateral from a canonical `[TL, TR, BL, BR]` slice.
    ///
    /// Returns `None` unless the slice holds exactly four finite points.
    #[must_use]
    pub fn from_corners(points: &[Point]) -> Option<Self> {
        match *points {
            [tl, tr, bl, br] if points.iter().all(|p| p.is_finite()) => {
                Some(Self::new(tl, tr, bl, br))
            }
            _ => None,
        }
    }

    /// Assign each point to a quadrant around `center`.
    ///
    /// A point is on the left when `x <= center.x` and on the top when
    /// `y <= center.y`. When two points land in the same quadrant the later
    /// one replaces the earlier. Returns `None` unless every quadrant ends
    /// up filled.
    #[must_use]
    pub fn from_quadrants(points: &[Point], center: Point) -> Option<Self> {
        let mut slots: [Option<Point>; 4] = [None; 4];
        for &p in points {
            let is_left = p.x <= center.x;
            let is_top = p.y <= center.y;
            let slot = match (is_top, is_left) {
                (true, true) => 0,
                (true, false) => 1,
                (false, true) => 2,
                (false, false) => 3,
            };
            slots[slot] = Some(p);
        }
        let [Some(tl), Some(tr), Some(bl), Some(br)] = slots else {
            return None;
        };
        Some(Self::new(tl, tr, bl, br))
    }

    /// Corners in canonical `[TL, TR, BL, BR]` order.
    #[must_use]
    pub const fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    /// Rectified output extent: the top edge's horizontal span and the
    /// right-to-left vertical drop.
    #[must_use]
    pub fn target_extent(&self) -> (f64, f64) {
        (
            self.top_right.x - self.top_left.x,
            self.bottom_left.y - self.top_right.y,
        )
    }
}

/// Errors that can occur while detecting or rectifying a puzzle.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// The input image has zero width or height.
    #[error("input image is empty")]
    EmptyImage,

    /// The image bytes could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A caller-supplied argument violates a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The triangle search refuses point sets this large.
    #[error("too many points for triangle search: {count} (limit {limit})")]
    TooManyPoints {
        /// Number of points supplied.
        count: usize,
        /// Exclusive upper bound on the point count.
        limit: usize,
    },

    /// The quadrilateral collapses to an empty rectification target.
    #[error("degenerate rectification target: {width}x{height}")]
    DegenerateTarget {
        /// Computed target width in pixels.
        width: f64,
        /// Computed target height in pixels.
        height: f64,
    },

    /// The image is too small to split into the requested grid.
    #[error("image {width}x{height} too small for a {rows}x{cols} grid")]
    ImageTooSmall {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Requested row count.
        rows: u32,
        /// Requested column count.
        cols: u32,
    },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker pool has shut down and no longer accepts jobs.
    #[error("worker pool is closed")]
    PoolClosed,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let d = Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-10);
    }

    #[test]
    fn key_folds_negative_zero() {
        assert_eq!(Point::new(-0.0, 1.0).key(), Point::new(0.0, 1.0).key());
    }

    #[test]
    fn quadrants_assign_canonical_order() {
        let points = [
            Point::new(90.0, 95.0),
            Point::new(10.0, 8.0),
            Point::new(12.0, 92.0),
            Point::new(88.0, 11.0),
        ];
        let quad = Quadrilateral::from_quadrants(&points, Point::new(50.0, 50.0)).unwrap();
        assert_eq!(quad.top_left, Point::new(10.0, 8.0));
        assert_eq!(quad.top_right, Point::new(88.0, 11.0));
        assert_eq!(quad.bottom_left, Point::new(12.0, 92.0));
        assert_eq!(quad.bottom_right, Point::new(90.0, 95.0));
    }

    #[test]
    fn quadrants_on_center_count_as_top_left() {
        let points = [
            Point::new(50.0, 50.0),
            Point::new(60.0, 40.0),
            Point::new(40.0, 60.0),
            Point::new(60.0, 60.0),
        ];
        let quad = Quadrilateral::from_quadrants(&points, Point::new(50.0, 50.0)).unwrap();
        assert_eq!(quad.top_left, Point::new(50.0, 50.0));
    }

    #[test]
    fn missing_quadrant_is_rejected() {
        let points = [
            Point::new(10.0, 10.0),
            Point::new(20.0, 12.0),
            Point::new(10.0, 90.0),
            Point::new(90.0, 10.0),
        ];
        assert!(Quadrilateral::from_quadrants(&points, Point::new(50.0, 50.0)).is_none());
    }

    #[test]
    fn from_corners_requires_exactly_four() {
        let p = Point::new(1.0, 1.0);
        assert!(Quadrilateral::from_corners(&[p, p, p]).is_none());
        assert!(Quadrilateral::from_corners(&[p, p, p, p, p]).is_none());
        assert!(Quadrilateral::from_corners(&[p, p, p, Point::new(f64::NAN, 0.0)]).is_none());
        assert!(Quadrilateral::from_corners(&[p, p, p, p]).is_some());
    }

    #[test]
    fn target_extent_uses_top_edge_and_right_drop() {
        let quad = Quadrilateral::new(
            Point::new(10.0, 20.0),
            Point::new(110.0, 22.0),
            Point::new(12.0, 142.0),
            Point::new(108.0, 140.0),
        );
        let (w, h) = quad.target_extent();
        assert!((w - 100.0).abs() < 1e-10);
        assert!((h - 120.0).abs() < 1e-10);
    }
}
