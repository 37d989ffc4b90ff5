//! Right-triangle heuristic over three candidate corner points.
//!
//! Three corner features that form a roughly axis-aligned right triangle
//! are treated as a plausible grid corner. The triangle's bounding box
//! doubles as the candidate quadrilateral.

use crate::types::{Point, Quadrilateral};

/// An edge counts as horizontal (or vertical) when its vertical (or
/// horizontal) extent is below this many pixels.
pub const AXIS_TOLERANCE_PX: f64 = 5.0;

/// Maximum relative width/height mismatch for a square-like triangle.
pub const SQUARE_TOLERANCE: f64 = 0.05;

/// Axis classification of one triangle edge.
#[derive(Debug, Clone, Copy)]
struct Edge {
    horizontal: bool,
    vertical: bool,
}

impl Edge {
    fn between(a: Point, b: Point) -> Self {
        Self {
            horizontal: (a.y - b.y).abs() < AXIS_TOLERANCE_PX,
            vertical: (a.x - b.x).abs() < AXIS_TOLERANCE_PX,
        }
    }
}

/// Three source points and the quantities derived from their bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RightTriangle {
    points: [Point; 3],
    min: Point,
    max: Point,
    area: f64,
    is_right: bool,
    is_square_like: bool,
}

impl RightTriangle {
    /// Evaluate the triangle formed by `p1`, `p2`, `p3` (in that order).
    #[must_use]
    pub fn new(p1: Point, p2: Point, p3: Point) -> Self {
        let min = Point::new(p1.x.min(p2.x).min(p3.x), p1.y.min(p2.y).min(p3.y));
        let max = Point::new(p1.x.max(p2.x).max(p3.x), p1.y.max(p2.y).max(p3.y));
        let width = max.x - min.x;
        let height = max.y - min.y;

        Self {
            points: [p1, p2, p3],
            min,
            max,
            area: width * height / 2.0,
            is_right: is_right(p1, p2, p3),
            is_square_like: (width - height).abs() <= SQUARE_TOLERANCE * width.max(height),
        }
    }

    /// The source points in construction order.
    #[must_use]
    pub const fn points(&self) -> [Point; 3] {
        self.points
    }

    /// Bounding-box corner opposite the minimum corner, `(x2, y2)`.
    #[must_use]
    pub const fn square_point(&self) -> Point {
        self.max
    }

    /// Half the bounding-box area.
    ///
    /// This is a size proxy for the candidate grid, not the geometric
    /// area of the triangle.
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }

    /// Whether the edges contain both an axis-horizontal and an
    /// axis-vertical leg.
    #[must_use]
    pub const fn is_right(&self) -> bool {
        self.is_right
    }

    /// Whether the bounding box is square within [`SQUARE_TOLERANCE`].
    #[must_use]
    pub const fn is_square_like(&self) -> bool {
        self.is_square_like
    }

    /// Bounding-box corners as a quadrilateral; the bottom-right corner is
    /// the [`square_point`](Self::square_point).
    #[must_use]
    pub const fn quadrilateral(&self) -> Quadrilateral {
        Quadrilateral::new(
            self.min,
            Point::new(self.max.x, self.min.y),
            Point::new(self.min.x, self.max.y),
            self.max,
        )
    }
}

/// Chain the per-edge flags into the horizontal and vertical verdicts.
///
/// The third flag of each chain pairs edge 2's primary axis with edge 3's
/// cross axis. This pairing is kept as-is; changing it changes which
/// vertex orders pass.
fn is_right(p1: Point, p2: Point, p3: Point) -> bool {
    let e1 = Edge::between(p1, p2);
    let e2 = Edge::between(p2, p3);
    let e3 = Edge::between(p3, p1);

    let h1 = e1.horizontal && !e1.vertical;
    let h2 = e2.horizontal && !e2.vertical;
    let h3 = e2.horizontal && !e3.vertical;
    let v1 = !e1.horizontal && e1.vertical;
    let v2 = !e2.horizontal && e2.vertical;
    let v3 = !e2.horizontal && e3.vertical;

    let horizontal = (h1 && !h2) || (h2 && !h3) || h3;
    let vertical = (v1 && !v2) || (v2 && !v3) || v3;

    horizontal && vertical
}
