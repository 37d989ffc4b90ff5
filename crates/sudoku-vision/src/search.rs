//! Exhaustive search for right triangles among candidate corner points.
//!
//! Every triple `i < j < k` is tested, so the cost is cubic in the number
//! of points. The execution strategy is picked from the point count:
//! small sets run inline, medium sets fan out over the first index on the
//! rayon pool, and large sets use recursive fork/join. Point sets at or
//! above [`MAX_POINTS`] are refused rather than truncated.
//!
//! All strategies return the same set of triangles; only the order of
//! the returned vector differs.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::triangle::RightTriangle;
use crate::types::{Point, VisionError};

/// Point counts below this run on the calling thread.
pub const SEQUENTIAL_LIMIT: usize = 20;

/// Point counts below this fan out over the first index.
pub const FAN_OUT_LIMIT: usize = 100;

/// Point counts at or above this are rejected.
pub const MAX_POINTS: usize = 1000;

/// Largest first-index range a fork/join leaf processes sequentially.
pub const SPLIT_THRESHOLD: usize = 15;

/// Exclusive area interval a triangle must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaBounds {
    min: f64,
    max: f64,
}

impl AreaBounds {
    /// No upper limit on the area.
    pub const UNBOUNDED: f64 = f64::MAX;

    /// Create bounds accepting areas strictly between `min` and `max`.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidArgument`] if either bound is NaN,
    /// `min` is negative, or `max <= min`.
    pub fn new(min: f64, max: f64) -> Result<Self, VisionError> {
        if min.is_nan() || max.is_nan() {
            return Err(VisionError::InvalidArgument(
                "area bounds must not be NaN".to_owned(),
            ));
        }
        if min < 0.0 {
            return Err(VisionError::InvalidArgument(format!(
                "minimum area must be non-negative, got {min}"
            )));
        }
        if max <= min {
            return Err(VisionError::InvalidArgument(format!(
                "maximum area {max} must exceed minimum area {min}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Lower (exclusive) bound.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Upper (exclusive) bound.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Returns `true` when `min < area < max`.
    #[must_use]
    pub fn contains(&self, area: f64) -> bool {
        self.min < area && area < self.max
    }
}

/// How the triple enumeration is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    /// Nested loops on the calling thread.
    #[default]
    Sequential,
    /// One rayon task per first index, results concatenated.
    FanOut,
    /// Recursive halving of the first-index range with `rayon::join`.
    DivideAndConquer,
}

impl SearchStrategy {
    /// Strategy used for a point set of `len` points.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::TooManyPoints`] when `len >= MAX_POINTS`.
    pub const fn for_len(len: usize) -> Result<Self, VisionError> {
        if len < SEQUENTIAL_LIMIT {
            Ok(Self::Sequential)
        } else if len < FAN_OUT_LIMIT {
            Ok(Self::FanOut)
        } else if len < MAX_POINTS {
            Ok(Self::DivideAndConquer)
        } else {
            Err(VisionError::TooManyPoints {
                count: len,
                limit: MAX_POINTS,
            })
        }
    }
}

/// Find every right triangle whose area lies within `bounds`.
///
/// # Errors
///
/// Returns [`VisionError::InvalidArgument`] if any point is not finite,
/// or [`VisionError::TooManyPoints`] if there are [`MAX_POINTS`] or more.
pub fn find_right_triangles(
    points: &[Point],
    bounds: AreaBounds,
) -> Result<Vec<RightTriangle>, VisionError> {
    let strategy = SearchStrategy::for_len(points.len())?;
    find_right_triangles_with(strategy, points, bounds)
}

/// Like [`find_right_triangles`], but with an explicit strategy.
///
/// # Errors
///
/// Same as [`find_right_triangles`].
pub fn find_right_triangles_with(
    strategy: SearchStrategy,
    points: &[Point],
    bounds: AreaBounds,
) -> Result<Vec<RightTriangle>, VisionError> {
    if points.len() >= MAX_POINTS {
        return Err(VisionError::TooManyPoints {
            count: points.len(),
            limit: MAX_POINTS,
        });
    }
    if let Some(index) = points.iter().position(|p| !p.is_finite()) {
        return Err(VisionError::InvalidArgument(format!(
            "point {index} has a non-finite coordinate"
        )));
    }

    let found = match strategy {
        SearchStrategy::Sequential => scan_range(points, bounds, 0, points.len()),
        SearchStrategy::FanOut => (0..points.len())
            .into_par_iter()
            .flat_map_iter(|i| scan_range(points, bounds, i, i + 1))
            .collect(),
        SearchStrategy::DivideAndConquer => split_range(points, bounds, 0, points.len()),
    };

    log::debug!(
        "triangle search: {} points, {strategy:?}, {} matches",
        points.len(),
        found.len(),
    );
    Ok(found)
}

/// Recursively halve `start..end` until ranges are small enough to scan.
fn split_range(points: &[Point], bounds: AreaBounds, start: usize, end: usize) -> Vec<RightTriangle> {
    if end - start <= SPLIT_THRESHOLD {
        return scan_range(points, bounds, start, end);
    }
    let mid = start + (end - start) / 2;
    let (mut left, right) = rayon::join(
        || split_range(points, bounds, start, mid),
        || split_range(points, bounds, mid, end),
    );
    left.extend(right);
    left
}

/// Test every triple whose first index lies in `start..end`.
fn scan_range(points: &[Point], bounds: AreaBounds, start: usize, end: usize) -> Vec<RightTriangle> {
    let n = points.len();
    let mut found = Vec::new();
    for i in start..end {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let triangle = RightTriangle::new(points[i], points[j], points[k]);
                if triangle.is_right() && bounds.contains(triangle.area()) {
                    found.push(triangle);
                }
            }
        }
    }
    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    type TriangleKey = [(u64, u64); 3];

    fn keys(triangles: &[RightTriangle]) -> BTreeSet<TriangleKey> {
        triangles
            .iter()
            .map(|t| t.points().map(Point::key))
            .collect()
    }

    /// Jittered lattice: plenty of near-axis pairs, so many triangles pass.
    fn lattice(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let col = (i % 8) as f64;
                let row = (i / 8) as f64;
                let jitter = ((i * 7) % 5) as f64 * 0.5;
                Point::new(col.mul_add(40.0, jitter), row.mul_add(40.0, -jitter))
            })
            .collect()
    }

    fn unbounded() -> AreaBounds {
        AreaBounds::new(0.0, AreaBounds::UNBOUNDED).unwrap()
    }

    #[test]
    fn strategy_follows_point_count() {
        assert_eq!(SearchStrategy::for_len(0).unwrap(), SearchStrategy::Sequential);
        assert_eq!(SearchStrategy::for_len(19).unwrap(), SearchStrategy::Sequential);
        assert_eq!(SearchStrategy::for_len(20).unwrap(), SearchStrategy::FanOut);
        assert_eq!(SearchStrategy::for_len(99).unwrap(), SearchStrategy::FanOut);
        assert_eq!(
            SearchStrategy::for_len(100).unwrap(),
            SearchStrategy::DivideAndConquer
        );
        assert_eq!(
            SearchStrategy::for_len(999).unwrap(),
            SearchStrategy::DivideAndConquer
        );
        assert!(matches!(
            SearchStrategy::for_len(1000),
            Err(VisionError::TooManyPoints { count: 1000, limit: 1000 })
        ));
    }

    #[test]
    fn bounds_validation() {
        assert!(AreaBounds::new(-1.0, 10.0).is_err());
        assert!(AreaBounds::new(10.0, 10.0).is_err());
        assert!(AreaBounds::new(10.0, 5.0).is_err());
        assert!(AreaBounds::new(f64::NAN, 5.0).is_err());
        assert!(AreaBounds::new(0.0, 5.0).is_ok());
    }

    #[test]
    fn bounds_are_exclusive() {
        let bounds = AreaBounds::new(10.0, 20.0).unwrap();
        assert!(!bounds.contains(10.0));
        assert!(bounds.contains(15.0));
        assert!(!bounds.contains(20.0));
    }

    #[test]
    fn non_finite_point_is_rejected() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(f64::NAN, 3.0),
            Point::new(4.0, 4.0),
        ];
        let result = find_right_triangles(&points, unbounded());
        assert!(matches!(result, Err(VisionError::InvalidArgument(_))));
    }

    #[test]
    fn too_many_points_is_rejected_not_truncated() {
        let points = vec![Point::new(0.0, 0.0); MAX_POINTS];
        let result = find_right_triangles(&points, unbounded());
        assert!(matches!(result, Err(VisionError::TooManyPoints { .. })));
        let result =
            find_right_triangles_with(SearchStrategy::Sequential, &points, unbounded());
        assert!(matches!(result, Err(VisionError::TooManyPoints { .. })));
    }

    #[test]
    fn fewer_than_three_points_find_nothing() {
        let points = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        assert!(find_right_triangles(&points, unbounded()).unwrap().is_empty());
        assert!(find_right_triangles(&[], unbounded()).unwrap().is_empty());
    }

    #[test]
    fn finds_single_axis_aligned_triangle() {
        let points = [
            Point::new(100.0, 100.0),
            Point::new(160.0, 100.0),
            Point::new(100.0, 160.0),
        ];
        let found = find_right_triangles(&points, unbounded()).unwrap();
        assert_eq!(found.len(), 1);
        assert!((found[0].area() - 1800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn area_bounds_filter_matches() {
        let points = [
            Point::new(100.0, 100.0),
            Point::new(160.0, 100.0),
            Point::new(100.0, 160.0),
        ];
        let bounds = AreaBounds::new(2000.0, 5000.0).unwrap();
        assert!(find_right_triangles(&points, bounds).unwrap().is_empty());
    }

    #[test]
    fn fan_out_and_divide_and_conquer_agree() {
        let points = lattice(50);
        let bounds = AreaBounds::new(100.0, 200_000.0).unwrap();

        let fan_out =
            find_right_triangles_with(SearchStrategy::FanOut, &points, bounds).unwrap();
        let split =
            find_right_triangles_with(SearchStrategy::DivideAndConquer, &points, bounds).unwrap();

        assert!(!fan_out.is_empty());
        assert_eq!(fan_out.len(), split.len());
        assert_eq!(keys(&fan_out), keys(&split));
    }

    #[test]
    fn every_strategy_matches_sequential() {
        let points = lattice(40);
        let bounds = unbounded();
        let expected = keys(
            &find_right_triangles_with(SearchStrategy::Sequential, &points, bounds).unwrap(),
        );
        for strategy in [SearchStrategy::FanOut, SearchStrategy::DivideAndConquer] {
            let got = find_right_triangles_with(strategy, &points, bounds).unwrap();
            assert_eq!(keys(&got), expected, "{strategy:?} disagrees");
        }
    }

    #[test]
    fn divide_and_conquer_covers_every_leaf_index() {
        // The only triangle starts at the last index a leaf would own.
        let mut points: Vec<Point> = (0..(SPLIT_THRESHOLD * 2 + 3))
            .map(|i| {
                let i = i as f64;
                Point::new(i.mul_add(23.0, 500.0), i.mul_add(31.0, 700.0))
            })
            .collect();
        let at = points.len() - 3;
        points[at] = Point::new(10.0, 10.0);
        points[at + 1] = Point::new(60.0, 10.0);
        points[at + 2] = Point::new(10.0, 60.0);

        let found =
            find_right_triangles_with(SearchStrategy::DivideAndConquer, &points, unbounded())
                .unwrap();
        assert_eq!(found.len(), 1);
    }
}
