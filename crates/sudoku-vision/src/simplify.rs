//! Polygon approximation using the Ramer-Douglas-Peucker algorithm.
//!
//! [`approximate_closed`] reduces a closed contour to the vertices that
//! deviate more than a tolerance from the chords between their
//! neighbours. [`approximate_quad`] searches for a tolerance, expressed as
//! a fraction of the contour's perimeter, at which exactly four vertices
//! remain.

use crate::contour::arc_length;
use crate::types::Point;

/// Vertex count the quadrilateral search aims for.
pub const TARGET_VERTICES: usize = 4;

/// Smallest perimeter fraction tried by the quadrilateral search.
pub const MIN_EPSILON_FRACTION: f64 = 0.005;

/// Largest perimeter fraction tried by the quadrilateral search.
pub const MAX_EPSILON_FRACTION: f64 = 0.5;

/// The search stops once its bracket is narrower than this.
pub const EPSILON_PRECISION: f64 = 0.001;

/// Simplify an open polyline, always keeping both endpoints.
///
/// Polylines with fewer than 3 points are returned unchanged.
#[must_use = "returns the simplified polyline"]
pub fn simplify_open(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Simplify a closed polygon.
///
/// The ring is cut at the first point and at the point farthest from it;
/// both halves are simplified as open polylines and rejoined, so the two
/// cut points always survive. The closing vertex is not repeated.
#[must_use = "returns the simplified polygon"]
pub fn approximate_closed(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let anchor = points[0];
    let far = points
        .iter()
        .enumerate()
        .skip(1)
        .fold((0, 0.0), |(best, best_d), (i, p)| {
            let d = p.distance_squared(anchor);
            if d > best_d { (i, d) } else { (best, best_d) }
        })
        .0;
    if far == 0 {
        // Every point coincides with the anchor.
        return vec![anchor];
    }

    let first = simplify_open(&points[..=far], tolerance);
    let mut second_half: Vec<Point> = points[far..].to_vec();
    second_half.push(anchor);
    let second = simplify_open(&second_half, tolerance);

    let mut out = first;
    // Skip the shared far point and the repeated anchor.
    out.extend_from_slice(&second[1..second.len() - 1]);
    out
}

/// Approximate a closed contour with [`TARGET_VERTICES`] vertices.
///
/// Tolerances are perimeter fractions between [`MIN_EPSILON_FRACTION`] and
/// [`MAX_EPSILON_FRACTION`]. If even the smallest tolerance leaves too few
/// vertices, or the largest still leaves too many, that extreme's result is
/// returned. Otherwise the bracket is bisected until a four-vertex result is
/// found or the bracket is narrower than [`EPSILON_PRECISION`], in which
/// case the result at `fallback_fraction` is returned. Callers must check
/// the vertex count of the result.
#[must_use = "returns the approximated polygon"]
pub fn approximate_quad(contour: &[Point], fallback_fraction: f64) -> Vec<Point> {
    let perimeter = arc_length(contour);
    let at = |fraction: f64| approximate_closed(contour, fraction * perimeter);

    let mut low = MIN_EPSILON_FRACTION;
    let mut high = MAX_EPSILON_FRACTION;

    let fine = at(low);
    if fine.len() <= TARGET_VERTICES {
        return fine;
    }
    let coarse = at(high);
    if coarse.len() >= TARGET_VERTICES {
        return coarse;
    }

    while high - low > EPSILON_PRECISION {
        let mid = f64::midpoint(low, high);
        let approx = at(mid);
        match approx.len() {
            TARGET_VERTICES => return approx,
            n if n > TARGET_VERTICES => low = mid,
            _ => high = mid,
        }
    }

    log::debug!("polygon search did not converge, using fallback fraction {fallback_fraction}");
    at(fallback_fraction)
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`, or the
/// distance to `a` when the two coincide.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
