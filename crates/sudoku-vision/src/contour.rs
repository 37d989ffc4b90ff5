//! Outer contour extraction and polygon measurements.
//!
//! Contours come from Suzuki-Abe border following
//! (`imageproc::contours::find_contours`); only top-level outer borders
//! are kept, so the holes inside a grid never compete with its frame.

use image::GrayImage;
use imageproc::contours::BorderType;

use crate::types::Point;

/// Moments below this magnitude mean the polygon has no usable mass.
pub const MIN_MOMENT: f64 = 1e-9;

/// Trace the outermost borders of the white regions in `binary`.
#[must_use = "returns the traced contours"]
pub fn external_contours(binary: &GrayImage) -> Vec<Vec<Point>> {
    imageproc::contours::find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect()
        })
        .collect()
}

/// Signed shoelace sum over the closed polygon, doubled.
fn doubled_signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x.mul_add(b.y, -(b.x * a.y))
        })
        .sum()
}

/// Unsigned area enclosed by the closed polygon.
#[must_use]
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    doubled_signed_area(points).abs() / 2.0
}

/// Perimeter of the closed polygon.
#[must_use]
pub fn arc_length(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| points[i].distance(points[(i + 1) % n])).sum()
}

/// The contour with the largest enclosed area strictly above `min_area`.
///
/// Earlier contours win ties.
#[must_use]
pub fn largest_contour(contours: &[Vec<Point>], min_area: f64) -> Option<&[Point]> {
    let mut best: Option<(&[Point], f64)> = None;
    for contour in contours {
        let area = polygon_area(contour);
        if area <= min_area {
            continue;
        }
        if best.is_none_or(|(_, best_area)| area > best_area) {
            best = Some((contour.as_slice(), area));
        }
    }
    best.map(|(contour, _)| contour)
}

/// Centre of mass of the polygon's enclosed region.
///
/// Returns `None` when the zeroth moment is below [`MIN_MOMENT`] in
/// magnitude.
#[must_use]
pub fn centroid(points: &[Point]) -> Option<Point> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let mut m00 = 0.0;
    let mut m10 = 0.0;
    let mut m01 = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let cross = a.x.mul_add(b.y, -(b.x * a.y));
        m00 += cross;
        m10 += (a.x + b.x) * cross;
        m01 += (a.y + b.y) * cross;
    }
    m00 /= 2.0;
    if m00.abs() < MIN_MOMENT {
        return None;
    }
    Some(Point::new(m10 / (6.0 * m00), m01 / (6.0 * m00)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, side: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn area_is_orientation_independent() {
        let mut sq = square(0.0, 0.0, 10.0);
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-10);
        sq.reverse();
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn arc_length_closes_the_polygon() {
        assert!((arc_length(&square(0.0, 0.0, 10.0)) - 40.0).abs() < 1e-10);
    }

    #[test]
    fn centroid_of_square_is_its_center() {
        let c = centroid(&square(10.0, 20.0, 40.0)).unwrap();
        assert!((c.x - 30.0).abs() < 1e-10);
        assert!((c.y - 40.0).abs() < 1e-10);
    }

    #[test]
    fn centroid_of_collinear_points_is_none() {
        let line = [Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(10.0, 10.0)];
        assert!(centroid(&line).is_none());
    }

    #[test]
    fn largest_contour_respects_minimum() {
        let contours = vec![square(0.0, 0.0, 10.0), square(50.0, 50.0, 30.0)];
        let best = largest_contour(&contours, 50.0).unwrap();
        assert!((polygon_area(best) - 900.0).abs() < 1e-10);
        assert!(largest_contour(&contours, 900.0).is_none());
    }

    #[test]
    fn external_contours_skip_holes() {
        // White ring: outer border plus a hole border.
        let img = GrayImage::from_fn(30, 30, |x, y| {
            let outer = (5..25).contains(&x) && (5..25).contains(&y);
            let inner = (10..20).contains(&x) && (10..20).contains(&y);
            image::Luma([if outer && !inner { 255 } else { 0 }])
        });
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        let area = polygon_area(&contours[0]);
        assert!((area - 19.0 * 19.0).abs() < 1e-6, "area {area}");
    }

    #[test]
    fn nested_blob_inside_hole_is_not_external() {
        let img = GrayImage::from_fn(40, 40, |x, y| {
            let outer = (5..35).contains(&x) && (5..35).contains(&y);
            let hole = (10..30).contains(&x) && (10..30).contains(&y);
            let island = (15..25).contains(&x) && (15..25).contains(&y);
            image::Luma([if (outer && !hole) || island { 255 } else { 0 }])
        });
        assert_eq!(external_contours(&img).len(), 1);
    }
}
