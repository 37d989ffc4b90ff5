//! Shi-Tomasi corner features.
//!
//! The corner response of a pixel is the smaller eigenvalue of the
//! gradient structure tensor summed over its 3x3 neighbourhood. Pixels
//! whose response reaches `quality_level` times the strongest response and
//! that are local maxima become candidates; candidates are then accepted
//! strongest first, skipping any closer than `min_distance` to one
//! already accepted.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Tunables for [`good_features`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureParams {
    /// Maximum number of corners returned; 0 means no limit.
    pub max_corners: usize,
    /// Fraction of the strongest response a corner must reach.
    pub quality_level: f64,
    /// Minimum Euclidean distance between returned corners, in pixels.
    pub min_distance: f64,
}

impl FeatureParams {
    /// Default maximum corner count.
    pub const DEFAULT_MAX_CORNERS: usize = 500;
    /// Default quality fraction.
    pub const DEFAULT_QUALITY_LEVEL: f64 = 0.01;
    /// Default minimum spacing in pixels.
    pub const DEFAULT_MIN_DISTANCE: f64 = 10.0;
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            max_corners: Self::DEFAULT_MAX_CORNERS,
            quality_level: Self::DEFAULT_QUALITY_LEVEL,
            min_distance: Self::DEFAULT_MIN_DISTANCE,
        }
    }
}

/// Find up to `params.max_corners` strong, well-separated corners.
///
/// Corners are returned strongest first; equal responses are ordered by
/// row, then column.
#[must_use = "returns the detected corners"]
pub fn good_features(image: &GrayImage, params: &FeatureParams) -> Vec<Point> {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return Vec::new();
    }

    let response = min_eigen_response(image);
    let strongest = response.iter().copied().fold(0.0_f64, f64::max);
    if strongest <= 0.0 {
        return Vec::new();
    }
    let floor = params.quality_level.max(0.0) * strongest;

    let w = width as usize;
    let h = height as usize;
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let r = response[y * w + x];
            if r <= 0.0 || r < floor {
                continue;
            }
            let is_peak = (y - 1..=y + 1)
                .all(|ny| (x - 1..=x + 1).all(|nx| response[ny * w + nx] <= r));
            if is_peak {
                candidates.push((r, y, x));
            }
        }
    }
    // Stable sort keeps row-major order among equal responses.
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let accepted = space_out(&candidates, params, w, h);
    log::debug!(
        "good features: {} candidates, {} accepted",
        candidates.len(),
        accepted.len(),
    );
    accepted
}

/// Greedy minimum-distance filter over strength-sorted candidates, using
/// a coarse grid so each check only inspects neighbouring buckets.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn space_out(
    candidates: &[(f64, usize, usize)],
    params: &FeatureParams,
    width: usize,
    height: usize,
) -> Vec<Point> {
    let limit = if params.max_corners == 0 {
        usize::MAX
    } else {
        params.max_corners
    };
    let min_distance = params.min_distance.max(0.0);
    let min_distance_sq = min_distance * min_distance;
    let cell = min_distance.max(1.0).ceil() as usize;
    let grid_w = width.div_ceil(cell);
    let grid_h = height.div_ceil(cell);
    let mut buckets: Vec<Vec<Point>> = vec![Vec::new(); grid_w * grid_h];

    let mut accepted = Vec::new();
    for &(_, y, x) in candidates {
        if accepted.len() >= limit {
            break;
        }
        let p = Point::new(x as f64, y as f64);
        let gx = x / cell;
        let gy = y / cell;
        let crowded = (gy.saturating_sub(1)..=(gy + 1).min(grid_h - 1)).any(|by| {
            (gx.saturating_sub(1)..=(gx + 1).min(grid_w - 1)).any(|bx| {
                buckets[by * grid_w + bx]
                    .iter()
                    .any(|q| q.distance_squared(p) < min_distance_sq)
            })
        });
        if crowded {
            continue;
        }
        buckets[gy * grid_w + gx].push(p);
        accepted.push(p);
    }
    accepted
}

/// Minimum eigenvalue of the 3x3-summed structure tensor at every pixel,
/// in row-major order.
fn min_eigen_response(image: &GrayImage) -> Vec<f64> {
    let gx = imageproc::gradients::horizontal_sobel(image);
    let gy = imageproc::gradients::vertical_sobel(image);
    let (width, height) = image.dimensions();
    let w = width as usize;
    let h = height as usize;

    let mut xx = vec![0.0; w * h];
    let mut yy = vec![0.0; w * h];
    let mut xy = vec![0.0; w * h];
    for (x, y, p) in gx.enumerate_pixels() {
        let i = y as usize * w + x as usize;
        let dx = f64::from(p.0[0]);
        let dy = f64::from(gy.get_pixel(x, y).0[0]);
        xx[i] = dx * dx;
        yy[i] = dy * dy;
        xy[i] = dx * dy;
    }

    let xx = box_sum3(&xx, w, h);
    let yy = box_sum3(&yy, w, h);
    let xy = box_sum3(&xy, w, h);

    xx.iter()
        .zip(&yy)
        .zip(&xy)
        .map(|((&a, &c), &b)| {
            let half_trace = (a + c) / 2.0;
            let half_diff = (a - c) / 2.0;
            half_trace - half_diff.hypot(b)
        })
        .collect()
}

/// 3x3 window sum with edge replication.
fn box_sum3(values: &[f64], w: usize, h: usize) -> Vec<f64> {
    let mut out = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for ny in [y.saturating_sub(1), y, (y + 1).min(h - 1)] {
                for nx in [x.saturating_sub(1), x, (x + 1).min(w - 1)] {
                    sum += values[ny * w + nx];
                }
            }
            out[y * w + x] = sum;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White rectangle on black with corners at (20, 15) and (69, 54).
    fn rectangle_image() -> GrayImage {
        GrayImage::from_fn(90, 70, |x, y| {
            let inside = (20..70).contains(&x) && (15..55).contains(&y);
            image::Luma([if inside { 255 } else { 0 }])
        })
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = GrayImage::from_pixel(30, 30, image::Luma([200]));
        assert!(good_features(&img, &FeatureParams::default()).is_empty());
    }

    #[test]
    fn tiny_image_has_no_corners() {
        let img = GrayImage::from_pixel(2, 2, image::Luma([0]));
        assert!(good_features(&img, &FeatureParams::default()).is_empty());
    }

    #[test]
    fn rectangle_yields_its_four_corners() {
        let corners = good_features(&rectangle_image(), &FeatureParams::default());
        assert_eq!(corners.len(), 4, "{corners:?}");
        for expected in [
            Point::new(20.0, 15.0),
            Point::new(69.0, 15.0),
            Point::new(20.0, 54.0),
            Point::new(69.0, 54.0),
        ] {
            assert!(
                corners.iter().any(|c| c.distance(expected) < 3.0),
                "no corner near {expected:?}: {corners:?}",
            );
        }
    }

    #[test]
    fn max_corners_caps_output() {
        let params = FeatureParams {
            max_corners: 2,
            ..FeatureParams::default()
        };
        assert_eq!(good_features(&rectangle_image(), &params).len(), 2);
    }

    #[test]
    fn min_distance_is_respected() {
        let corners = good_features(&rectangle_image(), &FeatureParams::default());
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                assert!(a.distance(*b) >= FeatureParams::DEFAULT_MIN_DISTANCE);
            }
        }
    }
}
