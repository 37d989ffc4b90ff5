//! Perspective rectification and grid splitting.
//!
//! [`warp`] maps a detected quadrilateral onto an upright rectangle whose
//! size follows the quadrilateral's top edge and right-hand drop.
//! [`split`] cuts an image into a regular grid of owned cell images.

use image::{ImageBuffer, Pixel, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection};

use crate::types::{Quadrilateral, VisionError};

/// Each cell must be at least this many pixels along both axes.
pub const MIN_CELL_PX: u32 = 4;

/// A rectified image may hold at most this many times the source's pixels.
pub const MAX_UPSCALE: u64 = 16;

/// Warp the region inside `quad` to an axis-aligned image.
///
/// The output is `(TR.x - TL.x) x (BL.y - TR.y)` pixels, truncated.
/// Pixels that map outside the source are black.
///
/// # Errors
///
/// Returns [`VisionError::EmptyImage`] for a zero-sized source,
/// [`VisionError::InvalidArgument`] for non-finite corners, and
/// [`VisionError::DegenerateTarget`] when the output would be smaller than
/// one pixel along either axis, larger than [`MAX_UPSCALE`] times the
/// source, or the corners admit no projection.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn warp(image: &RgbImage, quad: &Quadrilateral) -> Result<RgbImage, VisionError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(VisionError::EmptyImage);
    }
    if !quad.corners().iter().all(|p| p.is_finite()) {
        return Err(VisionError::InvalidArgument(
            "quadrilateral corners must be finite".to_owned(),
        ));
    }

    let (width, height) = quad.target_extent();
    let degenerate = || VisionError::DegenerateTarget { width, height };
    if width < 1.0 || height < 1.0 || width > f64::from(u32::MAX) || height > f64::from(u32::MAX) {
        return Err(degenerate());
    }
    let out_w = width as u32;
    let out_h = height as u32;
    let source_pixels = u64::from(image.width()) * u64::from(image.height());
    let limit = source_pixels.saturating_mul(MAX_UPSCALE);
    if u64::from(out_w) * u64::from(out_h) > limit {
        return Err(degenerate());
    }

    let from = quad.corners().map(|p| (p.x as f32, p.y as f32));
    let (w, h) = (out_w as f32, out_h as f32);
    let to = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
    let projection = Projection::from_control_points(from, to).ok_or_else(degenerate)?;

    let mut out = RgbImage::new(out_w, out_h);
    imageproc::geometric_transformations::warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        image::Rgb([0, 0, 0]),
        &mut out,
    );
    log::debug!("rectified {}x{} to {out_w}x{out_h}", image.width(), image.height());
    Ok(out)
}

/// Row-major grid of cell values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellGrid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> CellGrid<T> {
    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Cell at `(row, col)`, if in range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Cells with their `(row, col)` positions, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i / cols, i % cols, cell))
    }

    /// Transform every cell, keeping the layout.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CellGrid<U> {
        CellGrid {
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.into_iter().map(f).collect(),
        }
    }

    /// The cells in row-major order.
    #[must_use]
    pub fn into_cells(self) -> Vec<T> {
        self.cells
    }
}

/// Cut `image` into `rows x cols` equal cells.
///
/// Cell size is the integer quotient of the image size by the grid size;
/// leftover pixels at the right and bottom edges are ignored. `border`
/// pixels are trimmed from every side of each cell.
///
/// # Errors
///
/// Returns [`VisionError::InvalidArgument`] for a zero row or column count
/// or a border that would consume a whole cell, and
/// [`VisionError::ImageTooSmall`] when cells would be narrower or shorter
/// than [`MIN_CELL_PX`].
pub fn split<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    rows: u32,
    cols: u32,
    border: u32,
) -> Result<CellGrid<ImageBuffer<P, Vec<P::Subpixel>>>, VisionError>
where
    P: Pixel + 'static,
{
    if rows == 0 || cols == 0 {
        return Err(VisionError::InvalidArgument(format!(
            "grid must have positive rows and columns, got {rows}x{cols}"
        )));
    }
    let (width, height) = image.dimensions();
    if width / MIN_CELL_PX < cols || height / MIN_CELL_PX < rows {
        return Err(VisionError::ImageTooSmall {
            width,
            height,
            rows,
            cols,
        });
    }

    let step_x = width / cols;
    let step_y = height / rows;
    let trimmed = border.saturating_mul(2);
    if trimmed >= step_x || trimmed >= step_y {
        return Err(VisionError::InvalidArgument(format!(
            "border {border} leaves nothing of a {step_x}x{step_y} cell"
        )));
    }

    let mut cells = Vec::with_capacity(rows as usize * cols as usize);
    for row in 0..rows {
        for col in 0..cols {
            let cell = image::imageops::crop_imm(
                image,
                col * step_x + border,
                row * step_y + border,
                step_x - trimmed,
                step_y - trimmed,
            )
            .to_image();
            cells.push(cell);
        }
    }

    Ok(CellGrid {
        rows: rows as usize,
        cols: cols as usize,
        cells,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GrayImage, Luma, Rgb};

    use super::*;
    use crate::types::Point;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(100, 100, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, 90]))
    }

    #[test]
    fn axis_aligned_rectangle_is_reproduced() {
        let src = gradient();
        let quad = Quadrilateral::new(
            Point::new(20.0, 10.0),
            Point::new(80.0, 10.0),
            Point::new(20.0, 70.0),
            Point::new(80.0, 70.0),
        );
        let out = warp(&src, &quad).unwrap();
        assert_eq!(out.dimensions(), (60, 60));
        for y in 0..59 {
            for x in 0..59 {
                let got = out.get_pixel(x, y).0;
                let want = src.get_pixel(x + 20, y + 10).0;
                for (g, w) in got.iter().zip(&want) {
                    assert!(g.abs_diff(*w) <= 2, "({x},{y}): {got:?} vs {want:?}");
                }
            }
        }
    }

    #[test]
    fn output_size_is_truncated() {
        let quad = Quadrilateral::new(
            Point::new(0.0, 0.0),
            Point::new(40.7, 0.0),
            Point::new(0.0, 30.9),
            Point::new(40.7, 30.9),
        );
        assert_eq!(warp(&gradient(), &quad).unwrap().dimensions(), (40, 30));
    }

    #[test]
    fn collapsed_quadrilateral_is_degenerate() {
        let p = Point::new(10.0, 10.0);
        let quad = Quadrilateral::new(p, p, p, p);
        assert!(matches!(
            warp(&gradient(), &quad),
            Err(VisionError::DegenerateTarget { .. })
        ));
    }

    #[test]
    fn oversized_target_is_degenerate() {
        let quad = Quadrilateral::new(
            Point::new(0.0, 0.0),
            Point::new(4e9, 0.0),
            Point::new(0.0, 4e9),
            Point::new(4e9, 4e9),
        );
        assert!(matches!(
            warp(&RgbImage::new(10, 10), &quad),
            Err(VisionError::DegenerateTarget { .. })
        ));

        // 41x40 is just over 16 times a 10x10 source.
        let quad = Quadrilateral::new(
            Point::new(0.0, 0.0),
            Point::new(41.0, 0.0),
            Point::new(0.0, 40.0),
            Point::new(41.0, 40.0),
        );
        assert!(matches!(
            warp(&RgbImage::new(10, 10), &quad),
            Err(VisionError::DegenerateTarget { .. })
        ));
        let quad = Quadrilateral::new(
            Point::new(0.0, 0.0),
            Point::new(40.0, 0.0),
            Point::new(0.0, 40.0),
            Point::new(40.0, 40.0),
        );
        assert_eq!(warp(&RgbImage::new(10, 10), &quad).unwrap().dimensions(), (40, 40));
    }

    #[test]
    fn inverted_quadrilateral_is_degenerate() {
        let quad = Quadrilateral::new(
            Point::new(80.0, 80.0),
            Point::new(10.0, 80.0),
            Point::new(80.0, 10.0),
            Point::new(10.0, 10.0),
        );
        assert!(matches!(
            warp(&gradient(), &quad),
            Err(VisionError::DegenerateTarget { .. })
        ));
    }

    #[test]
    fn empty_source_is_rejected() {
        let quad = Quadrilateral::new(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
        );
        assert!(matches!(warp(&RgbImage::new(0, 0), &quad), Err(VisionError::EmptyImage)));
    }

    #[test]
    fn split_90_into_81_cells() {
        // Every 10x10 block carries its own value.
        let img = GrayImage::from_fn(90, 90, |x, y| Luma([((y / 10) * 9 + x / 10) as u8]));
        let grid = split(&img, 9, 9, 0).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (9, 9));
        assert_eq!(grid.iter().count(), 81);
        for (row, col, cell) in grid.iter() {
            assert_eq!(cell.dimensions(), (10, 10));
            let expected = (row * 9 + col) as u8;
            assert!(cell.pixels().all(|p| p.0[0] == expected), "cell ({row},{col})");
        }
    }

    #[test]
    fn border_trims_each_side() {
        let img = GrayImage::from_fn(90, 90, |x, y| Luma([u8::from(x % 10 == 0 || y % 10 == 0) * 255]));
        let grid = split(&img, 9, 9, 1).unwrap();
        let cell = grid.get(4, 4).unwrap();
        assert_eq!(cell.dimensions(), (8, 8));
        assert!(cell.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn split_validates_arguments() {
        let img = GrayImage::new(90, 90);
        assert!(matches!(split(&img, 0, 9, 0), Err(VisionError::InvalidArgument(_))));
        assert!(matches!(split(&img, 9, 0, 0), Err(VisionError::InvalidArgument(_))));
        assert!(matches!(split(&img, 9, 9, 5), Err(VisionError::InvalidArgument(_))));
        assert!(matches!(
            split(&GrayImage::new(30, 90), 9, 9, 0),
            Err(VisionError::ImageTooSmall { .. })
        ));
    }

    #[test]
    fn grid_accessors() {
        let img = GrayImage::new(40, 20);
        let grid = split(&img, 2, 4, 0).unwrap();
        assert!(grid.get(1, 3).is_some());
        assert!(grid.get(2, 0).is_none());
        assert!(grid.get(0, 4).is_none());
        let sizes = grid.map(|c| c.width());
        assert_eq!(sizes.into_cells(), vec![10; 8]);
    }
}
