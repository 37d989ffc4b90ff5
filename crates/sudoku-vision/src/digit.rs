//! Cell preparation for the digit classifier.
//!
//! A rectified grid is binarised with ink in white, the long grid lines
//! are erased, and the image is split into 9x9 cells. Each cell is reduced
//! to a fixed-size square tile holding its most digit-like blob, or to a
//! blank tile when the cell is empty. Every cell yields a tile, so the
//! classifier always sees well-formed input.

use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbImage};
use imageproc::hough::{LineDetectionOptions, PolarLine};
use serde::{Deserialize, Serialize};

use crate::contour;
use crate::grayscale;
use crate::rectify::{self, CellGrid};
use crate::threshold;
use crate::types::VisionError;

/// Rows and columns in a Sudoku grid.
pub const GRID_CELLS: u32 = 9;

/// Tunables for [`prepare_cells`] and [`extract_digit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellOptions {
    /// Side of the square output tile, in pixels.
    pub tile_size: u32,
    /// Pixels trimmed from every side of each cell.
    pub border: u32,
    /// Adaptive threshold window radius.
    pub block_radius: u32,
    /// Adaptive threshold offset below the local mean.
    pub threshold_offset: i16,
    /// Cells with at most this many ink pixels are blank.
    pub min_foreground: u64,
    /// Margin added around the chosen blob before cropping.
    pub padding: u32,
    /// Preferred blob width/height ratio.
    pub target_aspect: f64,
    /// Blobs whose bounding box covers less than this fraction of the cell
    /// are ignored.
    pub min_area_fraction: f64,
    /// Erase straight lines spanning at least `line_fraction` of the
    /// shorter image side before splitting.
    pub erase_grid_lines: bool,
    /// Minimum line length for erasure, as a fraction of the shorter side.
    pub line_fraction: f64,
    /// Half the thickness of the band erased along each line.
    pub line_half_width: f64,
}

impl Default for CellOptions {
    fn default() -> Self {
        Self {
            tile_size: 60,
            border: 2,
            block_radius: 4,
            threshold_offset: 11,
            min_foreground: 50,
            padding: 4,
            target_aspect: 0.6,
            min_area_fraction: 0.01,
            erase_grid_lines: true,
            line_fraction: 0.5,
            line_half_width: 3.0,
        }
    }
}

/// Turn a rectified grid photo into 81 digit tiles.
///
/// # Errors
///
/// Returns the [`rectify::split`] errors when the image is too small for a
/// 9x9 grid or the border is too wide, and
/// [`VisionError::InvalidArgument`] for a zero tile size.
pub fn prepare_cells(warped: &RgbImage, options: &CellOptions) -> Result<CellGrid<GrayImage>, VisionError> {
    if options.tile_size == 0 {
        return Err(VisionError::InvalidArgument("tile size must be positive".to_owned()));
    }
    let gray = grayscale::to_gray(warped);
    let mut binary = threshold::adaptive_mean_inverted(&gray, options.block_radius, options.threshold_offset);
    if options.erase_grid_lines {
        erase_grid_lines(&mut binary, options);
    }
    let cells = rectify::split(&binary, GRID_CELLS, GRID_CELLS, options.border)?;
    Ok(cells.map(|cell| extract_digit(&cell, options)))
}

/// Blank out long straight lines in a binary image.
///
/// Returns the number of lines erased.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn erase_grid_lines(binary: &mut GrayImage, options: &CellOptions) -> usize {
    let shorter = binary.width().min(binary.height());
    let vote_threshold = (f64::from(shorter) * options.line_fraction).round().max(1.0) as u32;
    let lines = imageproc::hough::detect_lines(
        binary,
        LineDetectionOptions {
            vote_threshold,
            suppression_radius: 2,
        },
    );
    for line in &lines {
        erase_band(binary, line, options.line_half_width);
    }
    log::debug!("erased {} grid lines", lines.len());
    lines.len()
}

/// Zero every pixel within `half_width` of the line `x cos(a) + y sin(a) = r`.
fn erase_band(binary: &mut GrayImage, line: &PolarLine, half_width: f64) {
    let angle = f64::from(line.angle_in_degrees).to_radians();
    let (sin, cos) = angle.sin_cos();
    let r = f64::from(line.r);
    for (x, y, pixel) in binary.enumerate_pixels_mut() {
        let distance = f64::from(x).mul_add(cos, f64::from(y) * sin) - r;
        if distance.abs() <= half_width {
            *pixel = Luma([0]);
        }
    }
}

/// Reduce one binary cell (ink white) to a letterboxed digit tile.
///
/// The cell's external blobs are scored by bounding-box area times how
/// close their aspect ratio is to `target_aspect`; the best one, padded by
/// `padding`, is scaled to fit the tile and centred. Empty cells and cells
/// without a usable blob give an all-black tile.
#[must_use = "returns the digit tile"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn extract_digit(cell: &GrayImage, options: &CellOptions) -> GrayImage {
    let size = options.tile_size;
    let mut tile = GrayImage::new(size, size);
    if cell.width() == 0 || cell.height() == 0 {
        return tile;
    }
    if threshold::count_foreground(cell) <= options.min_foreground {
        return tile;
    }

    let cell_area = f64::from(cell.width()) * f64::from(cell.height());
    let min_area = cell_area * options.min_area_fraction;
    let mut best: Option<(BoundingBox, f64)> = None;
    for blob in contour::external_contours(cell) {
        let Some(bbox) = BoundingBox::of(&blob) else {
            continue;
        };
        let area = bbox.area();
        if area < min_area {
            continue;
        }
        let score = area * aspect_closeness(bbox.aspect(), options.target_aspect);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((bbox, score));
        }
    }
    let Some((bbox, _)) = best else {
        return tile;
    };

    let x0 = bbox.min_x.saturating_sub(options.padding);
    let y0 = bbox.min_y.saturating_sub(options.padding);
    let x1 = (bbox.max_x + options.padding).min(cell.width() - 1);
    let y1 = (bbox.max_y + options.padding).min(cell.height() - 1);
    let crop = image::imageops::crop_imm(cell, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image();

    let scale = f64::from(size) / f64::from(crop.width().max(crop.height()));
    let fit_w = ((f64::from(crop.width()) * scale).round() as u32).clamp(1, size);
    let fit_h = ((f64::from(crop.height()) * scale).round() as u32).clamp(1, size);
    let resized = image::imageops::resize(&crop, fit_w, fit_h, FilterType::Triangle);
    image::imageops::overlay(
        &mut tile,
        &resized,
        i64::from((size - fit_w) / 2),
        i64::from((size - fit_h) / 2),
    );
    tile
}

/// Inclusive pixel bounds of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BoundingBox {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl BoundingBox {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn of(points: &[crate::types::Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min_x: first.x as u32,
            min_y: first.y as u32,
            max_x: first.x as u32,
            max_y: first.y as u32,
        };
        for p in &points[1..] {
            let (x, y) = (p.x as u32, p.y as u32);
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        Some(bbox)
    }

    fn width(self) -> f64 {
        f64::from(self.max_x - self.min_x + 1)
    }

    fn height(self) -> f64 {
        f64::from(self.max_y - self.min_y + 1)
    }

    fn area(self) -> f64 {
        self.width() * self.height()
    }

    fn aspect(self) -> f64 {
        self.width() / self.height()
    }
}

/// 1.0 for equal ratios, falling towards 0 as they diverge.
fn aspect_closeness(aspect: f64, target: f64) -> f64 {
    if aspect <= 0.0 || target <= 0.0 {
        return 0.0;
    }
    aspect.min(target) / aspect.max(target)
}
