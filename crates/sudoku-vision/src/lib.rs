//! sudoku-vision: Sudoku grid detection and cell extraction (sans-IO).
//!
//! Finds a Sudoku grid in a photo, rectifies it, and cuts it into
//! classifier-ready digit tiles:
//! detection (several strategies, raced) -> perspective warp ->
//! adaptive threshold -> grid-line erasure -> 9x9 split -> digit tiles.
//!
//! This crate has **no I/O dependencies**. Images come in as decoded
//! buffers or raw bytes and leave as in-memory images; persisting
//! artifacts lives in `sudoku-io`.
//!
//! # Detectors
//!
//! * [`RectangleDetector`]: contrast, threshold, Canny, dilation, largest
//!   external contour, polygon approximation.
//! * [`CornerDetector`]: corner features searched for axis-aligned right
//!   triangles ([`find_right_triangles`]).
//!
//! [`GeometryDetectionEngine`] runs any number of named detectors with
//! per-detector timeouts and reports every outcome.

pub mod contour;
pub mod corner;
pub mod digit;
pub mod edge;
pub mod engine;
pub mod features;
pub mod grayscale;
pub mod pool;
pub mod rectangle;
pub mod rectify;
pub mod search;
pub mod simplify;
pub mod threshold;
pub mod triangle;
pub mod types;

pub use corner::{CornerDetector, CornerParams, CornerPreset};
pub use digit::{CellOptions, GRID_CELLS};
pub use engine::{
    Detector, DetectorConfig, DetectorResult, EngineOptions, GeometryDetectionEngine, Statistics,
};
pub use rectangle::{RectangleDetector, RectangleParams, RectanglePreset};
pub use rectify::CellGrid;
pub use search::{AreaBounds, SearchStrategy, find_right_triangles};
pub use triangle::RightTriangle;
pub use types::{GrayImage, Point, Quadrilateral, RgbImage, VisionError};

/// Rectify the grid inside `quad` and cut it into 81 digit tiles.
///
/// # Pipeline
///
/// 1. Perspective warp to the quadrilateral's upright extent
/// 2. Adaptive mean threshold (ink becomes white)
/// 3. Optional erasure of long grid lines
/// 4. 9x9 split with a trimmed border
/// 5. Per-cell digit extraction into fixed-size tiles
///
/// # Errors
///
/// Returns [`VisionError::DegenerateTarget`] when the quadrilateral
/// collapses, and [`VisionError::ImageTooSmall`] when the rectified grid is
/// too small to split.
pub fn extract_cells(
    image: &RgbImage,
    quad: &Quadrilateral,
    options: &CellOptions,
) -> Result<CellGrid<GrayImage>, VisionError> {
    let warped = rectify::warp(image, quad)?;
    digit::prepare_cells(&warped, options)
}
