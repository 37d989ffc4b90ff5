//! The digit classifier boundary.
//!
//! The classifier itself lives outside this workspace. Whatever it
//! returns, a cell reading is always a digit in `0..=9`: failures and
//! out-of-range answers become [`EMPTY`](sudoku_solver::grid::EMPTY).

use image::GrayImage;
use sudoku_solver::Grid;
use sudoku_solver::grid::{EMPTY, SIZE};
use sudoku_vision::CellGrid;

use crate::ServiceError;

/// A classifier failure for one tile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("classification failed: {0}")]
pub struct ClassifyError(pub String);

/// Reads the digit in one cell tile.
///
/// `0` means no confident digit.
pub trait DigitClassifier: Send + Sync {
    /// Classify a tile.
    ///
    /// # Errors
    ///
    /// Implementation specific. Callers treat any error as a blank cell.
    fn classify(&self, tile: &GrayImage) -> Result<u8, ClassifyError>;
}

impl<F> DigitClassifier for F
where
    F: Fn(&GrayImage) -> Result<u8, ClassifyError> + Send + Sync,
{
    fn classify(&self, tile: &GrayImage) -> Result<u8, ClassifyError> {
        self(tile)
    }
}

/// Classify one tile, degrading errors and values above 9 to blank.
pub fn classify_or_blank(classifier: &dyn DigitClassifier, tile: &GrayImage) -> u8 {
    match classifier.classify(tile) {
        Ok(digit) if digit <= 9 => digit,
        Ok(digit) => {
            log::warn!("classifier returned {digit}, using blank");
            EMPTY
        }
        Err(e) => {
            log::warn!("{e}, using blank");
            EMPTY
        }
    }
}

/// Classify every tile of a 9x9 cell grid.
///
/// # Errors
///
/// Returns [`ServiceError::GridShape`] when `cells` is not 9x9.
pub fn read_grid(
    classifier: &dyn DigitClassifier,
    cells: &CellGrid<GrayImage>,
) -> Result<Grid, ServiceError> {
    if cells.rows() != SIZE || cells.cols() != SIZE {
        return Err(ServiceError::GridShape {
            rows: cells.rows(),
            cols: cells.cols(),
        });
    }
    let mut grid = Grid::empty();
    for (row, col, tile) in cells.iter() {
        grid.set(row, col, classify_or_blank(classifier, tile))?;
    }
    log::debug!("classifier read {} digits", grid.filled());
    Ok(grid)
}
