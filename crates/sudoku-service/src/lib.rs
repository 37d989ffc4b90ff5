//! sudoku-service: from a photo to its distinct solutions.
//!
//! Ties the vision, solver and storage crates together behind a
//! [`SudokuService`]. Digit recognition is a collaborator supplied through
//! [`DigitClassifier`]; the records in [`records`] are what a messaging
//! layer would carry in and out.

pub mod classifier;
pub mod records;
pub mod service;

pub use classifier::{ClassifyError, DigitClassifier};
pub use records::{CandidateRecord, ImageRequest, Outcome, SessionKey, SessionReport};
pub use service::SudokuService;

/// Errors that stop a whole request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The photo could not be loaded.
    #[error(transparent)]
    Storage(#[from] sudoku_io::StorageError),

    /// The detection engine rejected the photo.
    #[error(transparent)]
    Vision(#[from] sudoku_vision::VisionError),

    /// A cell grid that is not 9x9.
    #[error("expected a 9x9 cell grid, got {rows}x{cols}")]
    GridShape { rows: usize, cols: usize },

    /// A digit grid could not be built.
    #[error(transparent)]
    Grid(#[from] sudoku_solver::GridError),
}
