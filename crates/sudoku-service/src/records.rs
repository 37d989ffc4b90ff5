//! Records exchanged with the messaging side.
//!
//! These are plain serde types; transport is somebody else's concern.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sudoku_solver::{Grid, SolveError};
use sudoku_vision::Quadrilateral;

/// Correlates a request with the chat message it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionKey {
    /// Sender of the photo.
    pub user_id: i64,
    /// Chat the photo was posted in.
    pub chat_id: i64,
    /// Message carrying the photo.
    pub message_id: i64,
}

impl SessionKey {
    /// The user id as used in artifact locations.
    #[must_use]
    pub fn user(&self) -> String {
        self.user_id.to_string()
    }
}

/// A photo waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Where the photo came from.
    pub session: SessionKey,
    /// Storage location of the photo.
    pub location: String,
}

/// What became of one detected grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The digits were completed.
    Solved {
        /// The completed grid.
        solution: Grid,
    },
    /// The digits repeat within a row, column, or box.
    Contradiction,
    /// The digits are consistent but have no completion.
    Unsolvable,
    /// The candidate never reached the solver.
    Skipped {
        /// Why rectification, tiling or reading failed.
        reason: String,
    },
}

impl Outcome {
    /// Outcome of a solver call.
    #[must_use]
    pub fn from_solve(result: Result<Grid, SolveError>) -> Self {
        match result {
            Ok(solution) => Self::Solved { solution },
            Err(SolveError::Contradiction) => Self::Contradiction,
            Err(SolveError::Unsolvable) => Self::Unsolvable,
        }
    }

    /// The solved grid, if any.
    #[must_use]
    pub const fn solution(&self) -> Option<&Grid> {
        match self {
            Self::Solved { solution } => Some(solution),
            _ => None,
        }
    }
}

/// One detector's grid carried through rectification, classification and
/// solving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Name of the detector that found the grid.
    pub detector: String,
    /// Where the rectified grid was stored, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rectified: Option<String>,
    /// Storage locations of the 81 digit tiles, row-major; empty when the
    /// tiles were not stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cells: Vec<String>,
    /// The classifier's reading, blank when skipped.
    pub digits: Grid,
    /// What the solver made of `digits`.
    pub outcome: Outcome,
}

/// Everything produced for one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// The request this report answers.
    pub session: SessionKey,
    /// The grids that were found, in detector order.
    pub detections: Vec<(String, Quadrilateral)>,
    /// One record per detection, in the same order.
    pub candidates: Vec<CandidateRecord>,
    /// Distinct solutions across all candidates.
    pub solutions: BTreeSet<Grid>,
}

impl SessionReport {
    /// Report with solutions collected from `candidates`.
    #[must_use]
    pub fn new(
        session: SessionKey,
        detections: Vec<(String, Quadrilateral)>,
        candidates: Vec<CandidateRecord>,
    ) -> Self {
        let solutions = candidates
            .iter()
            .filter_map(|c| c.outcome.solution().copied())
            .collect();
        Self {
            session,
            detections,
            candidates,
            solutions,
        }
    }
}
