//! Photo in, solutions out.

use image::{GrayImage, RgbImage};
use sudoku_io::{Storage, artifact_location, tile_location};
use sudoku_solver::Grid;
use sudoku_vision::digit::{self, CellOptions};
use sudoku_vision::{CellGrid, GeometryDetectionEngine, Quadrilateral, rectify};

use crate::ServiceError;
use crate::classifier::{self, DigitClassifier};
use crate::records::{CandidateRecord, ImageRequest, Outcome, SessionKey, SessionReport};

/// Storage prefix for rectified grids.
pub const RECTIFIED_PREFIX: &str = "warped";

/// Storage prefix for digit tiles.
pub const DIGIT_PREFIX: &str = "digits";

/// Runs detection, rectification, classification and solving for photos.
#[derive(Debug)]
pub struct SudokuService<C> {
    engine: GeometryDetectionEngine,
    classifier: C,
    options: CellOptions,
}

/// Locations of one candidate's stored artifacts.
struct Stored {
    rectified: Option<String>,
    cells: Vec<String>,
}

impl<C: DigitClassifier> SudokuService<C> {
    /// Service reading tiles with `classifier`.
    pub const fn new(engine: GeometryDetectionEngine, classifier: C, options: CellOptions) -> Self {
        Self {
            engine,
            classifier,
            options,
        }
    }

    /// The detection engine, for reconfiguration between runs.
    pub const fn engine_mut(&mut self) -> &mut GeometryDetectionEngine {
        &mut self.engine
    }

    /// Process an in-memory photo without storing any artifacts.
    ///
    /// # Pipeline
    ///
    /// 1. Run every enabled detector
    /// 2. Rectify and cut each detected grid into tiles
    /// 3. Classify the tiles into a digit grid
    /// 4. Solve each digit grid and collect the distinct solutions
    ///
    /// A grid that cannot be rectified or split is recorded as skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Vision`] when the engine rejects the photo.
    pub fn process_photo(
        &self,
        session: SessionKey,
        photo: &RgbImage,
    ) -> Result<SessionReport, ServiceError> {
        self.process(session, photo, |_, _, _| Stored {
            rectified: None,
            cells: Vec::new(),
        })
    }

    /// Load the requested photo from `storage`, process it, and store the
    /// rectified grids and digit tiles next to it.
    ///
    /// Artifact save failures are logged and leave the location out of the
    /// record; they do not abort processing.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Storage`] when the photo cannot be loaded
    /// and [`ServiceError::Vision`] when the engine rejects it.
    pub fn process_request<S>(
        &self,
        request: &ImageRequest,
        storage: &S,
    ) -> Result<SessionReport, ServiceError>
    where
        S: Storage<RgbImage> + Storage<GrayImage>,
    {
        let photo = Storage::<RgbImage>::load(storage, &request.location)?;
        let user = request.session.user();
        self.process(request.session.clone(), &photo, |detector, warped, cells| {
            let location = artifact_location(RECTIFIED_PREFIX, &user, &request.location);
            let rectified = match Storage::<RgbImage>::save(storage, &location, warped) {
                Ok(_) => Some(location),
                Err(e) => {
                    log::warn!("{detector}: could not store rectified grid: {e}");
                    None
                }
            };
            let artifact = rectified.as_deref().unwrap_or(&request.location);
            let cells = cells
                .iter()
                .filter_map(|(row, col, tile)| {
                    let location = tile_location(DIGIT_PREFIX, artifact, row, col);
                    match Storage::<GrayImage>::save(storage, &location, tile) {
                        Ok(_) => Some(location),
                        Err(e) => {
                            log::warn!("{detector}: could not store tile ({row}, {col}): {e}");
                            None
                        }
                    }
                })
                .collect();
            Stored { rectified, cells }
        })
    }

    fn process(
        &self,
        session: SessionKey,
        photo: &RgbImage,
        mut store: impl FnMut(&str, &RgbImage, &CellGrid<GrayImage>) -> Stored,
    ) -> Result<SessionReport, ServiceError> {
        let detections = self.engine.detect(photo)?;
        if detections.is_empty() {
            log::warn!("no grid found for user {}", session.user_id);
        }

        let mut candidates = Vec::with_capacity(detections.len());
        for (detector, quad) in &detections {
            candidates.push(self.candidate(detector, quad, photo, &mut store));
        }

        let report = SessionReport::new(session, detections, candidates);
        log::info!(
            "{} candidates gave {} distinct solutions",
            report.candidates.len(),
            report.solutions.len()
        );
        Ok(report)
    }

    fn candidate(
        &self,
        detector: &str,
        quad: &Quadrilateral,
        photo: &RgbImage,
        store: &mut impl FnMut(&str, &RgbImage, &CellGrid<GrayImage>) -> Stored,
    ) -> CandidateRecord {
        let skipped = |reason: String| {
            log::warn!("{detector}: skipped: {reason}");
            CandidateRecord {
                detector: detector.to_owned(),
                rectified: None,
                cells: Vec::new(),
                digits: Grid::empty(),
                outcome: Outcome::Skipped { reason },
            }
        };

        let warped = match rectify::warp(photo, quad) {
            Ok(warped) => warped,
            Err(e) => return skipped(e.to_string()),
        };
        let cells = match digit::prepare_cells(&warped, &self.options) {
            Ok(cells) => cells,
            Err(e) => return skipped(e.to_string()),
        };
        let digits = match classifier::read_grid(&self.classifier, &cells) {
            Ok(digits) => digits,
            Err(e) => return skipped(e.to_string()),
        };
        let stored = store(detector, &warped, &cells);
        let outcome = Outcome::from_solve(sudoku_solver::solve(&digits));
        log::debug!("{detector}: {} digits read, {outcome:?}", digits.filled());

        CandidateRecord {
            detector: detector.to_owned(),
            rectified: stored.rectified,
            cells: stored.cells,
            digits,
            outcome,
        }
    }
}
