//! Deterministic backtracking search.
//!
//! The first blank cell in row-major order is tried with 1 through 9 in
//! turn; a digit is kept only if its row, column, and box allow it, and the
//! cell is blanked again before the next digit is tried. The search is a
//! pure function of the input grid.

use std::collections::BTreeSet;

use crate::grid::{EMPTY, Grid};

/// Why a grid has no solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    /// The given digits already repeat within a row, column, or box.
    #[error("the given digits contradict each other")]
    Contradiction,

    /// The givens are consistent but admit no completion.
    #[error("no completion exists")]
    Unsolvable,
}

/// Complete `grid`.
///
/// # Errors
///
/// Returns [`SolveError::Contradiction`] when the givens already break a
/// rule and [`SolveError::Unsolvable`] when the search is exhausted.
pub fn solve(grid: &Grid) -> Result<Grid, SolveError> {
    if !grid.is_consistent() {
        return Err(SolveError::Contradiction);
    }
    let mut work = *grid;
    if backtrack(&mut work) {
        Ok(work)
    } else {
        Err(SolveError::Unsolvable)
    }
}

/// Solve each grid independently and keep the distinct solutions.
#[must_use = "returns the solutions"]
pub fn solve_all(grids: impl IntoIterator<Item = Grid>) -> BTreeSet<Grid> {
    let mut attempted = 0_usize;
    let solutions: BTreeSet<Grid> = grids
        .into_iter()
        .inspect(|_| attempted += 1)
        .filter_map(|grid| solve(&grid).ok())
        .collect();
    log::debug!("{attempted} grids gave {} distinct solutions", solutions.len());
    solutions
}

fn backtrack(grid: &mut Grid) -> bool {
    let Some((row, col)) = grid.first_empty() else {
        return true;
    };
    for digit in 1..=9 {
        if !grid.allows(row, col, digit) {
            continue;
        }
        if grid.set(row, col, digit).is_err() {
            return false;
        }
        if backtrack(grid) {
            return true;
        }
        if grid.set(row, col, EMPTY).is_err() {
            return false;
        }
    }
    false
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PUZZLE: &str =
        "530070000600195000098000060800060003400803001700020006060000280000419005000080079";
    const SOLUTION: &str =
        "534678912672195348198342567859761423426853791713924856961537284287419635345286179";

    #[test]
    fn solves_unique_puzzle() {
        let puzzle: Grid = PUZZLE.parse().unwrap();
        let solved = solve(&puzzle).unwrap();
        assert_eq!(solved, SOLUTION.parse().unwrap());
        assert!(solved.is_solved());
        assert!(solved.is_consistent());
    }

    #[test]
    fn givens_are_kept() {
        let puzzle: Grid = PUZZLE.parse().unwrap();
        let solved = solve(&puzzle).unwrap();
        for row in 0..9 {
            for col in 0..9 {
                let given = puzzle.get(row, col).unwrap();
                if given != EMPTY {
                    assert_eq!(solved.get(row, col), Some(given));
                }
            }
        }
    }

    #[test]
    fn repeated_digit_in_row_is_a_contradiction() {
        let mut grid = Grid::empty();
        grid.set(0, 0, 5).unwrap();
        grid.set(0, 1, 5).unwrap();
        assert_eq!(solve(&grid), Err(SolveError::Contradiction));
    }

    #[test]
    fn consistent_dead_end_is_unsolvable() {
        // (0, 8) needs a 9, but column 8 already has one.
        let mut grid = Grid::empty();
        for col in 0..8 {
            grid.set(0, col, u8::try_from(col + 1).unwrap()).unwrap();
        }
        grid.set(4, 8, 9).unwrap();
        assert!(grid.is_consistent());
        assert_eq!(solve(&grid), Err(SolveError::Unsolvable));
    }

    #[test]
    fn empty_grid_gets_a_valid_completion() {
        let solved = solve(&Grid::empty()).unwrap();
        assert!(solved.is_solved());
        assert!(solved.is_consistent());
    }

    #[test]
    fn solved_grid_is_returned_unchanged() {
        let solved: Grid = SOLUTION.parse().unwrap();
        assert_eq!(solve(&solved).unwrap(), solved);
    }

    #[test]
    fn solve_all_deduplicates() {
        let puzzle: Grid = PUZZLE.parse().unwrap();
        let mut broken = Grid::empty();
        broken.set(0, 0, 1).unwrap();
        broken.set(1, 1, 1).unwrap();
        let solutions = solve_all([puzzle, broken, puzzle, SOLUTION.parse().unwrap()]);
        assert_eq!(solutions.len(), 1);
        assert!(solutions.contains(&SOLUTION.parse().unwrap()));
    }

    #[test]
    fn solve_all_of_nothing_is_empty() {
        assert!(solve_all(std::iter::empty()).is_empty());
    }
}
