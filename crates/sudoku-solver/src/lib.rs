//! sudoku-solver: the 9x9 grid type and a deterministic solver.
//!
//! Grids are plain values: they parse from and print to 81-cell text,
//! convert from nested integer rows, and compare by value so solutions
//! from several sources deduplicate in a set.

pub mod grid;
pub mod solver;

pub use grid::{Grid, GridError};
pub use solver::{SolveError, solve, solve_all};
