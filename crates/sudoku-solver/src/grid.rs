//! The 9x9 Sudoku grid value type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Side length of the grid.
pub const SIZE: usize = 9;

/// Side length of one box.
pub const BOX: usize = 3;

/// Cell value meaning "no digit".
pub const EMPTY: u8 = 0;

/// Errors building or editing a [`Grid`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Wrong number of rows.
    #[error("expected 9 rows, got {0}")]
    RowCount(usize),

    /// A row with the wrong number of cells.
    #[error("row {row} has {len} cells, expected 9")]
    RowLength {
        /// Zero-based row index.
        row: usize,
        /// Cells found in that row.
        len: usize,
    },

    /// A cell value outside `0..=9`.
    #[error("value {value} at ({row}, {col}) is outside 0..=9")]
    ValueOutOfRange {
        /// Zero-based row index.
        row: usize,
        /// Zero-based column index.
        col: usize,
        /// The rejected value.
        value: i64,
    },

    /// A position outside the grid.
    #[error("position ({row}, {col}) is outside the grid")]
    OutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },

    /// Grid text with the wrong number of cells.
    #[error("expected 81 cells, got {0}")]
    CellCount(usize),

    /// Grid text with a character that is neither a cell nor a separator.
    #[error("unexpected character {0:?} in grid text")]
    InvalidCharacter(char),
}

/// A 9x9 grid of digits with [`EMPTY`] for blank cells.
///
/// Grids compare, hash, and order by value so that solutions can be
/// collected into sets.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Grid([[u8; SIZE]; SIZE]);

impl Grid {
    /// A grid with every cell blank.
    #[must_use]
    pub const fn empty() -> Self {
        Self([[EMPTY; SIZE]; SIZE])
    }

    /// Grid from fixed-size rows.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ValueOutOfRange`] if a cell exceeds 9.
    pub fn from_rows(rows: [[u8; SIZE]; SIZE]) -> Result<Self, GridError> {
        for (row, cells) in rows.iter().enumerate() {
            for (col, &value) in cells.iter().enumerate() {
                if value > 9 {
                    return Err(GridError::ValueOutOfRange {
                        row,
                        col,
                        value: i64::from(value),
                    });
                }
            }
        }
        Ok(Self(rows))
    }

    /// The cells as rows.
    #[must_use]
    pub const fn rows(&self) -> &[[u8; SIZE]; SIZE] {
        &self.0
    }

    /// Cell value at `(row, col)`, if in range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.0.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Set the cell at `(row, col)`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] or [`GridError::ValueOutOfRange`].
    pub fn set(&mut self, row: usize, col: usize, value: u8) -> Result<(), GridError> {
        if value > 9 {
            return Err(GridError::ValueOutOfRange {
                row,
                col,
                value: i64::from(value),
            });
        }
        let cell = self
            .0
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(GridError::OutOfBounds { row, col })?;
        *cell = value;
        Ok(())
    }

    /// Number of non-blank cells.
    #[must_use]
    pub fn filled(&self) -> usize {
        self.0.iter().flatten().filter(|&&v| v != EMPTY).count()
    }

    /// Every cell holds a digit.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.0.iter().flatten().all(|v| (1..=9).contains(v))
    }

    /// No digit repeats within a row, column, or box.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        (0..SIZE).all(|row| {
            (0..SIZE).all(|col| {
                let value = self.0[row][col];
                value == EMPTY || self.allows(row, col, value)
            })
        })
    }

    /// Whether `value` could go at `(row, col)` without repeating a digit
    /// in its row, column, or box. The cell itself is not considered.
    #[must_use]
    pub fn allows(&self, row: usize, col: usize, value: u8) -> bool {
        let (box_row, box_col) = (row / BOX * BOX, col / BOX * BOX);
        for i in 0..SIZE {
            if i != col && self.0[row][i] == value {
                return false;
            }
            if i != row && self.0[i][col] == value {
                return false;
            }
            let (r, c) = (box_row + i / BOX, box_col + i % BOX);
            if (r, c) != (row, col) && self.0[r][c] == value {
                return false;
            }
        }
        true
    }

    /// First blank cell in row-major order.
    #[must_use]
    pub fn first_empty(&self) -> Option<(usize, usize)> {
        (0..SIZE * SIZE)
            .map(|i| (i / SIZE, i % SIZE))
            .find(|&(r, c)| self.0[r][c] == EMPTY)
    }
}

impl TryFrom<&[Vec<i32>]> for Grid {
    type Error = GridError;

    fn try_from(rows: &[Vec<i32>]) -> Result<Self, Self::Error> {
        if rows.len() != SIZE {
            return Err(GridError::RowCount(rows.len()));
        }
        let mut grid = Self::empty();
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != SIZE {
                return Err(GridError::RowLength {
                    row,
                    len: cells.len(),
                });
            }
            for (col, &value) in cells.iter().enumerate() {
                let digit = u8::try_from(value)
                    .ok()
                    .filter(|d| *d <= 9)
                    .ok_or(GridError::ValueOutOfRange {
                        row,
                        col,
                        value: i64::from(value),
                    })?;
                grid.0[row][col] = digit;
            }
        }
        Ok(grid)
    }
}

impl FromStr for Grid {
    type Err = GridError;

    /// Parse 81 cells written as digits, with `0` or `.` for blanks.
    /// Whitespace and `|`, `-`, `+`, `,` separators are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cells = Vec::with_capacity(SIZE * SIZE);
        for ch in s.chars() {
            match ch {
                '.' => cells.push(EMPTY),
                '0'..='9' => cells.push(ch as u8 - b'0'),
                '|' | '-' | '+' | ',' => {}
                c if c.is_whitespace() => {}
                c => return Err(GridError::InvalidCharacter(c)),
            }
        }
        if cells.len() != SIZE * SIZE {
            return Err(GridError::CellCount(cells.len()));
        }
        let mut grid = Self::empty();
        for (i, value) in cells.into_iter().enumerate() {
            grid.0[i / SIZE][i % SIZE] = value;
        }
        Ok(grid)
    }
}

impl fmt::Display for Grid {
    /// Nine lines of nine characters, `.` for blanks.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for &value in row {
                if value == EMPTY {
                    f.write_str(".")?;
                } else {
                    write!(f, "{value}")?;
                }
            }
        }
        Ok(())
    }
}
