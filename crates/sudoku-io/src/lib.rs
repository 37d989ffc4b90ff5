//! sudoku-io: filesystem side of sudoku-lens.
//!
//! Stores rectified grids and digit tiles as image files and names them
//! so that runs never collide. The vision and solver crates stay free of
//! any filesystem access.

pub mod naming;
pub mod storage;

pub use naming::{artifact_location, file_stem, tile_location};
pub use storage::{FileStorage, Storage, StorageError};
