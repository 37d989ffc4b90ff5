//! sudoku-bench: CLI for detector experimentation and grid solving.
//!
//! `detect` runs the detection engine on a photo and prints per-detector
//! statistics, optionally storing every rectified grid and its digit tiles.
//! `solve` reads an 81-cell grid from a text file and prints its solution.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin sudoku-bench -- detect [OPTIONS] <IMAGE_PATH>
//! cargo run --release --bin sudoku-bench -- solve <GRID_PATH>
//! ```
//!
//! Set `RUST_LOG=debug` for per-stage logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sudoku_io::{FileStorage, Storage};
use sudoku_vision::{
    CellOptions, EngineOptions, GeometryDetectionEngine, GrayImage, RgbImage, digit, grayscale,
    rectify,
};

/// Grid detection experiments and Sudoku solving.
#[derive(Parser)]
#[command(name = "sudoku-bench", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every detector on a photo and report how each one did.
    Detect(DetectArgs),
    /// Solve a grid written as 81 cells (`0` or `.` for blanks).
    Solve {
        /// Path to the grid text file.
        grid_path: PathBuf,

        /// Print the solution as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct DetectArgs {
    /// Path to the photo (PNG, JPEG, BMP, TIFF).
    image_path: PathBuf,

    /// Run detectors one after another on the calling thread.
    #[arg(long)]
    sequential: bool,

    /// Worker threads for parallel runs (default: available parallelism).
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    workers: Option<usize>,

    /// Per-detector timeout in milliseconds.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u64>::new().range(1..))]
    timeout_ms: Option<u64>,

    /// Disable a detector by name (repeatable).
    #[arg(long = "disable", value_name = "NAME")]
    disabled: Vec<String>,

    /// Store rectified grids and digit tiles under this directory.
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// User id used in stored artifact locations.
    #[arg(long, default_value = "bench")]
    user: String,

    /// Output statistics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Engine and cell options as a JSON string.
    ///
    /// When provided, `--sequential` and `--workers` are ignored. The JSON
    /// must be a valid `BenchOptions` serialization; missing fields take
    /// their defaults.
    #[arg(long)]
    options_json: Option<String>,
}

/// Everything tunable from `--options-json`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct BenchOptions {
    engine: EngineOptions,
    cells: CellOptions,
}

/// Build [`BenchOptions`] from CLI arguments.
fn options_from_cli(args: &DetectArgs) -> Result<BenchOptions, String> {
    if let Some(ref json) = args.options_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --options-json: {e}"));
    }
    Ok(BenchOptions {
        engine: EngineOptions {
            parallel: !args.sequential,
            workers: args.workers,
        },
        cells: CellOptions::default(),
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Detect(args) => detect(&args),
        Command::Solve { grid_path, json } => solve(&grid_path, json),
    }
}

fn detect(args: &DetectArgs) -> ExitCode {
    let options = match options_from_cli(args) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&args.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let image = match grayscale::decode_rgb(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", args.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        args.image_path.display(),
        image_bytes.len(),
        image.width(),
        image.height(),
    );
    eprintln!("Options: {options:#?}");
    eprintln!();

    let mut engine = match GeometryDetectionEngine::with_default_detectors(&options.engine) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Engine error: {e}");
            return ExitCode::FAILURE;
        }
    };
    for name in &args.disabled {
        if !engine.set_enabled(name, false) {
            eprintln!("Unknown detector {name:?}; known: {:?}", engine.detector_names());
            return ExitCode::FAILURE;
        }
    }
    if let Some(ms) = args.timeout_ms {
        let names: Vec<String> = engine.detector_names().into_iter().map(str::to_owned).collect();
        for name in names {
            if let Err(e) = engine.set_timeout(&name, Duration::from_millis(ms)) {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let stats = match engine.statistics(&image) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Detection error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing statistics: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", stats.report());
    }

    if let Some(ref dir) = args.dump_dir {
        let storage = FileStorage::new(dir);
        let source = args.image_path.to_string_lossy();
        for result in &stats.results {
            let Some(quad) = result.quadrilateral() else {
                continue;
            };
            dump(&storage, &args.user, &source, &result.name, &image, &quad, &options.cells);
        }
    }

    ExitCode::SUCCESS
}

/// Store one detector's rectified grid and digit tiles. Failures are
/// reported and skipped.
fn dump(
    storage: &FileStorage,
    user: &str,
    source: &str,
    detector: &str,
    image: &RgbImage,
    quad: &sudoku_vision::Quadrilateral,
    cells: &CellOptions,
) {
    let warped = match rectify::warp(image, quad) {
        Ok(warped) => warped,
        Err(e) => {
            eprintln!("{detector}: not rectified: {e}");
            return;
        }
    };
    let stem = format!("{}_{detector}", sudoku_io::file_stem(source));
    let artifact = sudoku_io::artifact_location("warped", user, &stem);
    match Storage::<RgbImage>::save(storage, &artifact, &warped) {
        Ok(path) => eprintln!("{detector}: rectified grid written to {}", path.display()),
        Err(e) => {
            eprintln!("{detector}: {e}");
            return;
        }
    }

    let tiles = match digit::prepare_cells(&warped, cells) {
        Ok(tiles) => tiles,
        Err(e) => {
            eprintln!("{detector}: no tiles: {e}");
            return;
        }
    };
    let mut written = 0_usize;
    for (row, col, tile) in tiles.iter() {
        let location = sudoku_io::tile_location("digits", &artifact, row, col);
        match Storage::<GrayImage>::save(storage, &location, tile) {
            Ok(_) => written += 1,
            Err(e) => eprintln!("{detector}: tile ({row}, {col}): {e}"),
        }
    }
    eprintln!("{detector}: {written} tiles written");
}

fn solve(path: &Path, json: bool) -> ExitCode {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let grid: sudoku_solver::Grid = match text.parse() {
        Ok(grid) => grid,
        Err(e) => {
            eprintln!("Error parsing {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    match sudoku_solver::solve(&grid) {
        Ok(solution) if json => match serde_json::to_string(&solution) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing solution: {e}");
                return ExitCode::FAILURE;
            }
        },
        Ok(solution) => println!("{solution}"),
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
