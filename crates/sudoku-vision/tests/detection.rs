//! End-to-end checks over synthetic photos and point sets.

#![allow(clippy::unwrap_used)]

use image::Rgb;
use sudoku_vision::{
    CellOptions, CornerDetector, CornerParams, EngineOptions, GeometryDetectionEngine, Point,
    RgbImage, threshold,
};

/// White page with a dark 4 px frame from 30 to 270, thin inner lines,
/// and a single vertical stroke in the middle cell.
fn sudoku_photo() -> RgbImage {
    RgbImage::from_fn(300, 300, |x, y| {
        let inside = (30..270).contains(&x) && (30..270).contains(&y);
        let frame = inside && (x < 34 || x >= 266 || y < 34 || y >= 266);
        let inner = inside && ((x - 30) % 80 < 2 || (y - 30) % 80 < 2);
        let stroke = (148..152).contains(&x) && (140..160).contains(&y);
        if frame || inner || stroke {
            Rgb([15, 15, 15])
        } else {
            Rgb([245, 245, 245])
        }
    })
}

#[test]
fn right_triangle_found_among_scattered_points() {
    let mut points = vec![
        Point::new(100.0, 100.0),
        Point::new(160.0, 100.0),
        Point::new(100.0, 160.0),
    ];
    points.extend((0..22).map(|k| Point::new(f64::from(400 + 23 * k), f64::from(420 + 31 * k))));

    let detector = CornerDetector::from_params(CornerParams {
        min_area: 1000.0,
        max_area: 5000.0,
        ..CornerParams::default()
    });
    let quad = detector.quadrilateral_from_points(&points).unwrap().unwrap();
    assert_eq!(quad.top_left, Point::new(100.0, 100.0));
    assert_eq!(quad.top_right, Point::new(160.0, 100.0));
    assert_eq!(quad.bottom_left, Point::new(100.0, 160.0));
    assert_eq!(quad.bottom_right, Point::new(160.0, 160.0));
}

#[test]
fn default_engine_reports_every_detector_in_order() {
    let engine = GeometryDetectionEngine::with_default_detectors(&EngineOptions::sequential()).unwrap();
    let results = engine.run(&sudoku_photo()).unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "Rectangle_Standard",
            "Rectangle_HighThreshold",
            "Rectangle_SquareSnap",
            "Corner_Standard",
            "Corner_Large",
            "Corner_Refined",
        ]
    );
    assert!(results[0].has_valid_points(), "{:?}", results[0]);
}

#[test]
fn parallel_and_sequential_agree() {
    let photo = sudoku_photo();
    let sequential = GeometryDetectionEngine::with_default_detectors(&EngineOptions::sequential())
        .unwrap()
        .detect(&photo)
        .unwrap();
    let parallel = GeometryDetectionEngine::with_default_detectors(&EngineOptions {
        parallel: true,
        workers: Some(3),
    })
    .unwrap()
    .detect(&photo)
    .unwrap();
    assert_eq!(sequential, parallel);
}

#[test]
fn detected_grid_yields_digit_tile() {
    let photo = sudoku_photo();
    let engine = GeometryDetectionEngine::with_default_detectors(&EngineOptions::sequential()).unwrap();
    let detections = engine.detect(&photo).unwrap();
    let (_, quad) = detections
        .iter()
        .find(|(name, _)| name == "Rectangle_Standard")
        .unwrap();

    let cells = sudoku_vision::extract_cells(&photo, quad, &CellOptions::default()).unwrap();
    assert_eq!(cells.iter().count(), 81);
    assert!(cells.iter().all(|(_, _, tile)| tile.dimensions() == (60, 60)));
    assert!(threshold::count_foreground(cells.get(4, 4).unwrap()) > 0);
}
