//! Concurrent execution of independently configured grid detectors.
//!
//! The engine owns an ordered list of [`DetectorConfig`]s. A run hands
//! every enabled detector its own copy of the photo, bounds each one by
//! its own timeout, and reports one [`DetectorResult`] per detector in
//! configuration order, whatever order they finish in. A failing,
//! panicking, or slow detector only affects its own slot.
//!
//! # Timeouts
//!
//! In parallel mode every slot is collected against an absolute deadline
//! of `run start + timeout`, so a run returns no later than its largest
//! timeout. A detector that misses its deadline is not interrupted: it
//! keeps its worker busy until it returns, and its late result is
//! discarded.
//!
//! # Configuration snapshots
//!
//! The configuration list lives behind an [`Arc`]. Runs clone the `Arc`
//! and iterate that snapshot; management calls go through
//! [`Arc::make_mut`] and replace whole entries, so a snapshot held by a
//! run never changes underneath it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::corner::{CornerDetector, CornerPreset};
use crate::pool::WorkerPool;
use crate::rectangle::{RectangleDetector, RectanglePreset};
use crate::types::{Point, Quadrilateral, VisionError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A grid-corner finding algorithm.
///
/// Implementations return the four canonical corners on success, or an
/// empty list when they found nothing. Errors are reserved for inputs the
/// detector cannot work with.
pub trait Detector: Send + Sync {
    /// Find the grid corners in `image`.
    ///
    /// # Errors
    ///
    /// Implementation specific; the engine records the message.
    fn find_corners(&self, image: &RgbImage) -> Result<Vec<Point>, VisionError>;
}

impl<F> Detector for F
where
    F: Fn(&RgbImage) -> Result<Vec<Point>, VisionError> + Send + Sync,
{
    fn find_corners(&self, image: &RgbImage) -> Result<Vec<Point>, VisionError> {
        self(image)
    }
}

impl Detector for RectangleDetector {
    fn find_corners(&self, image: &RgbImage) -> Result<Vec<Point>, VisionError> {
        Ok(self
            .detect(image)?
            .map_or_else(Vec::new, |quad| quad.corners().to_vec()))
    }
}

impl Detector for CornerDetector {
    fn find_corners(&self, image: &RgbImage) -> Result<Vec<Point>, VisionError> {
        Ok(self
            .detect(image)?
            .map_or_else(Vec::new, |quad| quad.corners().to_vec()))
    }
}

/// One named detector with its run settings. Immutable; the `with_*`
/// methods return modified copies.
#[derive(Clone)]
pub struct DetectorConfig {
    name: String,
    detector: Arc<dyn Detector>,
    enabled: bool,
    timeout: Duration,
}

impl DetectorConfig {
    /// Timeout applied when none is given.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Enabled config with the default timeout.
    pub fn new(name: impl Into<String>, detector: impl Detector + 'static) -> Self {
        Self {
            name: name.into(),
            detector: Arc::new(detector),
            enabled: true,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Config wrapping a closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RgbImage) -> Result<Vec<Point>, VisionError> + Send + Sync + 'static,
    {
        Self::new(name, f)
    }

    /// Copy with the enabled flag replaced.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Copy with the timeout replaced.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Detector name, unique within an engine.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether runs include this detector.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Per-run time budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorConfig")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Outcome of one detector in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    /// Name of the detector that produced this result.
    pub name: String,
    /// Corners found; empty on failure or when nothing was found.
    pub points: Vec<Point>,
    /// Failure message, `None` on success.
    pub error: Option<String>,
    /// Wall-clock time spent (seconds when serialized).
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl DetectorResult {
    /// Successful result.
    #[must_use]
    pub fn success(name: impl Into<String>, points: Vec<Point>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            points,
            error: None,
            elapsed,
        }
    }

    /// Failed result carrying `message`.
    #[must_use]
    pub fn failure(name: impl Into<String>, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
            error: Some(message.into()),
            elapsed,
        }
    }

    /// `true` if the detector returned without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// `true` for a success with exactly four points.
    #[must_use]
    pub fn has_valid_points(&self) -> bool {
        self.is_success() && self.points.len() == 4
    }

    /// The points as a quadrilateral, if they form a valid one.
    #[must_use]
    pub fn quadrilateral(&self) -> Option<Quadrilateral> {
        if self.is_success() {
            Quadrilateral::from_corners(&self.points)
        } else {
            None
        }
    }
}

/// Aggregate view of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of detectors that ran.
    pub total: usize,
    /// Number that returned without error.
    pub successful: usize,
    /// Number that returned exactly four points.
    pub with_valid_points: usize,
    /// Mean elapsed time over all results (seconds when serialized).
    #[serde(with = "duration_serde")]
    pub average_elapsed: Duration,
    /// Quickest successful detector; the first one wins ties.
    pub fastest: Option<String>,
    /// Detector with the most points among those that returned exactly four;
    /// the first one wins ties.
    pub most_points: Option<String>,
    /// The raw per-detector results, in configuration order.
    pub results: Vec<DetectorResult>,
}

impl Statistics {
    /// Aggregate `results`.
    #[must_use]
    pub fn from_results(results: Vec<DetectorResult>) -> Self {
        let total = results.len();
        let successful: Vec<&DetectorResult> = results.iter().filter(|r| r.is_success()).collect();
        let with_valid_points = results.iter().filter(|r| r.has_valid_points()).count();

        let total_elapsed: Duration = results.iter().map(|r| r.elapsed).sum();
        let average_elapsed = u32::try_from(total)
            .ok()
            .filter(|&n| n > 0)
            .map_or(Duration::ZERO, |n| total_elapsed / n);

        let mut fastest: Option<&DetectorResult> = None;
        let mut most_points: Option<&DetectorResult> = None;
        for &result in &successful {
            if fastest.is_none_or(|f| result.elapsed < f.elapsed) {
                fastest = Some(result);
            }
            if result.has_valid_points()
                && most_points.is_none_or(|m| result.points.len() > m.points.len())
            {
                most_points = Some(result);
            }
        }

        Self {
            total,
            successful: successful.len(),
            with_valid_points,
            average_elapsed,
            fastest: fastest.map(|r| r.name.clone()),
            most_points: most_points.map(|r| r.name.clone()),
            results,
        }
    }

    /// Human-readable multi-line summary.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "{:<28} {:>10}  Outcome", "Detector", "Time (ms)");
        let _ = writeln!(out, "{}", "-".repeat(60));
        for r in &self.results {
            let outcome = match &r.error {
                Some(message) => format!("failed: {message}"),
                None if r.has_valid_points() => "4 corners".to_owned(),
                None => format!("{} points", r.points.len()),
            };
            let _ = writeln!(
                out,
                "{:<28} {:>10.3}  {outcome}",
                r.name,
                r.elapsed.as_secs_f64() * 1000.0,
            );
        }
        let _ = writeln!(out, "{}", "-".repeat(60));
        let _ = writeln!(
            out,
            "total {}  successful {}  valid {}  mean {:.3}ms",
            self.total,
            self.successful,
            self.with_valid_points,
            self.average_elapsed.as_secs_f64() * 1000.0,
        );
        let _ = writeln!(out, "fastest: {}", self.fastest.as_deref().unwrap_or("-"));
        let _ = write!(out, "most points: {}", self.most_points.as_deref().unwrap_or("-"));
        out
    }
}

/// Construction-time engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Run detectors on a worker pool instead of the calling thread.
    pub parallel: bool,
    /// Worker count; `None` uses the available hardware parallelism.
    ///
    /// Timeouts are measured from the start of the run, so with fewer
    /// workers than enabled detectors a detector queued behind a slow one
    /// gets less than its configured timeout.
    pub workers: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            workers: None,
        }
    }
}

impl EngineOptions {
    /// Sequential execution on the calling thread.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            parallel: false,
            workers: None,
        }
    }

    fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        })
    }
}

/// Runs a set of detectors against a photo.
#[derive(Debug)]
pub struct GeometryDetectionEngine {
    configs: Arc<Vec<DetectorConfig>>,
    pool: Option<WorkerPool>,
}

impl GeometryDetectionEngine {
    /// Engine over `configs`.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidArgument`] for a zero timeout or a
    /// duplicate name, and [`VisionError::Spawn`] if the worker pool
    /// cannot start.
    pub fn new(configs: Vec<DetectorConfig>, options: &EngineOptions) -> Result<Self, VisionError> {
        for (i, config) in configs.iter().enumerate() {
            check_timeout(config.name(), config.timeout())?;
            if configs[..i].iter().any(|c| c.name == config.name) {
                return Err(VisionError::InvalidArgument(format!(
                    "duplicate detector name {:?}",
                    config.name
                )));
            }
        }
        let pool = if options.parallel {
            Some(WorkerPool::new(options.worker_count())?)
        } else {
            None
        };
        Ok(Self {
            configs: Arc::new(configs),
            pool,
        })
    }

    /// Engine over [`default_detectors`].
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::Spawn`] if the worker pool cannot start.
    pub fn with_default_detectors(options: &EngineOptions) -> Result<Self, VisionError> {
        Self::new(default_detectors(), options)
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<DetectorConfig>> {
        Arc::clone(&self.configs)
    }

    /// Names of all configured detectors, enabled or not.
    #[must_use]
    pub fn detector_names(&self) -> Vec<&str> {
        self.configs.iter().map(DetectorConfig::name).collect()
    }

    /// Enable or disable the named detector. Returns `false` if no
    /// detector has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        self.replace_entry(name, |c| c.with_enabled(enabled))
    }

    /// Change the named detector's timeout. Returns `Ok(false)` if no
    /// detector has that name.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidArgument`] for a zero timeout.
    pub fn set_timeout(&mut self, name: &str, timeout: Duration) -> Result<bool, VisionError> {
        check_timeout(name, timeout)?;
        Ok(self.replace_entry(name, |c| c.with_timeout(timeout)))
    }

    /// Add a detector at the end, or replace the entry with the same name
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidArgument`] for a zero timeout.
    pub fn add(&mut self, config: DetectorConfig) -> Result<(), VisionError> {
        check_timeout(config.name(), config.timeout())?;
        let configs = Arc::make_mut(&mut self.configs);
        match configs.iter_mut().find(|c| c.name == config.name) {
            Some(slot) => *slot = config,
            None => configs.push(config),
        }
        Ok(())
    }

    /// Remove the named detector. Returns `false` if it was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(index) = self.configs.iter().position(|c| c.name == name) else {
            return false;
        };
        Arc::make_mut(&mut self.configs).remove(index);
        true
    }

    fn replace_entry(&mut self, name: &str, update: impl FnOnce(DetectorConfig) -> DetectorConfig) -> bool {
        let Some(index) = self.configs.iter().position(|c| c.name == name) else {
            return false;
        };
        let configs = Arc::make_mut(&mut self.configs);
        configs[index] = update(configs[index].clone());
        true
    }

    /// Run every enabled detector and return one result per detector, in
    /// configuration order.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::EmptyImage`] for a zero-sized image and
    /// [`VisionError::PoolClosed`] if the worker pool is gone. Detector
    /// failures are reported inside the results, never here.
    pub fn run(&self, image: &RgbImage) -> Result<Vec<DetectorResult>, VisionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VisionError::EmptyImage);
        }
        let snapshot = self.snapshot();
        let enabled: Vec<&DetectorConfig> = snapshot.iter().filter(|c| c.enabled).collect();

        let started = Instant::now();
        let results = match &self.pool {
            Some(pool) => run_parallel(pool, &enabled, image)?,
            None => run_sequential(&enabled, image),
        };
        log::info!(
            "{} detectors finished in {:.3}ms, {} with four corners",
            results.len(),
            started.elapsed().as_secs_f64() * 1000.0,
            results.iter().filter(|r| r.has_valid_points()).count(),
        );
        Ok(results)
    }

    /// Run and keep only the valid quadrilaterals, in configuration order.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<(String, Quadrilateral)>, VisionError> {
        Ok(self
            .run(image)?
            .into_iter()
            .filter_map(|r| {
                let quad = r.quadrilateral()?;
                Some((r.name, quad))
            })
            .collect())
    }

    /// Run and aggregate.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn statistics(&self, image: &RgbImage) -> Result<Statistics, VisionError> {
        Ok(Statistics::from_results(self.run(image)?))
    }
}

/// The built-in detectors: every rectangle preset, then every corner
/// preset, all enabled with [`DetectorConfig::DEFAULT_TIMEOUT`].
#[must_use]
pub fn default_detectors() -> Vec<DetectorConfig> {
    let rectangles = RectanglePreset::ALL.into_iter().map(|preset| {
        DetectorConfig::new(
            format!("Rectangle_{}", preset.label()),
            RectangleDetector::new(preset),
        )
    });
    let corners = CornerPreset::ALL.into_iter().map(|preset| {
        DetectorConfig::new(
            format!("Corner_{}", preset.label()),
            CornerDetector::new(preset),
        )
    });
    rectangles.chain(corners).collect()
}

fn check_timeout(name: &str, timeout: Duration) -> Result<(), VisionError> {
    if timeout.is_zero() {
        return Err(VisionError::InvalidArgument(format!(
            "timeout for detector {name:?} must be positive"
        )));
    }
    Ok(())
}

fn timeout_message(timeout: Duration) -> String {
    format!("timeout after {}ms", timeout.as_millis())
}

/// Run one detector, timing it and turning errors and panics into
/// failure results.
fn execute(name: &str, detector: &dyn Detector, image: &RgbImage) -> DetectorResult {
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| detector.find_corners(image)));
    let elapsed = started.elapsed();
    match outcome {
        Ok(Ok(points)) => DetectorResult::success(name, points, elapsed),
        Ok(Err(e)) => {
            log::warn!("detector {name} failed: {e}");
            DetectorResult::failure(name, e.to_string(), elapsed)
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            log::warn!("detector {name} panicked: {message}");
            DetectorResult::failure(name, format!("detector panicked: {message}"), elapsed)
        }
    }
}

fn run_sequential(configs: &[&DetectorConfig], image: &RgbImage) -> Vec<DetectorResult> {
    configs
        .iter()
        .map(|config| {
            let working = image.clone();
            let result = execute(&config.name, config.detector.as_ref(), &working);
            if result.elapsed > config.timeout {
                log::warn!("detector {} overran its timeout", config.name);
                DetectorResult::failure(&config.name, timeout_message(config.timeout), result.elapsed)
            } else {
                result
            }
        })
        .collect()
}

fn run_parallel(
    pool: &WorkerPool,
    configs: &[&DetectorConfig],
    image: &RgbImage,
) -> Result<Vec<DetectorResult>, VisionError> {
    let started = Instant::now();
    let mut slots = Vec::with_capacity(configs.len());
    for config in configs {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let working = image.clone();
        let detector = Arc::clone(&config.detector);
        let name = config.name.clone();
        pool.submit(move || {
            let result = execute(&name, detector.as_ref(), &working);
            // The collector is gone once the slot has timed out.
            let _ = tx.send(result);
        })?;
        slots.push((*config, rx));
    }

    let results = slots
        .into_iter()
        .map(|(config, rx)| {
            let received = match started.checked_add(config.timeout) {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!("detector {} timed out", config.name);
                    DetectorResult::failure(&config.name, timeout_message(config.timeout), config.timeout)
                }
                Err(RecvTimeoutError::Disconnected) => DetectorResult::failure(
                    &config.name,
                    "detector task ended without a result",
                    started.elapsed(),
                ),
            }
        })
        .collect();
    Ok(results)
}
