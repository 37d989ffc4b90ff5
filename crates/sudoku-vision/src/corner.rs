//! Corner-feature based grid detection.
//!
//! Strong corners of the thresholded photo are searched for triples that
//! form an axis-aligned right triangle. The largest such triangle (by its
//! bounding-box area) marks the grid, and its bounding box becomes the
//! quadrilateral.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::features::{self, FeatureParams};
use crate::search::{self, AreaBounds};
use crate::triangle::RightTriangle;
use crate::types::{Point, Quadrilateral, VisionError};
use crate::{grayscale, threshold};

/// Fewer corner candidates than this cannot form a triangle.
pub const MIN_CANDIDATES: usize = 3;

/// Named parameter sets for [`CornerDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CornerPreset {
    /// Any positive area.
    #[default]
    Standard,
    /// Only triangles larger than 60000 square pixels.
    Large,
    /// Collect the vertices of small triangles (1000 to 10000), then search
    /// those vertices again for triangles above 80000.
    Refined,
}

impl CornerPreset {
    /// All presets in declaration order.
    pub const ALL: [Self; 3] = [Self::Standard, Self::Large, Self::Refined];

    /// The parameter set this preset stands for.
    #[must_use]
    pub const fn params(self) -> CornerParams {
        let standard = CornerParams::STANDARD;
        match self {
            Self::Standard => standard,
            Self::Large => CornerParams {
                min_area: 60_000.0,
                ..standard
            },
            Self::Refined => CornerParams {
                min_area: 1000.0,
                max_area: 10_000.0,
                refine_min_area: Some(80_000.0),
                ..standard
            },
        }
    }

    /// Short identifier used in detector names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Large => "Large",
            Self::Refined => "Refined",
        }
    }
}

/// Tunables for [`CornerDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerParams {
    /// Contrast stretch factor.
    pub contrast: f64,
    /// Binary threshold level.
    pub threshold: u8,
    /// Corner feature extraction settings.
    pub features: FeatureParams,
    /// Exclusive lower area bound for the first search.
    pub min_area: f64,
    /// Exclusive upper area bound for the first search.
    pub max_area: f64,
    /// When set, the first search's vertices are searched again with this
    /// lower bound and no upper bound.
    pub refine_min_area: Option<f64>,
}

impl CornerParams {
    const STANDARD: Self = Self {
        contrast: 3.0,
        threshold: 225,
        features: FeatureParams {
            max_corners: FeatureParams::DEFAULT_MAX_CORNERS,
            quality_level: FeatureParams::DEFAULT_QUALITY_LEVEL,
            min_distance: FeatureParams::DEFAULT_MIN_DISTANCE,
        },
        min_area: 0.0,
        max_area: AreaBounds::UNBOUNDED,
        refine_min_area: None,
    };
}

impl Default for CornerParams {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Finds the grid as the largest right triangle among corner features.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerDetector {
    params: CornerParams,
}

impl CornerDetector {
    /// Detector using a preset's parameters.
    #[must_use]
    pub const fn new(preset: CornerPreset) -> Self {
        Self::from_params(preset.params())
    }

    /// Detector using explicit parameters.
    #[must_use]
    pub const fn from_params(params: CornerParams) -> Self {
        Self { params }
    }

    /// The active parameters.
    #[must_use]
    pub const fn params(&self) -> &CornerParams {
        &self.params
    }

    /// Locate the grid in a photo.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::EmptyImage`] for a zero-sized image, and
    /// propagates parameter and search-size errors from
    /// [`quadrilateral_from_points`](Self::quadrilateral_from_points).
    pub fn detect(&self, image: &RgbImage) -> Result<Option<Quadrilateral>, VisionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VisionError::EmptyImage);
        }
        let enhanced = grayscale::enhance_contrast(image, self.params.contrast)?;
        let gray = grayscale::to_gray(&enhanced);
        let binary = threshold::binary(&gray, self.params.threshold);
        let candidates = features::good_features(&binary, &self.params.features);
        self.quadrilateral_from_points(&candidates)
    }

    /// Run the triangle stages on already extracted corner candidates.
    ///
    /// Returns `Ok(None)` with fewer than [`MIN_CANDIDATES`] points or when
    /// no triangle falls inside the area bounds.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidArgument`] for invalid area bounds or
    /// non-finite points, and [`VisionError::TooManyPoints`] when a search
    /// is handed too many points.
    pub fn quadrilateral_from_points(
        &self,
        points: &[Point],
    ) -> Result<Option<Quadrilateral>, VisionError> {
        let bounds = AreaBounds::new(self.params.min_area, self.params.max_area)?;
        let refine = self
            .params
            .refine_min_area
            .map(|min| AreaBounds::new(min, AreaBounds::UNBOUNDED))
            .transpose()?;

        if points.len() < MIN_CANDIDATES {
            return Ok(None);
        }

        let mut triangles = search::find_right_triangles(points, bounds)?;
        if let Some(refine) = refine {
            let vertices = unique_vertices(&triangles);
            log::debug!(
                "refining over {} vertices of {} triangles",
                vertices.len(),
                triangles.len(),
            );
            triangles = if vertices.len() < MIN_CANDIDATES {
                Vec::new()
            } else {
                search::find_right_triangles(&vertices, refine)?
            };
        }

        Ok(largest_triangle(&triangles).map(RightTriangle::quadrilateral))
    }
}

/// Source vertices of `triangles`, deduplicated in first-seen order.
fn unique_vertices(triangles: &[RightTriangle]) -> Vec<Point> {
    let mut seen = std::collections::HashSet::new();
    triangles
        .iter()
        .flat_map(RightTriangle::points)
        .filter(|p| seen.insert(p.key()))
        .collect()
}

/// The triangle with the largest positive area; the first one wins ties.
fn largest_triangle(triangles: &[RightTriangle]) -> Option<&RightTriangle> {
    let mut best: Option<&RightTriangle> = None;
    let mut best_area = 0.0;
    for triangle in triangles {
        if triangle.area() > best_area {
            best_area = triangle.area();
            best = Some(triangle);
        }
    }
    best
}
