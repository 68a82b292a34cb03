//! Root score estimators used by the level scan.

use crate::feature::FeatureMap;
use crate::kernel::{response_at, DefaultKernel};
use crate::model::Filter;

/// Scores a root filter placement on one pyramid level.
pub trait ScoreEstimator {
    /// Root response with the filter's top-left cell at padded `(x, y)`.
    fn estimate(&self, x: usize, y: usize) -> f32;
}

/// Full-dimensional root response.
pub struct ExactEstimator<'a> {
    map: &'a FeatureMap,
    root: &'a Filter,
}

impl<'a> ExactEstimator<'a> {
    pub fn new(map: &'a FeatureMap, root: &'a Filter) -> Self {
        Self { map, root }
    }
}

impl ScoreEstimator for ExactEstimator<'_> {
    #[inline]
    fn estimate(&self, x: usize, y: usize) -> f32 {
        response_at::<DefaultKernel>(self.map, self.root, x, y)
    }
}

/// Root response in the compressed feature space.
///
/// Cheaper than the exact response and used to skip placements that cannot
/// reach the score threshold.
pub struct CompressedEstimator<'a> {
    map: &'a FeatureMap,
    root: &'a Filter,
}

impl<'a> CompressedEstimator<'a> {
    /// `map` is a compressed level and `root` the matching compressed root.
    pub fn new(map: &'a FeatureMap, root: &'a Filter) -> Self {
        Self { map, root }
    }
}

impl ScoreEstimator for CompressedEstimator<'_> {
    #[inline]
    fn estimate(&self, x: usize, y: usize) -> f32 {
        response_at::<DefaultKernel>(self.map, self.root, x, y)
    }
}
