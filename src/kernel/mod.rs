//! Filter correlation kernels.
//!
//! A kernel supplies the inner dot product; window scoring and dense
//! response maps are built on top of it. A filter row and the matching span
//! of a feature-map row are both contiguous, so each window reduces to
//! `size_y` dot products of length `size_x * num_features`.

use crate::feature::FeatureMap;
use crate::model::Filter;

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
pub mod rayon;

/// Kernel trait for the filter dot product.
pub trait Kernel {
    /// Dot product of two equally long slices.
    fn dot(a: &[f32], b: &[f32]) -> f32;
}

/// Kernel used by the matcher: SIMD when the `simd` feature is enabled.
#[cfg(not(feature = "simd"))]
pub type DefaultKernel = scalar::ScalarKernel;
#[cfg(feature = "simd")]
pub type DefaultKernel = simd::SimdKernel;

/// Dense filter responses over every placement that fits inside a map.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl ResponseMap {
    pub(crate) fn from_parts(width: usize, height: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), width * height);
        Self {
            width,
            height,
            values,
        }
    }

    /// Number of placements along x.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of placements along y.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Response of the placement with top-left cell `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.values[y * self.width + x])
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Placement counts of `filter` over `map`, or `None` if it does not fit.
pub(crate) fn placements(map: &FeatureMap, filter: &Filter) -> Option<(usize, usize)> {
    if filter.size_x() > map.size_x() || filter.size_y() > map.size_y() {
        return None;
    }
    Some((
        map.size_x() - filter.size_x() + 1,
        map.size_y() - filter.size_y() + 1,
    ))
}

/// Filter response with its top-left cell at `(x, y)`.
///
/// The caller guarantees the window lies inside the map and the feature
/// dimensions agree.
#[inline]
pub fn response_at<K: Kernel>(map: &FeatureMap, filter: &Filter, x: usize, y: usize) -> f32 {
    let mut acc = 0.0f32;
    for ty in 0..filter.size_y() {
        acc += K::dot(map.row_span(x, y + ty, filter.size_x()), filter.row(ty));
    }
    acc
}

/// Evaluates `filter` at every placement inside `map`.
///
/// Returns an empty map when the filter is larger than the feature map.
pub fn response_map<K: Kernel>(map: &FeatureMap, filter: &Filter) -> ResponseMap {
    let Some((width, height)) = placements(map, filter) else {
        return ResponseMap::from_parts(0, 0, Vec::new());
    };
    let mut values = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            values.push(response_at::<K>(map, filter, x, y));
        }
    }
    ResponseMap::from_parts(width, height, values)
}

#[cfg(test)]
mod tests {
    use super::{response_at, response_map, scalar::ScalarKernel};
    use crate::feature::FeatureMap;
    use crate::model::Filter;

    #[test]
    fn response_map_covers_all_placements() {
        let cells: Vec<f32> = (0..4 * 3 * 2).map(|v| v as f32).collect();
        let map = FeatureMap::from_vec(4, 3, 2, cells).unwrap();
        let filter = Filter::new(2, 2, 2, vec![1.0; 8]).unwrap();
        let responses = response_map::<ScalarKernel>(&map, &filter);
        assert_eq!((responses.width(), responses.height()), (3, 2));
        // Cells (1,1),(2,1),(1,2),(2,2) hold feature pairs starting at 10, 12, 18, 20.
        let expected = (10 + 11 + 12 + 13 + 18 + 19 + 20 + 21) as f32;
        assert_eq!(responses.get(1, 1), Some(expected));
        assert_eq!(response_at::<ScalarKernel>(&map, &filter, 1, 1), expected);
        assert_eq!(responses.get(3, 0), None);
    }

    #[test]
    fn oversized_filter_yields_empty_map() {
        let map = FeatureMap::zeros(2, 2, 1).unwrap();
        let filter = Filter::new(3, 1, 1, vec![1.0; 3]).unwrap();
        assert!(response_map::<ScalarKernel>(&map, &filter).is_empty());
    }
}
