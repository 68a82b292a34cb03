//! Rayon-parallel response maps (feature-gated).
//!
//! Rows of placements are scored in parallel and concatenated in row order,
//! so the result is identical to the sequential `response_map`.

use crate::feature::FeatureMap;
use crate::kernel::{placements, response_at, Kernel, ResponseMap};
use crate::model::Filter;
use rayon::prelude::*;

/// Row-parallel version of `kernel::response_map`.
pub fn response_map_par<K: Kernel>(map: &FeatureMap, filter: &Filter) -> ResponseMap {
    let Some((width, height)) = placements(map, filter) else {
        return ResponseMap::from_parts(0, 0, Vec::new());
    };
    let rows: Vec<Vec<f32>> = (0..height)
        .into_par_iter()
        .map(|y| {
            (0..width)
                .map(|x| response_at::<K>(map, filter, x, y))
                .collect()
        })
        .collect();
    ResponseMap::from_parts(width, height, rows.concat())
}
