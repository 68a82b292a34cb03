//! Dense per-cell feature grids.

use crate::model::Projection;
use crate::util::{DpmError, DpmResult};

/// Dense grid of feature vectors, one per cell.
///
/// Cells are stored row-major and each cell's features are contiguous, so
/// the value at `(x, y, f)` lives at `((y * size_x) + x) * num_features + f`.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMap {
    size_x: usize,
    size_y: usize,
    num_features: usize,
    cells: Vec<f32>,
}

impl FeatureMap {
    /// Creates a zero-filled map.
    pub fn zeros(size_x: usize, size_y: usize, num_features: usize) -> DpmResult<Self> {
        let len = checked_len(size_x, size_y, num_features)?;
        Ok(Self {
            size_x,
            size_y,
            num_features,
            cells: vec![0.0; len],
        })
    }

    /// Wraps an existing buffer, validating its length.
    pub fn from_vec(
        size_x: usize,
        size_y: usize,
        num_features: usize,
        cells: Vec<f32>,
    ) -> DpmResult<Self> {
        let len = checked_len(size_x, size_y, num_features)?;
        if cells.len() != len {
            return Err(DpmError::InvalidInput(
                "feature buffer length does not match size_x * size_y * num_features",
            ));
        }
        Ok(Self {
            size_x,
            size_y,
            num_features,
            cells,
        })
    }

    /// Returns the number of cells along x.
    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// Returns the number of cells along y.
    pub fn size_y(&self) -> usize {
        self.size_y
    }

    /// Returns the feature dimension of each cell.
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Returns the raw buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.cells
    }

    /// Returns the feature vector of cell `(x, y)`.
    pub fn cell(&self, x: usize, y: usize) -> Option<&[f32]> {
        if x >= self.size_x || y >= self.size_y {
            return None;
        }
        let start = (y * self.size_x + x) * self.num_features;
        self.cells.get(start..start + self.num_features)
    }

    pub(crate) fn cell_mut(&mut self, x: usize, y: usize) -> &mut [f32] {
        let start = (y * self.size_x + x) * self.num_features;
        &mut self.cells[start..start + self.num_features]
    }

    /// Returns `cells[x0..x0 + count]` of row `y` as one contiguous slice.
    pub(crate) fn row_span(&self, x0: usize, y: usize, count: usize) -> &[f32] {
        let start = (y * self.size_x + x0) * self.num_features;
        &self.cells[start..start + count * self.num_features]
    }

    /// Embeds the map in a border of `pad_x`/`pad_y` cells and appends one
    /// channel that is 1.0 on border cells and 0.0 inside.
    pub(crate) fn pad_with_truncation(&self, pad_x: usize, pad_y: usize) -> FeatureMap {
        let num_features = self.num_features + 1;
        let size_x = self.size_x + 2 * pad_x;
        let size_y = self.size_y + 2 * pad_y;
        let mut cells = vec![0.0f32; size_x * size_y * num_features];
        for y in 0..size_y {
            for x in 0..size_x {
                let dst = (y * size_x + x) * num_features;
                let inside = x >= pad_x
                    && x < pad_x + self.size_x
                    && y >= pad_y
                    && y < pad_y + self.size_y;
                if inside {
                    let src = ((y - pad_y) * self.size_x + (x - pad_x)) * self.num_features;
                    cells[dst..dst + self.num_features]
                        .copy_from_slice(&self.cells[src..src + self.num_features]);
                } else {
                    cells[dst + self.num_features] = 1.0;
                }
            }
        }
        FeatureMap {
            size_x,
            size_y,
            num_features,
            cells,
        }
    }

    /// Projects every cell through `projection`, reading the first
    /// `projection.input_dim()` features of each cell.
    pub fn project(&self, projection: &Projection) -> DpmResult<FeatureMap> {
        if projection.input_dim() > self.num_features {
            return Err(DpmError::InvalidInput(
                "projection input dimension exceeds the feature dimension",
            ));
        }
        let out_dim = projection.output_dim();
        let mut out = FeatureMap::zeros(self.size_x, self.size_y, out_dim)?;
        for (src, dst) in self
            .cells
            .chunks_exact(self.num_features)
            .zip(out.cells.chunks_exact_mut(out_dim))
        {
            projection.apply(&src[..projection.input_dim()], dst);
        }
        Ok(out)
    }
}

fn checked_len(size_x: usize, size_y: usize, num_features: usize) -> DpmResult<usize> {
    if size_x == 0 || size_y == 0 || num_features == 0 {
        return Err(DpmError::InvalidInput("feature map dimensions must be non-zero"));
    }
    size_x
        .checked_mul(size_y)
        .and_then(|v| v.checked_mul(num_features))
        .ok_or(DpmError::InvalidInput("feature map dimensions overflow"))
}
