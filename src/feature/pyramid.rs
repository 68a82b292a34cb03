//! Padded HOG feature pyramids.
//!
//! With `λ = levels_per_octave` and `step = 2^(1/λ)`, the image is resampled
//! by `1 / step^i` for `i = 0, 1, ...`. Levels `0..λ` compute features with
//! half-size cells, and level `λ + i` uses full cells on the same resampled
//! image. Level `L` and level `L - λ` are thus exactly one octave apart,
//! which is where part filters are evaluated.

use crate::feature::hog::{compute_hog, hog_cells, HOG_FEATURES};
use crate::feature::FeatureMap;
use crate::image::resample::resample_area;
use crate::image::ImageView;
use crate::model::{FilterDims, Projection};
use crate::trace::{trace_event, trace_span};
use crate::util::math::scale_step;
use crate::util::{DpmError, DpmResult};

/// Feature dimension of built pyramid levels: HOG plus the truncation channel.
pub const PYRAMID_FEATURES: usize = HOG_FEATURES + 1;

/// Pyramid construction parameters.
#[derive(Clone, Debug)]
pub struct PyramidConfig {
    /// Pixels per cell on coarse (root) levels; fine levels use half.
    pub cell_size: usize,
    /// Levels per factor-of-two change in scale.
    pub levels_per_octave: usize,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            cell_size: 8,
            levels_per_octave: 10,
        }
    }
}

impl PyramidConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> DpmResult<()> {
        if self.cell_size < 2 || self.cell_size % 2 != 0 {
            return Err(DpmError::InvalidInput("cell_size must be an even number >= 2"));
        }
        if self.levels_per_octave == 0 {
            return Err(DpmError::InvalidInput("levels_per_octave must be >= 1"));
        }
        Ok(())
    }
}

/// One pyramid level: a padded feature map plus its image-space geometry.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    map: FeatureMap,
    cell_size: f32,
    origin: f32,
}

impl PyramidLevel {
    /// `cell_size` is in image pixels per cell; `origin` is the image
    /// coordinate of the first unpadded cell.
    pub fn new(map: FeatureMap, cell_size: f32, origin: f32) -> DpmResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) || !origin.is_finite() {
            return Err(DpmError::InvalidInput("level geometry must be finite and positive"));
        }
        Ok(Self {
            map,
            cell_size,
            origin,
        })
    }

    pub fn map(&self) -> &FeatureMap {
        &self.map
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn origin(&self) -> f32 {
        self.origin
    }
}

/// Levels ordered finest to coarsest, all padded by the same border.
#[derive(Clone, Debug)]
pub struct FeaturePyramid {
    levels: Vec<PyramidLevel>,
    pad_x: usize,
    pad_y: usize,
    first_root_level: usize,
}

impl FeaturePyramid {
    /// Assembles a pyramid from already padded levels.
    pub fn new(levels: Vec<PyramidLevel>, pad_x: usize, pad_y: usize) -> DpmResult<Self> {
        let first = levels
            .first()
            .ok_or(DpmError::InvalidInput("pyramid needs at least one level"))?;
        let num_features = first.map.num_features();
        if levels.iter().any(|l| l.map.num_features() != num_features) {
            return Err(DpmError::InvalidInput("pyramid levels differ in feature dimension"));
        }
        if levels
            .iter()
            .any(|l| l.map.size_x() < 2 * pad_x || l.map.size_y() < 2 * pad_y)
        {
            return Err(DpmError::InvalidInput("pyramid level is smaller than its padding"));
        }
        Ok(Self {
            levels,
            pad_x,
            pad_y,
            first_root_level: 0,
        })
    }

    /// Restricts root filters to levels `first..`; finer levels then only
    /// serve parts.
    pub fn with_first_root_level(mut self, first: usize) -> DpmResult<Self> {
        if first >= self.levels.len() {
            return Err(DpmError::InvalidInput("first root level is outside the pyramid"));
        }
        self.first_root_level = first;
        Ok(self)
    }

    /// Lowest level a root filter is evaluated at.
    pub fn first_root_level(&self) -> usize {
        self.first_root_level
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Option<&PyramidLevel> {
        self.levels.get(index)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn num_features(&self) -> usize {
        self.levels[0].map.num_features()
    }

    /// Border width in cells along x.
    pub fn pad_x(&self) -> usize {
        self.pad_x
    }

    /// Border width in cells along y.
    pub fn pad_y(&self) -> usize {
        self.pad_y
    }
}

/// Reduced-dimension mirror of a `FeaturePyramid`.
#[derive(Clone, Debug)]
pub struct CompressedPyramid {
    inner: FeaturePyramid,
}

impl CompressedPyramid {
    /// Projects every cell of `pyramid` through `projection`.
    pub fn from_pyramid(pyramid: &FeaturePyramid, projection: &Projection) -> DpmResult<Self> {
        let levels = pyramid
            .levels
            .iter()
            .map(|level| {
                Ok(PyramidLevel {
                    map: level.map.project(projection)?,
                    cell_size: level.cell_size,
                    origin: level.origin,
                })
            })
            .collect::<DpmResult<Vec<_>>>()?;
        Ok(Self {
            inner: FeaturePyramid {
                levels,
                pad_x: pyramid.pad_x,
                pad_y: pyramid.pad_y,
                first_root_level: pyramid.first_root_level,
            },
        })
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        self.inner.levels()
    }

    pub fn level(&self, index: usize) -> Option<&PyramidLevel> {
        self.inner.level(index)
    }

    pub fn num_levels(&self) -> usize {
        self.inner.num_levels()
    }

    pub fn num_features(&self) -> usize {
        self.inner.num_features()
    }

    /// True when level count and every cell grid match `pyramid`.
    pub fn mirrors(&self, pyramid: &FeaturePyramid) -> bool {
        self.num_levels() == pyramid.num_levels()
            && self
                .levels()
                .iter()
                .zip(pyramid.levels())
                .all(|(c, f)| c.map.size_x() == f.map.size_x() && c.map.size_y() == f.map.size_y())
    }
}

/// Border in cells that keeps every filter of `dims` inside the padded map.
pub fn border_for(dims: FilterDims) -> (usize, usize) {
    (dims.width.div_ceil(2) + 1, dims.height.div_ceil(2) + 1)
}

/// Builds the full and compressed pyramids for one image.
#[derive(Clone, Debug, Default)]
pub struct PyramidBuilder {
    cfg: PyramidConfig,
}

impl PyramidBuilder {
    pub fn new(cfg: PyramidConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.cfg
    }

    /// Builds both pyramids, sized so every filter within `max_filter` fits
    /// inside the padding.
    ///
    /// An image too small for a single HOG cell is a degenerate input here
    /// and fails with `InvalidInput`; [`PyramidBuilder::try_build`] reports
    /// it as `None` instead.
    pub fn build(
        &self,
        image: ImageView<'_>,
        max_filter: FilterDims,
        projection: &Projection,
    ) -> DpmResult<(FeaturePyramid, CompressedPyramid)> {
        self.try_build(image, max_filter, projection)?
            .ok_or(DpmError::InvalidInput("image is too small for a single feature cell"))
    }

    /// Like [`PyramidBuilder::build`], returning `None` when the image yields
    /// no feature cell at all.
    pub fn try_build(
        &self,
        image: ImageView<'_>,
        max_filter: FilterDims,
        projection: &Projection,
    ) -> DpmResult<Option<(FeaturePyramid, CompressedPyramid)>> {
        let Some(pyramid) = self.build_levels(image, max_filter)? else {
            return Ok(None);
        };
        let compressed = CompressedPyramid::from_pyramid(&pyramid, projection)?;
        Ok(Some((pyramid, compressed)))
    }

    /// Builds the full-dimensional pyramid only.
    pub fn build_features(
        &self,
        image: ImageView<'_>,
        max_filter: FilterDims,
    ) -> DpmResult<FeaturePyramid> {
        self.build_levels(image, max_filter)?
            .ok_or(DpmError::InvalidInput("image is too small for a single feature cell"))
    }

    fn build_levels(
        &self,
        image: ImageView<'_>,
        max_filter: FilterDims,
    ) -> DpmResult<Option<FeaturePyramid>> {
        self.cfg.validate()?;
        let width = image.width();
        let height = image.height();
        if width == 0 || height == 0 {
            return Err(DpmError::InvalidInput("image has zero width or height"));
        }

        let lambda = self.cfg.levels_per_octave;
        let coarse_bin = self.cfg.cell_size;
        let fine_bin = coarse_bin / 2;
        let step = scale_step(lambda);
        let (pad_x, pad_y) = border_for(max_filter);

        let _span = trace_span!("build_pyramid", width = width, height = height).entered();

        let resampled_size = |i: usize| {
            let scale = step.powi(i as i32).recip();
            let w = ((width as f32 * scale).round() as usize).max(1);
            let h = ((height as f32 * scale).round() as usize).max(1);
            (w, h, scale)
        };

        let mut fine = Vec::with_capacity(lambda);
        let mut coarse = Vec::new();
        for i in 0.. {
            let (w, h, scale) = resampled_size(i);
            let wants_fine = i < lambda;
            let coarse_fits = hog_cells(w, coarse_bin) > 0 && hog_cells(h, coarse_bin) > 0;
            let fine_fits = hog_cells(w, fine_bin) > 0 && hog_cells(h, fine_bin) > 0;
            if !coarse_fits && !(wants_fine && fine_fits) {
                break;
            }
            let resampled = resample_area(image, w, h);
            if wants_fine {
                if let Some(map) = compute_hog(&resampled, fine_bin) {
                    let cell = fine_bin as f32 / scale;
                    fine.push(PyramidLevel {
                        map: map.pad_with_truncation(pad_x, pad_y),
                        cell_size: cell,
                        origin: cell,
                    });
                }
            }
            if coarse_fits {
                if let Some(map) = compute_hog(&resampled, coarse_bin) {
                    let cell = coarse_bin as f32 / scale;
                    coarse.push(PyramidLevel {
                        map: map.pad_with_truncation(pad_x, pad_y),
                        cell_size: cell,
                        origin: cell,
                    });
                }
            }
        }

        // Coarse levels are only addressable one octave above a complete
        // set of fine levels.
        let mut levels = fine;
        if levels.len() == lambda {
            levels.extend(coarse);
        }
        if levels.is_empty() {
            trace_event!("pyramid_levels", levels = 0usize, pad_x = pad_x, pad_y = pad_y);
            return Ok(None);
        }
        // Roots start at the first coarse level; fine levels hold parts.
        let first_root_level = if levels.len() > lambda { lambda } else { 0 };

        trace_event!("pyramid_levels", levels = levels.len(), pad_x = pad_x, pad_y = pad_y);
        FeaturePyramid::new(levels, pad_x, pad_y)?
            .with_first_root_level(first_root_level)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::{border_for, PyramidBuilder, PyramidConfig, PYRAMID_FEATURES};
    use crate::image::ImageView;
    use crate::model::FilterDims;

    fn textured(width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                (((x * 7) ^ (y * 13)) & 0xFF) as u8
            })
            .collect()
    }

    #[test]
    fn coarse_level_is_one_octave_above_fine_level() {
        let data = textured(96, 80);
        let view = ImageView::from_slice(&data, 96, 80, 1).unwrap();
        let builder = PyramidBuilder::new(PyramidConfig {
            cell_size: 8,
            levels_per_octave: 2,
        });
        let pyramid = builder
            .build_features(view, FilterDims { width: 3, height: 3 })
            .unwrap();
        assert!(pyramid.num_levels() > 2);
        assert_eq!(pyramid.num_features(), PYRAMID_FEATURES);
        let fine = pyramid.level(0).unwrap();
        let coarse = pyramid.level(2).unwrap();
        assert!((coarse.cell_size() / fine.cell_size() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn border_covers_half_the_largest_filter() {
        assert_eq!(border_for(FilterDims { width: 6, height: 5 }), (4, 4));
        assert_eq!(border_for(FilterDims { width: 0, height: 1 }), (1, 2));
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = PyramidConfig {
            cell_size: 7,
            levels_per_octave: 3,
        };
        assert!(cfg.validate().is_err());
    }
}
