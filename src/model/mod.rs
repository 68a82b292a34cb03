//! Trained model representation: filters, components and the PCA projection.
//!
//! A `Model` is validated once in `Model::new` and is immutable afterwards;
//! the matcher relies on every invariant checked there.

#[cfg(feature = "json")]
pub mod json;
pub mod source;

use crate::util::{DpmError, DpmResult};

/// Placement of a part relative to its root.
///
/// `x`/`y` are in cells of the part's level, measured from the root position
/// scaled to that level. `level_offset` counts levels from the root down to
/// the part's finer level and must be at least 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Anchor {
    pub x: i32,
    pub y: i32,
    pub level_offset: usize,
}

/// Quadratic deformation cost `c0*dx + c1*dx^2 + c2*dy + c3*dy^2`.
///
/// The cost is subtracted from the part response at displacement `(dx, dy)`
/// from the anchor. Coefficients are used as stored.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeformationCost(pub [f32; 4]);

impl DeformationCost {
    /// Cost along x for displacement `dx`.
    #[inline]
    pub fn cost_x(&self, dx: f32) -> f32 {
        self.0[0] * dx + self.0[1] * dx * dx
    }

    /// Cost along y for displacement `dy`.
    #[inline]
    pub fn cost_y(&self, dy: f32) -> f32 {
        self.0[2] * dy + self.0[3] * dy * dy
    }

    /// Total cost of displacement `(dx, dy)`.
    pub fn cost(&self, dx: f32, dy: f32) -> f32 {
        self.cost_x(dx) + self.cost_y(dy)
    }
}

/// Width and height of a filter in cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterDims {
    pub width: usize,
    pub height: usize,
}

/// Linear filter over a window of feature cells.
///
/// Weights share the `FeatureMap` layout: row-major cells, features contiguous.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    size_x: usize,
    size_y: usize,
    num_features: usize,
    weights: Vec<f32>,
    deformation: DeformationCost,
    anchor: Anchor,
}

impl Filter {
    /// Creates a root filter (no anchor, no deformation cost).
    pub fn new(
        size_x: usize,
        size_y: usize,
        num_features: usize,
        weights: Vec<f32>,
    ) -> DpmResult<Self> {
        if size_x == 0 || size_y == 0 || num_features == 0 {
            return Err(DpmError::InvalidModel {
                reason: "filter dimensions must be non-zero".to_string(),
            });
        }
        let expected = size_x
            .checked_mul(size_y)
            .and_then(|v| v.checked_mul(num_features))
            .ok_or_else(|| DpmError::InvalidModel {
                reason: "filter dimensions overflow".to_string(),
            })?;
        if weights.len() != expected {
            return Err(DpmError::InvalidModel {
                reason: format!(
                    "filter {size_x}x{size_y}x{num_features} expects {expected} weights, got {}",
                    weights.len()
                ),
            });
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(DpmError::InvalidModel {
                reason: "filter weights must be finite".to_string(),
            });
        }
        Ok(Self {
            size_x,
            size_y,
            num_features,
            weights,
            deformation: DeformationCost::default(),
            anchor: Anchor::default(),
        })
    }

    /// Creates a part filter with its anchor and deformation cost.
    pub fn part(
        size_x: usize,
        size_y: usize,
        num_features: usize,
        weights: Vec<f32>,
        deformation: DeformationCost,
        anchor: Anchor,
    ) -> DpmResult<Self> {
        let mut filter = Self::new(size_x, size_y, num_features, weights)?;
        filter.deformation = deformation;
        filter.anchor = anchor;
        Ok(filter)
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    pub fn size_y(&self) -> usize {
        self.size_y
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn deformation(&self) -> DeformationCost {
        self.deformation
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Returns the weights of filter row `ty` as one contiguous slice.
    #[inline]
    pub(crate) fn row(&self, ty: usize) -> &[f32] {
        let len = self.size_x * self.num_features;
        &self.weights[ty * len..(ty + 1) * len]
    }

    /// Projects the per-cell weights through `projection`.
    pub fn project(&self, projection: &Projection) -> DpmResult<Filter> {
        if projection.input_dim() > self.num_features {
            return Err(DpmError::InvalidModel {
                reason: "projection input dimension exceeds the filter feature dimension"
                    .to_string(),
            });
        }
        let out_dim = projection.output_dim();
        let mut weights = vec![0.0f32; self.size_x * self.size_y * out_dim];
        for (src, dst) in self
            .weights
            .chunks_exact(self.num_features)
            .zip(weights.chunks_exact_mut(out_dim))
        {
            projection.apply(&src[..projection.input_dim()], dst);
        }
        Ok(Filter {
            size_x: self.size_x,
            size_y: self.size_y,
            num_features: out_dim,
            weights,
            deformation: self.deformation,
            anchor: self.anchor,
        })
    }
}

/// Linear map from the leading `input_dim` features to `output_dim`
/// compressed coefficients. `coeffs` is row-major `input_dim x output_dim`.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    input_dim: usize,
    output_dim: usize,
    coeffs: Vec<f32>,
}

impl Projection {
    pub fn new(input_dim: usize, output_dim: usize, coeffs: Vec<f32>) -> DpmResult<Self> {
        if input_dim == 0 || output_dim == 0 {
            return Err(DpmError::InvalidModel {
                reason: "projection dimensions must be non-zero".to_string(),
            });
        }
        if input_dim.checked_mul(output_dim) != Some(coeffs.len()) {
            return Err(DpmError::InvalidModel {
                reason: format!(
                    "projection {input_dim}x{output_dim} expects {} coefficients, got {}",
                    input_dim.saturating_mul(output_dim),
                    coeffs.len()
                ),
            });
        }
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(DpmError::InvalidModel {
                reason: "projection coefficients must be finite".to_string(),
            });
        }
        Ok(Self {
            input_dim,
            output_dim,
            coeffs,
        })
    }

    /// Projection that keeps the first `output_dim` of `input_dim` features.
    pub fn truncating(input_dim: usize, output_dim: usize) -> DpmResult<Self> {
        let mut coeffs = vec![0.0f32; input_dim.saturating_mul(output_dim)];
        for i in 0..input_dim.min(output_dim) {
            coeffs[i * output_dim + i] = 1.0;
        }
        Self::new(input_dim, output_dim, coeffs)
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn coeffs(&self) -> &[f32] {
        &self.coeffs
    }

    /// Writes `input * coeffs` into `out`.
    pub(crate) fn apply(&self, input: &[f32], out: &mut [f32]) {
        out.fill(0.0);
        for (&v, row) in input.iter().zip(self.coeffs.chunks_exact(self.output_dim)) {
            if v == 0.0 {
                continue;
            }
            for (o, &c) in out.iter_mut().zip(row) {
                *o += v * c;
            }
        }
    }
}

/// One mixture component: a root filter, its parts and a bias.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    pub root: Filter,
    pub parts: Vec<Filter>,
    pub bias: f32,
}

impl Component {
    pub fn new(root: Filter, parts: Vec<Filter>, bias: f32) -> Self {
        Self { root, parts, bias }
    }

    /// Largest part level offset, i.e. the first root level this component
    /// can be evaluated at.
    pub fn max_level_offset(&self) -> usize {
        self.parts
            .iter()
            .map(|p| p.anchor.level_offset)
            .max()
            .unwrap_or(0)
    }

    fn filters(&self) -> impl Iterator<Item = &Filter> {
        std::iter::once(&self.root).chain(self.parts.iter())
    }
}

/// Validated, immutable detection model.
#[derive(Clone, Debug)]
pub struct Model {
    components: Vec<Component>,
    compressed_roots: Vec<Filter>,
    score_threshold: f32,
    projection: Projection,
}

impl Model {
    /// Validates and assembles a model.
    ///
    /// The score threshold may be infinite but not NaN.
    pub fn new(
        components: Vec<Component>,
        score_threshold: f32,
        projection: Projection,
    ) -> DpmResult<Self> {
        let invalid = |reason: String| DpmError::InvalidModel { reason };

        if components.is_empty() {
            return Err(invalid("model has no components".to_string()));
        }
        if score_threshold.is_nan() {
            return Err(invalid("score threshold is NaN".to_string()));
        }
        let num_features = components[0].root.num_features;
        for (idx, component) in components.iter().enumerate() {
            if !component.bias.is_finite() {
                return Err(invalid(format!("component {idx} has a non-finite bias")));
            }
            if component.filters().any(|f| f.num_features != num_features) {
                return Err(invalid(format!(
                    "component {idx} mixes feature dimensions (expected {num_features})"
                )));
            }
            for (part_idx, part) in component.parts.iter().enumerate() {
                if part.anchor.level_offset == 0 {
                    return Err(invalid(format!(
                        "component {idx} part {part_idx} is not on a finer level than its root"
                    )));
                }
                if part.deformation.0.iter().any(|c| !c.is_finite()) {
                    return Err(invalid(format!(
                        "component {idx} part {part_idx} has non-finite deformation coefficients"
                    )));
                }
            }
        }
        if projection.input_dim > num_features {
            return Err(invalid(format!(
                "projection expects {} input features but filters have {num_features}",
                projection.input_dim
            )));
        }

        let compressed_roots = components
            .iter()
            .map(|c| c.root.project(&projection))
            .collect::<DpmResult<Vec<_>>>()?;

        Ok(Self {
            components,
            compressed_roots,
            score_threshold,
            projection,
        })
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Root filter of `component` projected into the compressed space.
    pub fn compressed_root(&self, component: usize) -> Option<&Filter> {
        self.compressed_roots.get(component)
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Feature dimension shared by every filter.
    pub fn num_features(&self) -> usize {
        self.components[0].root.num_features
    }

    /// Largest filter width and height over all roots and parts.
    pub fn max_filter_dims(&self) -> FilterDims {
        self.components
            .iter()
            .flat_map(Component::filters)
            .fold(FilterDims::default(), |acc, f| FilterDims {
                width: acc.width.max(f.size_x),
                height: acc.height.max(f.size_y),
            })
    }

    /// Returns a copy of the model with a different score threshold.
    pub fn with_score_threshold(&self, score_threshold: f32) -> DpmResult<Self> {
        if score_threshold.is_nan() {
            return Err(DpmError::InvalidModel {
                reason: "score threshold is NaN".to_string(),
            });
        }
        Ok(Self {
            score_threshold,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Anchor, Component, DeformationCost, Filter, Model, Projection};
    use crate::util::DpmError;

    fn root(sx: usize, sy: usize, nf: usize) -> Filter {
        Filter::new(sx, sy, nf, vec![1.0; sx * sy * nf]).unwrap()
    }

    #[test]
    fn max_filter_dims_scans_roots_and_parts() {
        let part = Filter::part(
            2,
            7,
            3,
            vec![0.0; 42],
            DeformationCost([0.0, 0.1, 0.0, 0.1]),
            Anchor {
                x: 0,
                y: 0,
                level_offset: 1,
            },
        )
        .unwrap();
        let model = Model::new(
            vec![
                Component::new(root(5, 3, 3), vec![part], 0.0),
                Component::new(root(4, 4, 3), vec![], 0.0),
            ],
            0.0,
            Projection::truncating(3, 2).unwrap(),
        )
        .unwrap();
        let dims = model.max_filter_dims();
        assert_eq!((dims.width, dims.height), (5, 7));
        assert_eq!(model.components()[0].max_level_offset(), 1);
    }

    #[test]
    fn compressed_root_uses_projection() {
        let projection = Projection::new(2, 1, vec![1.0, 1.0]).unwrap();
        let filter = Filter::new(1, 1, 2, vec![2.0, 3.0]).unwrap();
        let model = Model::new(vec![Component::new(filter, vec![], 0.0)], 0.0, projection).unwrap();
        let compressed = model.compressed_root(0).unwrap();
        assert_eq!(compressed.num_features(), 1);
        assert!((compressed.weights()[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_zero_level_offset() {
        let part = Filter::part(
            1,
            1,
            2,
            vec![0.0; 2],
            DeformationCost::default(),
            Anchor::default(),
        )
        .unwrap();
        let err = Model::new(
            vec![Component::new(root(1, 1, 2), vec![part], 0.0)],
            0.0,
            Projection::truncating(2, 1).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, DpmError::InvalidModel { .. }));
    }

    #[test]
    fn deformation_cost_is_separable() {
        let cost = DeformationCost([0.5, 1.0, -0.25, 2.0]);
        assert!((cost.cost(2.0, -1.0) - (0.5 * 2.0 + 4.0 + 0.25 + 2.0)).abs() < 1e-6);
    }
}
