//! Placement scan for one component at one root level.

use crate::candidate::{BoundingBox, Candidate};
use crate::feature::{CompressedPyramid, FeatureMap, FeaturePyramid, PyramidLevel};
use crate::kernel::{placements, response_map, DefaultKernel, ResponseMap};
use crate::model::{Filter, Model};
use crate::search::deform::{distance_transform, DeformedResponse};
use crate::search::estimator::{CompressedEstimator, ExactEstimator, ScoreEstimator};
use crate::search::MatchConfig;
use crate::trace::{trace_event, trace_span};
use crate::util::math::{floor_i32, round_isize};

/// Deformed responses of one part on its level.
struct PartField<'a> {
    filter: &'a Filter,
    level: &'a PyramidLevel,
    deformed: DeformedResponse,
    /// Part-level cells per root-level cell.
    ratio: f32,
}

/// Placement of one part at its optimal displacement.
#[derive(Clone, Copy)]
struct PartPlacement {
    x: isize,
    y: isize,
    score: f32,
}

/// Root level geometry and acceptance rule for one scan.
struct ScanGeometry<'a> {
    level: &'a PyramidLevel,
    root: &'a Filter,
    pad_x: usize,
    pad_y: usize,
    bias: f32,
    threshold: f32,
}

/// Image-space box of a `size_x x size_y` window at padded cell `(x, y)`.
pub(crate) fn window_box(
    level: &PyramidLevel,
    x: isize,
    y: isize,
    size_x: usize,
    size_y: usize,
    pad_x: usize,
    pad_y: usize,
) -> BoundingBox {
    let cell = level.cell_size();
    let origin = level.origin();
    let ux = (x - pad_x as isize) as f32;
    let uy = (y - pad_y as isize) as f32;
    BoundingBox {
        left: floor_i32(origin + ux * cell),
        top: floor_i32(origin + uy * cell),
        right: floor_i32(origin + (ux + size_x as f32) * cell).saturating_sub(1),
        bottom: floor_i32(origin + (uy + size_y as f32) * cell).saturating_sub(1),
    }
}

fn part_responses(map: &FeatureMap, filter: &Filter, parallel: bool) -> ResponseMap {
    #[cfg(feature = "rayon")]
    if parallel {
        return crate::kernel::rayon::response_map_par::<DefaultKernel>(map, filter);
    }
    #[cfg(not(feature = "rayon"))]
    let _ = parallel;
    response_map::<DefaultKernel>(map, filter)
}

/// Anchor cell of a part on its level for root coordinate `x`.
fn anchor_position(x: usize, pad: usize, ratio: f32, anchor: i32) -> Option<usize> {
    let unpadded = x as f32 - pad as f32;
    let pos = round_isize(unpadded * ratio) + anchor as isize + pad as isize;
    usize::try_from(pos).ok()
}

/// Places every part for root placement `(x, y)`, or `None` if an anchor
/// falls outside its part response map.
fn place_parts(
    parts: &[PartField<'_>],
    x: usize,
    y: usize,
    pad_x: usize,
    pad_y: usize,
    out: &mut Vec<PartPlacement>,
) -> Option<()> {
    out.clear();
    for part in parts {
        let anchor = part.filter.anchor();
        let ax = anchor_position(x, pad_x, part.ratio, anchor.x)?;
        let ay = anchor_position(y, pad_y, part.ratio, anchor.y)?;
        let (score, (dx, dy)) = part.deformed.get(ax, ay)?;
        out.push(PartPlacement {
            x: ax as isize + dx as isize,
            y: ay as isize + dy as isize,
            score,
        });
    }
    Some(())
}

/// Scores every root placement and emits candidates above the threshold.
///
/// When `prefilter` is given as `(estimator, floor)`, placements whose
/// estimate plus bias falls below `floor` are skipped before the exact root
/// response and the parts are evaluated.
fn scan_placements<E, P>(
    exact: &E,
    prefilter: Option<(&P, f32)>,
    parts: &[PartField<'_>],
    geometry: &ScanGeometry<'_>,
    component: usize,
    level: usize,
) -> Vec<Candidate>
where
    E: ScoreEstimator,
    P: ScoreEstimator,
{
    let Some((count_x, count_y)) = placements(geometry.level.map(), geometry.root) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut placed = Vec::with_capacity(parts.len());
    for y in 0..count_y {
        for x in 0..count_x {
            if let Some((estimator, floor)) = prefilter {
                if estimator.estimate(x, y) + geometry.bias < floor {
                    continue;
                }
            }
            if place_parts(parts, x, y, geometry.pad_x, geometry.pad_y, &mut placed).is_none() {
                continue;
            }

            let score = exact.estimate(x, y)
                + placed.iter().map(|p| p.score).sum::<f32>()
                + geometry.bias;
            if score <= geometry.threshold || score.is_nan() {
                continue;
            }

            let bbox = window_box(
                geometry.level,
                x as isize,
                y as isize,
                geometry.root.size_x(),
                geometry.root.size_y(),
                geometry.pad_x,
                geometry.pad_y,
            );
            let part_boxes = parts
                .iter()
                .zip(&placed)
                .map(|(part, p)| {
                    window_box(
                        part.level,
                        p.x,
                        p.y,
                        part.filter.size_x(),
                        part.filter.size_y(),
                        geometry.pad_x,
                        geometry.pad_y,
                    )
                })
                .collect();
            out.push(Candidate {
                bbox,
                score,
                component,
                level,
                parts: part_boxes,
            });
        }
    }
    out
}

/// Evaluates component `component` with its root at pyramid level `level`.
///
/// The caller has checked that the component fits the pyramid and that
/// `level` is at least the component's largest part level offset.
pub(crate) fn scan_component_level(
    model: &Model,
    component: usize,
    pyramid: &FeaturePyramid,
    compressed: &CompressedPyramid,
    level: usize,
    cfg: &MatchConfig,
) -> Vec<Candidate> {
    let comp = &model.components()[component];
    let (Some(root_level), Some(compressed_level), Some(compressed_root)) = (
        pyramid.level(level),
        compressed.level(level),
        model.compressed_root(component),
    ) else {
        return Vec::new();
    };

    let _span = trace_span!("search_level", component = component, level = level).entered();

    let mut parts = Vec::with_capacity(comp.parts.len());
    for filter in &comp.parts {
        let Some(part_level) = level
            .checked_sub(filter.anchor().level_offset)
            .and_then(|idx| pyramid.level(idx))
        else {
            return Vec::new();
        };
        let responses = part_responses(part_level.map(), filter, cfg.parallel);
        parts.push(PartField {
            filter,
            level: part_level,
            deformed: distance_transform(&responses, filter.deformation(), cfg.max_part_displacement),
            ratio: root_level.cell_size() / part_level.cell_size(),
        });
    }

    let geometry = ScanGeometry {
        level: root_level,
        root: &comp.root,
        pad_x: pyramid.pad_x(),
        pad_y: pyramid.pad_y(),
        bias: comp.bias,
        threshold: model.score_threshold(),
    };
    let exact = ExactEstimator::new(root_level.map(), &comp.root);
    let estimator = CompressedEstimator::new(compressed_level.map(), compressed_root);
    // The floor leaves room for the best any part can contribute, so only the
    // compressed root's approximation error is covered by the slack.
    let part_bound: f32 = parts.iter().map(|p| p.deformed.max_score()).sum();
    let prefilter = cfg.prefilter_slack.is_finite().then(|| {
        (
            &estimator,
            model.score_threshold() - cfg.prefilter_slack - part_bound,
        )
    });

    let out = scan_placements(&exact, prefilter, &parts, &geometry, component, level);
    trace_event!("level_candidates", count = out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::{anchor_position, window_box};
    use crate::candidate::BoundingBox;
    use crate::feature::{FeatureMap, PyramidLevel};

    #[test]
    fn window_box_maps_padded_cells_to_pixels() {
        let level = PyramidLevel::new(FeatureMap::zeros(10, 10, 1).unwrap(), 8.0, 8.0).unwrap();
        let b = window_box(&level, 3, 2, 2, 3, 2, 2);
        assert_eq!(b, BoundingBox::new(16, 8, 31, 31));
        let padded = window_box(&level, 0, 0, 1, 1, 2, 2);
        assert_eq!(padded, BoundingBox::new(-8, -8, -1, -1));
    }

    #[test]
    fn anchor_scales_unpadded_root_position() {
        assert_eq!(anchor_position(5, 3, 2.0, 1), Some(8));
        assert_eq!(anchor_position(0, 3, 2.0, 0), None);
        assert_eq!(anchor_position(3, 3, 2.0, -1), Some(2));
    }
}
