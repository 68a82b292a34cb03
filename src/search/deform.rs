//! Bounded distance transform of part responses.
//!
//! For every placement `p` of a part response map this computes
//! `max_d response(p + d) - cost(d)` over `|dx|, |dy| <= max_displacement`
//! and records the maximising displacement. The cost is separable, so the
//! maximum is taken along rows first and then along columns.
//!
//! Candidate displacements are visited as `0, -1, +1, -2, +2, ...` and only
//! a strictly better score replaces the current best, so ties resolve to the
//! smallest `|d|` and then to the negative displacement.

use crate::kernel::ResponseMap;
use crate::model::DeformationCost;

/// Deformed part scores with the optimal displacement per placement.
#[derive(Clone, Debug)]
pub struct DeformedResponse {
    width: usize,
    height: usize,
    scores: Vec<f32>,
    shifts: Vec<(i32, i32)>,
}

impl DeformedResponse {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Largest deformed score over all anchors, an upper bound on what the
    /// part can add to any root placement. `-inf` when the map is empty.
    pub fn max_score(&self) -> f32 {
        self.scores.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Best deformed score and its `(dx, dy)` for anchor placement `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<(f32, (i32, i32))> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y * self.width + x;
        Some((self.scores[idx], self.shifts[idx]))
    }
}

/// Displacements in visiting order: `0, -1, +1, ..., -max, +max`.
fn displacement_order(max_displacement: usize) -> impl Iterator<Item = isize> {
    let max = max_displacement as isize;
    std::iter::once(0).chain((1..=max).flat_map(|d| [-d, d]))
}

/// Maximises `line(i + d) - cost(d)` for every `i`, writing scores and `d`.
fn transform_line(
    line: impl Fn(usize) -> f32,
    len: usize,
    max_displacement: usize,
    cost: impl Fn(f32) -> f32,
    out_score: &mut [f32],
    out_shift: &mut [i32],
) {
    for i in 0..len {
        let mut best = f32::NEG_INFINITY;
        let mut best_d = 0isize;
        for d in displacement_order(max_displacement) {
            let j = i as isize + d;
            if j < 0 || j >= len as isize {
                continue;
            }
            let score = line(j as usize) - cost(d as f32);
            if score > best {
                best = score;
                best_d = d;
            }
        }
        out_score[i] = best;
        out_shift[i] = best_d as i32;
    }
}

/// Applies the bounded separable distance transform to `responses`.
pub fn distance_transform(
    responses: &ResponseMap,
    deformation: DeformationCost,
    max_displacement: usize,
) -> DeformedResponse {
    let width = responses.width();
    let height = responses.height();
    let values = responses.values();

    let mut row_scores = vec![0.0f32; width * height];
    let mut row_shift = vec![0i32; width * height];
    for y in 0..height {
        let row = &values[y * width..(y + 1) * width];
        transform_line(
            |x| row[x],
            width,
            max_displacement,
            |dx| deformation.cost_x(dx),
            &mut row_scores[y * width..(y + 1) * width],
            &mut row_shift[y * width..(y + 1) * width],
        );
    }

    let mut scores = vec![0.0f32; width * height];
    let mut shifts = vec![(0i32, 0i32); width * height];
    let mut col_scores = vec![0.0f32; height];
    let mut col_shift = vec![0i32; height];
    for x in 0..width {
        transform_line(
            |y| row_scores[y * width + x],
            height,
            max_displacement,
            |dy| deformation.cost_y(dy),
            &mut col_scores,
            &mut col_shift,
        );
        for y in 0..height {
            let dy = col_shift[y];
            let src_y = (y as isize + dy as isize) as usize;
            let idx = y * width + x;
            scores[idx] = col_scores[y];
            shifts[idx] = (row_shift[src_y * width + x], dy);
        }
    }

    DeformedResponse {
        width,
        height,
        scores,
        shifts,
    }
}

#[cfg(test)]
mod tests {
    use super::distance_transform;
    use crate::kernel::ResponseMap;
    use crate::model::DeformationCost;

    fn brute_force(
        responses: &ResponseMap,
        cost: DeformationCost,
        max_d: i32,
        x: usize,
        y: usize,
    ) -> f32 {
        let mut best = f32::NEG_INFINITY;
        for dy in -max_d..=max_d {
            for dx in -max_d..=max_d {
                let (px, py) = (x as i32 + dx, y as i32 + dy);
                if px < 0 || py < 0 {
                    continue;
                }
                if let Some(r) = responses.get(px as usize, py as usize) {
                    best = best.max(r - cost.cost(dx as f32, dy as f32));
                }
            }
        }
        best
    }

    #[test]
    fn matches_brute_force() {
        let (w, h) = (9, 7);
        let values: Vec<f32> = (0..w * h)
            .map(|i| (((i * 37) % 17) as f32 - 8.0) * 0.25)
            .collect();
        let responses = ResponseMap::from_parts(w, h, values);
        let cost = DeformationCost([0.05, 0.1, -0.02, 0.2]);
        let deformed = distance_transform(&responses, cost, 3);
        for y in 0..h {
            for x in 0..w {
                let (score, (dx, dy)) = deformed.get(x, y).unwrap();
                let expected = brute_force(&responses, cost, 3, x, y);
                assert!((score - expected).abs() < 1e-5, "({x},{y}): {score} vs {expected}");
                assert!(dx.abs() <= 3 && dy.abs() <= 3);
                let at = responses
                    .get((x as i32 + dx) as usize, (y as i32 + dy) as usize)
                    .unwrap();
                assert!((at - cost.cost(dx as f32, dy as f32) - score).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn ties_prefer_small_then_negative_displacement() {
        let responses = ResponseMap::from_parts(5, 1, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
        let flat = distance_transform(&responses, DeformationCost::default(), 2);
        assert_eq!(flat.get(2, 0), Some((1.0, (0, 0))));

        let responses = ResponseMap::from_parts(5, 1, vec![0.0, 3.0, 0.0, 3.0, 0.0]);
        let symmetric = distance_transform(&responses, DeformationCost::default(), 2);
        assert_eq!(symmetric.get(2, 0), Some((3.0, (-1, 0))));
    }

    #[test]
    fn displacement_is_bounded() {
        let mut values = vec![0.0f32; 12];
        values[11] = 100.0;
        let responses = ResponseMap::from_parts(12, 1, values);
        let deformed = distance_transform(&responses, DeformationCost::default(), 4);
        assert_eq!(deformed.get(0, 0), Some((0.0, (0, 0))));
        assert_eq!(deformed.get(7, 0), Some((100.0, (4, 0))));
    }

    #[test]
    fn max_score_bounds_every_anchor() {
        let values: Vec<f32> = (0..20).map(|i| ((i * 7) % 11) as f32 - 5.0).collect();
        let responses = ResponseMap::from_parts(5, 4, values);
        let deformed = distance_transform(&responses, DeformationCost([0.1, 0.3, 0.0, 0.2]), 2);
        let bound = deformed.max_score();
        let mut reached = false;
        for y in 0..4 {
            for x in 0..5 {
                let (score, _) = deformed.get(x, y).unwrap();
                assert!(score <= bound);
                reached |= score == bound;
            }
        }
        assert!(reached);
    }
}
