//! Greedy non-maximum suppression by minimum-area overlap.
//!
//! Boxes are visited by descending score and kept unless they overlap an
//! already kept box by more than the threshold. Overlap is measured against
//! the smaller box, so a box contained in a kept box is always suppressed.

use crate::candidate::{BoundingBox, Candidate};
use crate::trace::{trace_event, trace_span};
use crate::util::{DpmError, DpmResult};

fn validate_threshold(overlap_threshold: f32) -> DpmResult<()> {
    if overlap_threshold > 0.0 && overlap_threshold <= 1.0 {
        Ok(())
    } else {
        Err(DpmError::InvalidInput("overlap threshold must be in (0, 1]"))
    }
}

/// Returns `true` if a box overlapping a kept one by `ratio` is dropped.
#[inline]
fn suppresses(ratio: f32, overlap_threshold: f32) -> bool {
    ratio > overlap_threshold || ratio >= 1.0
}

/// Runs suppression and returns the kept indices in acceptance order.
///
/// Ties in score keep their input order.
pub fn suppress_indices(
    boxes: &[BoundingBox],
    scores: &[f32],
    overlap_threshold: f32,
) -> DpmResult<Vec<usize>> {
    validate_threshold(overlap_threshold)?;
    if boxes.len() != scores.len() {
        return Err(DpmError::InvalidInput("boxes and scores differ in length"));
    }

    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut kept: Vec<usize> = Vec::new();
    'outer: for idx in order {
        for &k in &kept {
            if suppresses(boxes[idx].overlap_ratio(&boxes[k]), overlap_threshold) {
                continue 'outer;
            }
        }
        kept.push(idx);
    }
    Ok(kept)
}

/// Suppresses overlapping candidates, highest score first.
pub fn suppress(candidates: Vec<Candidate>, overlap_threshold: f32) -> DpmResult<Vec<Candidate>> {
    let _span = trace_span!("suppress", candidates = candidates.len()).entered();

    let boxes: Vec<BoundingBox> = candidates.iter().map(|c| c.bbox).collect();
    let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
    let kept = suppress_indices(&boxes, &scores, overlap_threshold)?;

    let before = candidates.len();
    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let out: Vec<Candidate> = kept.iter().filter_map(|&i| slots[i].take()).collect();

    trace_event!("suppressed", before = before, after = out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{suppress_indices, suppresses};
    use crate::candidate::BoundingBox;
    use crate::util::DpmError;

    #[test]
    fn containment_suppresses_at_threshold_one() {
        assert!(suppresses(1.0, 1.0));
        assert!(!suppresses(0.999, 1.0));
        assert!(!suppresses(0.5, 0.5));
        assert!(suppresses(0.51, 0.5));
    }

    #[test]
    fn keeps_highest_score_first() {
        let boxes = [
            BoundingBox::new(0, 0, 9, 9),
            BoundingBox::new(1, 1, 10, 10),
            BoundingBox::new(50, 50, 59, 59),
        ];
        let kept = suppress_indices(&boxes, &[0.5, 0.9, 0.1], 0.5).unwrap();
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn rejects_bad_threshold_and_length_mismatch() {
        let boxes = [BoundingBox::new(0, 0, 1, 1)];
        for t in [0.0, -0.1, 1.5, f32::NAN] {
            assert!(matches!(
                suppress_indices(&boxes, &[1.0], t),
                Err(DpmError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            suppress_indices(&boxes, &[], 0.5),
            Err(DpmError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_input_is_ok() {
        assert_eq!(suppress_indices(&[], &[], 0.3).unwrap(), Vec::<usize>::new());
    }
}
