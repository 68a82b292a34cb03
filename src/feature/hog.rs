//! Cell-based histogram-of-gradients features.
//!
//! Each cell gets 31 features: 18 contrast-sensitive orientation bins, 9
//! contrast-insensitive bins and 4 gradient-energy terms, one per
//! normalisation block. Gradients come from the channel with the largest
//! magnitude. Pixels vote bilinearly into the 4 nearest cells. Each histogram
//! is normalised against the 4 surrounding 2x2 blocks and truncated at 0.2.
//! The outer ring of cells has an incomplete neighbourhood and is dropped, so
//! output cell `(x, y)` describes histogram block `(x + 1, y + 1)`.

use crate::feature::FeatureMap;
use crate::image::resample::FloatImage;

/// Number of HOG channels per cell, excluding the truncation channel.
pub const HOG_FEATURES: usize = 31;

const ORIENTATIONS: usize = 9;
const SIGNED_BINS: usize = 2 * ORIENTATIONS;
const EPS: f32 = 1e-4;
const TRUNCATE: f32 = 0.2;
const ENERGY_SCALE: f32 = 0.2357;

const UU: [f32; ORIENTATIONS] = [
    1.0000, 0.9397, 0.7660, 0.5000, 0.1736, -0.1736, -0.5000, -0.7660, -0.9397,
];
const VV: [f32; ORIENTATIONS] = [
    0.0000, 0.3420, 0.6428, 0.8660, 0.9848, 0.9848, 0.8660, 0.6428, 0.3420,
];

/// Number of output cells along one axis for `len` pixels and `sbin`-pixel cells.
pub(crate) fn hog_cells(len: usize, sbin: usize) -> usize {
    let blocks = (len as f32 / sbin as f32).round() as usize;
    blocks.saturating_sub(2)
}

/// Computes HOG cell features, or `None` if the image yields no full cell.
pub(crate) fn compute_hog(image: &FloatImage, sbin: usize) -> Option<FeatureMap> {
    let width = image.width();
    let height = image.height();
    let out_x = hog_cells(width, sbin);
    let out_y = hog_cells(height, sbin);
    if out_x == 0 || out_y == 0 || width < 3 || height < 3 {
        return None;
    }
    let blocks_x = out_x + 2;
    let blocks_y = out_y + 2;

    let hist = orientation_histogram(image, sbin, blocks_x, blocks_y);

    let mut norm = vec![0.0f32; blocks_x * blocks_y];
    for (n, bins) in norm.iter_mut().zip(hist.chunks_exact(SIGNED_BINS)) {
        *n = (0..ORIENTATIONS)
            .map(|o| {
                let folded = bins[o] + bins[o + ORIENTATIONS];
                folded * folded
            })
            .sum();
    }
    let norm_at = |bx: usize, by: usize| norm[by * blocks_x + bx];
    let inv_block = |bx: usize, by: usize| {
        1.0 / (norm_at(bx, by) + norm_at(bx + 1, by) + norm_at(bx, by + 1) + norm_at(bx + 1, by + 1) + EPS)
            .sqrt()
    };

    let mut map = FeatureMap::zeros(out_x, out_y, HOG_FEATURES).ok()?;
    for y in 0..out_y {
        for x in 0..out_x {
            let n = [
                inv_block(x + 1, y + 1),
                inv_block(x + 1, y),
                inv_block(x, y + 1),
                inv_block(x, y),
            ];
            let bins = &hist[((y + 1) * blocks_x + x + 1) * SIGNED_BINS..][..SIGNED_BINS];
            let feat = map.cell_mut(x, y);
            let mut energy = [0.0f32; 4];

            for o in 0..SIGNED_BINS {
                let mut acc = 0.0f32;
                for (k, &nk) in n.iter().enumerate() {
                    let h = (bins[o] * nk).min(TRUNCATE);
                    acc += h;
                    energy[k] += h;
                }
                feat[o] = 0.5 * acc;
            }
            for o in 0..ORIENTATIONS {
                let folded = bins[o] + bins[o + ORIENTATIONS];
                let acc: f32 = n.iter().map(|&nk| (folded * nk).min(TRUNCATE)).sum();
                feat[SIGNED_BINS + o] = 0.5 * acc;
            }
            for (k, e) in energy.iter().enumerate() {
                feat[SIGNED_BINS + ORIENTATIONS + k] = ENERGY_SCALE * e;
            }
        }
    }
    Some(map)
}

fn orientation_histogram(
    image: &FloatImage,
    sbin: usize,
    blocks_x: usize,
    blocks_y: usize,
) -> Vec<f32> {
    let width = image.width();
    let height = image.height();
    let channels = image.channels();
    let visible_x = blocks_x * sbin;
    let visible_y = blocks_y * sbin;
    let sbin_f = sbin as f32;
    let mut hist = vec![0.0f32; blocks_x * blocks_y * SIGNED_BINS];

    for y in 1..visible_y.saturating_sub(1) {
        let cy = y.min(height - 2);
        for x in 1..visible_x.saturating_sub(1) {
            let cx = x.min(width - 2);

            let mut best = (0.0f32, 0.0f32, -1.0f32);
            for c in 0..channels {
                let dx = image.at(cx + 1, cy, c) - image.at(cx - 1, cy, c);
                let dy = image.at(cx, cy + 1, c) - image.at(cx, cy - 1, c);
                let mag = dx * dx + dy * dy;
                if mag > best.2 {
                    best = (dx, dy, mag);
                }
            }
            let (dx, dy, mag) = best;

            let mut best_dot = 0.0f32;
            let mut best_o = 0usize;
            for o in 0..ORIENTATIONS {
                let dot = UU[o] * dx + VV[o] * dy;
                if dot > best_dot {
                    best_dot = dot;
                    best_o = o;
                } else if -dot > best_dot {
                    best_dot = -dot;
                    best_o = o + ORIENTATIONS;
                }
            }

            let v = mag.sqrt();
            let xp = (x as f32 + 0.5) / sbin_f - 0.5;
            let yp = (y as f32 + 0.5) / sbin_f - 0.5;
            let ixp = xp.floor() as isize;
            let iyp = yp.floor() as isize;
            let vx0 = xp - ixp as f32;
            let vy0 = yp - iyp as f32;
            let vx1 = 1.0 - vx0;
            let vy1 = 1.0 - vy0;

            let mut vote = |bx: isize, by: isize, w: f32| {
                if bx >= 0 && by >= 0 && (bx as usize) < blocks_x && (by as usize) < blocks_y {
                    hist[(by as usize * blocks_x + bx as usize) * SIGNED_BINS + best_o] += w * v;
                }
            };
            vote(ixp, iyp, vx1 * vy1);
            vote(ixp + 1, iyp, vx0 * vy1);
            vote(ixp, iyp + 1, vx1 * vy0);
            vote(ixp + 1, iyp + 1, vx0 * vy0);
        }
    }
    hist
}
