//! Area-averaging resampling into `f32` buffers.
//!
//! Each destination sample averages the source samples its footprint covers,
//! weighting partially covered samples by the covered fraction. The filter is
//! separable: rows are resampled first, then columns.

use crate::image::ImageView;

/// Owned interleaved `f32` image produced by resampling.
pub(crate) struct FloatImage {
    data: Vec<f32>,
    width: usize,
    height: usize,
    channels: usize,
}

impl FloatImage {
    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn height(&self) -> usize {
        self.height
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the sample at `(x, y)` for channel `c`. Callers keep indices in range.
    #[inline]
    pub(crate) fn at(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[(y * self.width + x) * self.channels + c]
    }
}

type Taps = Vec<(usize, f32)>;

fn area_taps(src_len: usize, dst_len: usize) -> Vec<Taps> {
    let scale = src_len as f32 / dst_len as f32;
    (0..dst_len)
        .map(|o| {
            let start = o as f32 * scale;
            let end = start + scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len);
            let mut taps = Vec::with_capacity(last.saturating_sub(first));
            for s in first..last {
                let covered = end.min(s as f32 + 1.0) - start.max(s as f32);
                if covered > 0.0 {
                    taps.push((s, covered / scale));
                }
            }
            if taps.is_empty() {
                taps.push((first.min(src_len - 1), 1.0));
            }
            taps
        })
        .collect()
}

/// Resamples `src` to `dst_width x dst_height` with an area filter.
///
/// Both destination dimensions must be non-zero.
pub(crate) fn resample_area(src: ImageView<'_>, dst_width: usize, dst_height: usize) -> FloatImage {
    let channels = src.channels();
    let src_height = src.height();
    let x_taps = area_taps(src.width(), dst_width);
    let y_taps = area_taps(src_height, dst_height);

    let mut horizontal = vec![0.0f32; src_height * dst_width * channels];
    for y in 0..src_height {
        let Some(row) = src.row(y) else { continue };
        let out_row = &mut horizontal[y * dst_width * channels..(y + 1) * dst_width * channels];
        for (ox, taps) in x_taps.iter().enumerate() {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for &(sx, w) in taps {
                    acc += w * f32::from(row[sx * channels + c]);
                }
                out_row[ox * channels + c] = acc;
            }
        }
    }

    let row_len = dst_width * channels;
    let mut data = vec![0.0f32; dst_height * row_len];
    for (oy, taps) in y_taps.iter().enumerate() {
        let out_row = &mut data[oy * row_len..(oy + 1) * row_len];
        for &(sy, w) in taps {
            let src_row = &horizontal[sy * row_len..(sy + 1) * row_len];
            for (dst, &value) in out_row.iter_mut().zip(src_row) {
                *dst += w * value;
            }
        }
    }

    FloatImage {
        data,
        width: dst_width,
        height: dst_height,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::{area_taps, resample_area};
    use crate::image::ImageView;

    #[test]
    fn area_taps_sum_to_one() {
        for (src, dst) in [(10, 7), (9, 9), (100, 13), (5, 1)] {
            for taps in area_taps(src, dst) {
                let total: f32 = taps.iter().map(|&(_, w)| w).sum();
                assert!((total - 1.0).abs() < 1e-4, "{src}->{dst}: {total}");
            }
        }
    }

    #[test]
    fn identity_size_copies_samples() {
        let data: Vec<u8> = (0u8..12).collect();
        let view = ImageView::from_slice(&data, 2, 2, 3).unwrap();
        let out = resample_area(view, 2, 2);
        assert_eq!(out.width(), 2);
        assert_eq!(out.channels(), 3);
        assert!((out.at(1, 1, 2) - 11.0).abs() < 1e-5);
        assert!((out.at(0, 1, 0) - 6.0).abs() < 1e-5);
    }

    #[test]
    fn halving_averages_two_by_two_blocks() {
        let data = [0u8, 4, 8, 12, 0, 4, 8, 12];
        let view = ImageView::from_slice(&data, 4, 2, 1).unwrap();
        let out = resample_area(view, 2, 1);
        assert!((out.at(0, 0, 0) - 2.0).abs() < 1e-5);
        assert!((out.at(1, 0, 0) - 10.0).abs() < 1e-5);
    }
}
