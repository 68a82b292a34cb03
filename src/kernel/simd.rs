//! SIMD dot product using the `wide` crate.
//!
//! Eight features are multiplied per step with `f32x8`; the tail is summed
//! with scalar code.

use crate::kernel::Kernel;
use wide::f32x8;

const LANES: usize = 8;

#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

#[inline]
fn hsum(v: f32x8) -> f32 {
    let arr = v.to_array();
    arr[0] + arr[1] + arr[2] + arr[3] + arr[4] + arr[5] + arr[6] + arr[7]
}

/// `f32x8` dot product kernel.
pub struct SimdKernel;

impl Kernel for SimdKernel {
    #[inline]
    fn dot(a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        let simd_end = len / LANES * LANES;

        let mut acc = f32x8::ZERO;
        let mut i = 0;
        while i < simd_end {
            acc += load_f32x8(&a[i..]) * load_f32x8(&b[i..]);
            i += LANES;
        }

        let mut tail = 0.0f32;
        while i < len {
            tail += a[i] * b[i];
            i += 1;
        }
        hsum(acc) + tail
    }
}

#[cfg(test)]
mod tests {
    use super::SimdKernel;
    use crate::kernel::scalar::ScalarKernel;
    use crate::kernel::Kernel;

    #[test]
    fn matches_scalar_with_tail() {
        let a: Vec<f32> = (0..21).map(|v| v as f32 * 0.5 - 3.0).collect();
        let b: Vec<f32> = (0..21).map(|v| (v % 5) as f32 - 1.5).collect();
        let simd = SimdKernel::dot(&a, &b);
        let scalar = ScalarKernel::dot(&a, &b);
        assert!((simd - scalar).abs() < 1e-4);
    }
}
