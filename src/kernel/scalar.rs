//! Scalar reference kernel.

use crate::kernel::Kernel;

/// Plain sequential dot product.
pub struct ScalarKernel;

impl Kernel for ScalarKernel {
    #[inline]
    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }
}
