//! Low-level building blocks for custom detection pipelines.
//!
//! These expose the correlation kernels, dense response maps, the bounded
//! distance transform and the root score estimators used by `Matcher`. Most
//! users should prefer `Detector` or `MultiClassDetector`.

pub use crate::candidate::nms::suppress_indices;
pub use crate::feature::border_for;
pub use crate::kernel::scalar::ScalarKernel;
#[cfg(feature = "simd")]
pub use crate::kernel::simd::SimdKernel;
pub use crate::kernel::{response_at, response_map, DefaultKernel, Kernel, ResponseMap};
pub use crate::search::deform::{distance_transform, DeformedResponse};
pub use crate::search::estimator::{CompressedEstimator, ExactEstimator, ScoreEstimator};
