//! dpmatch is a CPU-first deformable part model detector.
//!
//! Images are turned into a padded HOG feature pyramid plus a PCA-compressed
//! copy of it. Each model component is matched with a root filter, prefiltered
//! in the compressed space, and part filters that may shift under a quadratic
//! deformation cost. Overlapping results are pruned with min-area NMS.
//!
//! Parallelism is available through the `rayon` feature and a SIMD dot
//! product through `simd`.
//!
//! ```no_run
//! use dpmatch::{Detector, ImageView, Model, DEFAULT_OVERLAP_THRESHOLD};
//!
//! # fn run(model: &Model, pixels: &[u8]) -> dpmatch::DpmResult<()> {
//! let image = ImageView::from_slice(pixels, 640, 480, 3)?;
//! let detections = Detector::default().detect(image, model, DEFAULT_OVERLAP_THRESHOLD)?;
//! for det in &detections {
//!     println!("{:?} {}", det.bbox, det.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod candidate;
pub mod detector;
pub mod feature;
pub mod image;
pub mod kernel;
pub mod lowlevel;
pub mod model;
pub mod search;
mod trace;
pub mod util;

pub use candidate::nms::suppress;
pub use candidate::{BoundingBox, Candidate};
pub use detector::{
    ClassModel, Detection, Detector, MultiClassDetector, SkippedModel, DEFAULT_OVERLAP_THRESHOLD,
};
pub use feature::{
    CompressedPyramid, FeatureMap, FeaturePyramid, PyramidBuilder, PyramidConfig, PyramidLevel,
    HOG_FEATURES, PYRAMID_FEATURES,
};
pub use image::{ImageView, OwnedImage};
#[cfg(feature = "json")]
pub use model::json::{load_model_json, model_to_json, parse_model_json, JsonModelFile};
pub use model::source::{default_class_name, LoadFn, ModelSource};
pub use model::{Anchor, Component, DeformationCost, Filter, FilterDims, Model, Projection};
pub use search::{MatchConfig, Matcher, SearchReport};
pub use util::{DpmError, DpmResult};
