//! Feature extraction: HOG cell maps and the padded multiscale pyramid.

pub(crate) mod hog;
pub mod map;
pub mod pyramid;

pub use hog::HOG_FEATURES;
pub use map::FeatureMap;
pub use pyramid::{
    border_for, CompressedPyramid, FeaturePyramid, PyramidBuilder, PyramidConfig, PyramidLevel,
    PYRAMID_FEATURES,
};
