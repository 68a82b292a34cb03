//! Convenience helpers for loading images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::{ImageView, OwnedImage};
use crate::util::{DpmError, DpmResult};
use std::path::Path;

/// Creates a borrowed view from an RGB image buffer.
pub fn view_from_rgb_image(img: &image::RgbImage) -> DpmResult<ImageView<'_>> {
    ImageView::from_slice(img.as_raw(), img.width() as usize, img.height() as usize, 3)
}

/// Creates an owned image from a dynamic image.
///
/// Grayscale sources stay single-channel; everything else becomes RGB.
pub fn owned_from_dynamic_image(img: &image::DynamicImage) -> DpmResult<OwnedImage> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    match img {
        image::DynamicImage::ImageLuma8(gray) => OwnedImage::new(gray.as_raw().clone(), width, height, 1),
        other => OwnedImage::new(other.to_rgb8().into_raw(), width, height, 3),
    }
}

/// Loads an image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> DpmResult<OwnedImage> {
    let img = image::open(path).map_err(|err| DpmError::ImageIo {
        reason: err.to_string(),
    })?;
    owned_from_dynamic_image(&img)
}
