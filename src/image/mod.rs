//! Image views and resampling.
//!
//! `ImageView` is a borrowed 2D view into an interleaved `u8` buffer. Each
//! pixel holds `channels` consecutive samples and `stride` counts elements
//! between the starts of consecutive rows, so a stride larger than
//! `width * channels` represents padded rows.

use crate::util::{DpmError, DpmResult};

#[cfg(feature = "image-io")]
pub mod io;
pub(crate) mod resample;

/// Borrowed interleaved image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    channels: usize,
    stride: usize,
}

impl<'a> ImageView<'a> {
    /// Creates a contiguous view with `stride == width * channels`.
    pub fn from_slice(
        data: &'a [u8],
        width: usize,
        height: usize,
        channels: usize,
    ) -> DpmResult<Self> {
        let row_len = width
            .checked_mul(channels)
            .ok_or(DpmError::InvalidDimensions { width, height })?;
        Self::new(data, width, height, channels, row_len)
    }

    /// Creates a view with an explicit stride in elements.
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        channels: usize,
        stride: usize,
    ) -> DpmResult<Self> {
        if channels == 0 {
            return Err(DpmError::InvalidInput("image must have at least one channel"));
        }
        let needed = required_len(width, height, channels, stride)?;
        if data.len() < needed {
            return Err(DpmError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the samples of pixel `(x, y)` if it is within bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&'a [u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = y
            .checked_mul(self.stride)?
            .checked_add(x.checked_mul(self.channels)?)?;
        self.data.get(start..start + self.channels)
    }

    /// Returns row `y` as `width * channels` interleaved samples.
    pub fn row(&self, y: usize) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width * self.channels)?;
        self.data.get(start..end)
    }
}

/// Owned contiguous interleaved image buffer.
#[derive(Clone, Debug)]
pub struct OwnedImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

impl OwnedImage {
    /// Wraps a contiguous buffer of exactly `width * height * channels` samples.
    pub fn new(data: Vec<u8>, width: usize, height: usize, channels: usize) -> DpmResult<Self> {
        if channels == 0 {
            return Err(DpmError::InvalidInput("image must have at least one channel"));
        }
        let row_len = width
            .checked_mul(channels)
            .ok_or(DpmError::InvalidDimensions { width, height })?;
        let needed = required_len(width, height, channels, row_len)?;
        if data.len() < needed {
            return Err(DpmError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(DpmError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            channels: self.channels,
            stride: self.width * self.channels,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the raw interleaved samples.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn required_len(width: usize, height: usize, channels: usize, stride: usize) -> DpmResult<usize> {
    if width == 0 || height == 0 {
        return Err(DpmError::InvalidDimensions { width, height });
    }
    let row_len = width
        .checked_mul(channels)
        .ok_or(DpmError::InvalidDimensions { width, height })?;
    if stride < row_len {
        return Err(DpmError::InvalidStride { row_len, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(row_len))
        .ok_or(DpmError::InvalidDimensions { width, height })
}
