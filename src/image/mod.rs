//! Image views and pixel-level primitives.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit
//! stride. The stride counts elements between the starts of consecutive
//! rows, so a stride larger than the width represents padded rows. The
//! picker's working pixel type is `f32`; the view stays generic so masks
//! and index maps can share the machinery.

use crate::util::{PickError, PickResult};

pub mod ops;

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> PickResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> PickResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(PickError::DimensionMismatch {
                expected: needed,
                got: data.len(),
                context: "image buffer",
            });
        }
        Ok(Self {
            data,
            width,
            height,
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

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }
}

impl<'a, T: Copy> ImageView<'a, T> {
    /// Copies the viewed pixels into a contiguous row-major vector.
    pub fn to_contiguous(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let start = y * self.stride;
            out.extend_from_slice(&self.data[start..start + self.width]);
        }
        out
    }
}

/// Owned contiguous row-major image.
#[derive(Clone)]
pub struct OwnedImage<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> OwnedImage<T> {
    /// Creates an owned image from a contiguous buffer.
    pub fn new(data: Vec<T>, width: usize, height: usize) -> PickResult<Self> {
        let needed = required_len(width, height, width)?;
        if data.len() != needed {
            return Err(PickError::DimensionMismatch {
                expected: needed,
                got: data.len(),
                context: "owned image buffer",
            });
        }
        Ok(Self {
            data,
            width,
            height,
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

    /// Returns the backing pixels in row-major order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Returns the backing pixels mutably.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> PickResult<usize> {
    if width == 0 || height == 0 {
        return Err(PickError::InvalidParameter(
            "image dimensions must be non-zero",
        ));
    }
    if stride < width {
        return Err(PickError::InvalidParameter(
            "image stride must be at least the width",
        ));
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(PickError::ResourceExhausted(
            "image dimensions overflow addressable size",
        ))
}
