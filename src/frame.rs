//! The assembled raster.
//!
//! [`Framebuffer`] is one contiguous, row-major, component-interleaved
//! allocation of `width * height * channels` bytes. The assembly driver
//! owns and fills it; on success it is handed whole to the caller, who
//! can take the raw bytes or convert to a typed [`ImgVec`].

use alloc::vec::Vec;
use core::fmt;

use imgref::ImgVec;
use rgb::{Gray, Rgb};

use crate::mcu::PixelFormat;

/// Errors from [`Framebuffer`] allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum FrameAllocError {
    /// Width or height is zero or the byte size overflows `usize`.
    InvalidDimensions,
    /// The allocator could not provide the raster.
    OutOfMemory {
        /// Byte size of the failed request.
        bytes: usize,
    },
}

impl fmt::Display for FrameAllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions => write!(f, "width or height is zero or causes overflow"),
            Self::OutOfMemory { bytes } => write!(f, "failed to allocate {bytes} byte raster"),
        }
    }
}

impl core::error::Error for FrameAllocError {}

/// Owned raster with format metadata.
///
/// Byte offset of a sample: `row * row_pitch + col * channels + channel`,
/// with `row_pitch = width * channels`. Rows are tightly packed.
pub struct Framebuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Framebuffer {
    /// Allocate a zero-filled raster for the given dimensions and format.
    ///
    /// # Errors
    ///
    /// [`FrameAllocError::InvalidDimensions`] if either dimension is zero
    /// or the byte size overflows; [`FrameAllocError::OutOfMemory`] if the
    /// allocator refuses the request.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, FrameAllocError> {
        if width == 0 || height == 0 {
            return Err(FrameAllocError::InvalidDimensions);
        }
        let total = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.channels()))
            .ok_or(FrameAllocError::InvalidDimensions)?;
        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| FrameAllocError::OutOfMemory { bytes: total })?;
        data.resize(total, 0);
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row (`width * channels`).
    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.width as usize * self.format.channels()
    }

    /// The full raster, row-major, component-interleaved.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel bytes for row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let pitch = self.row_pitch();
        let start = y as usize * pitch;
        &self.data[start..start + pitch]
    }

    /// Mutable pixel bytes for row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let pitch = self.row_pitch();
        let start = y as usize * pitch;
        &mut self.data[start..start + pitch]
    }

    /// Consume the raster and return the backing `Vec<u8>`.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Convert to a typed grayscale image, or `None` for color rasters.
    pub fn into_gray8(self) -> Option<ImgVec<Gray<u8>>> {
        match self.format {
            PixelFormat::Gray8 => {
                let (w, h) = (self.width as usize, self.height as usize);
                let pixels: Vec<Gray<u8>> = self.data.into_iter().map(Gray).collect();
                Some(ImgVec::new(pixels, w, h))
            }
            PixelFormat::Rgb8 => None,
        }
    }

    /// Convert to a typed RGB image, or `None` for grayscale rasters.
    pub fn into_rgb8(self) -> Option<ImgVec<Rgb<u8>>> {
        match self.format {
            PixelFormat::Rgb8 => {
                let (w, h) = (self.width as usize, self.height as usize);
                let pixels: Vec<Rgb<u8>> = self
                    .data
                    .chunks_exact(3)
                    .map(|p| Rgb {
                        r: p[0],
                        g: p[1],
                        b: p[2],
                    })
                    .collect();
                Some(ImgVec::new(pixels, w, h))
            }
            PixelFormat::Gray8 => None,
        }
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Framebuffer({}x{}, {:?})",
            self.width, self.height, self.format
        )
    }
}
