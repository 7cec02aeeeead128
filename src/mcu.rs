//! The seam to the external block decoder.
//!
//! A block decoder owns the entropy decoding, dequantization, IDCT, and
//! chroma upsampling; this crate drives it one MCU at a time and assembles
//! the decoded blocks into a raster. [`McuDecoder`] is that seam:
//!
//! ```text
//! driver ──begin()──────────▶ decoder ──pull()──▶ ByteSupply
//!        ◀─ImageLayout──────
//!        ──next_mcu()───────▶         ──pull()──▶
//!        ◀─McuView / None───
//! ```
//!
//! [`next_mcu`](McuDecoder::next_mcu) walks the MCU grid in raster order,
//! one call per MCU; `Ok(None)` is the decoder's own "all data consumed"
//! signal and never an error. The driver trusts it even before the nominal
//! last grid position.

use core::fmt;

use crate::supply::ByteSupply;

/// Pixel span of one decoded block, per side.
pub const BLOCK_DIM: usize = 8;

/// Samples in one decoded block (`BLOCK_DIM` squared).
pub const BLOCK_SAMPLES: usize = BLOCK_DIM * BLOCK_DIM;

/// Sample format of the assembled raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelFormat {
    /// Single luminance channel.
    Gray8 = 1,
    /// Red, green, blue, interleaved.
    Rgb8 = 3,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// ImageLayout
// ---------------------------------------------------------------------------

/// Errors from [`ImageLayout`] construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LayoutError {
    /// Width or height is zero or causes overflow.
    InvalidDimensions,
    /// MCU width or height is zero or not a multiple of the block size.
    InvalidMcuGeometry,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions => write!(f, "width or height is zero or causes overflow"),
            Self::InvalidMcuGeometry => {
                write!(f, "MCU size is zero or not a multiple of the block size")
            }
        }
    }
}

impl core::error::Error for LayoutError {}

/// Image geometry reported by the decoder's initialization step.
///
/// Fixed for the lifetime of one decode: pixel dimensions, sample format,
/// the pixel span of one MCU, and the MCU grid those imply. Edge MCUs
/// still decode full blocks; the driver clips them on copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageLayout {
    width: u32,
    height: u32,
    format: PixelFormat,
    mcu_width: u32,
    mcu_height: u32,
    mcus_per_row: u32,
    mcus_per_col: u32,
}

impl ImageLayout {
    /// Build a layout, deriving the MCU grid from the pixel dimensions.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidDimensions`] if `width` or `height` is zero
    /// or the total sample count overflows `usize`;
    /// [`LayoutError::InvalidMcuGeometry`] if either MCU dimension is zero
    /// or not a multiple of [`BLOCK_DIM`].
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        mcu_width: u32,
        mcu_height: u32,
    ) -> Result<Self, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::InvalidDimensions);
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.channels()))
            .ok_or(LayoutError::InvalidDimensions)?;
        if mcu_width == 0
            || mcu_height == 0
            || !(mcu_width as usize).is_multiple_of(BLOCK_DIM)
            || !(mcu_height as usize).is_multiple_of(BLOCK_DIM)
        {
            return Err(LayoutError::InvalidMcuGeometry);
        }
        Ok(Self {
            width,
            height,
            format,
            mcu_width,
            mcu_height,
            mcus_per_row: width.div_ceil(mcu_width),
            mcus_per_col: height.div_ceil(mcu_height),
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

    /// Sample format of the assembled raster.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pixel width of one MCU (a multiple of [`BLOCK_DIM`]).
    #[inline]
    pub fn mcu_width(&self) -> u32 {
        self.mcu_width
    }

    /// Pixel height of one MCU (a multiple of [`BLOCK_DIM`]).
    #[inline]
    pub fn mcu_height(&self) -> u32 {
        self.mcu_height
    }

    /// MCUs per grid row.
    #[inline]
    pub fn mcus_per_row(&self) -> u32 {
        self.mcus_per_row
    }

    /// MCU rows in the grid.
    #[inline]
    pub fn mcus_per_col(&self) -> u32 {
        self.mcus_per_col
    }

    /// Bytes per raster row (`width * channels`).
    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.width as usize * self.format.channels()
    }

    /// Total raster size in bytes (`row_pitch * height`).
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.row_pitch() * self.height as usize
    }
}

// ---------------------------------------------------------------------------
// McuView
// ---------------------------------------------------------------------------

/// One decoded MCU, borrowed from the decoder.
///
/// Valid only until the next [`next_mcu`](McuDecoder::next_mcu) call — the
/// decoder keeps ownership of the plane storage and reuses it.
///
/// # Plane layout
///
/// Each plane is a sequence of full [`BLOCK_SAMPLES`]-byte blocks, blocks
/// ordered row-major across the MCU: the block at block-grid position
/// `(bx, by)` starts at `(by * blocks_wide + bx) * BLOCK_SAMPLES`, where
/// `blocks_wide = mcu_width / BLOCK_DIM`. Inside a block, samples are 8
/// rows of 8. Blocks are always full; samples past the image edge hold
/// decoder-defined padding that the driver clips away.
#[derive(Debug)]
pub enum McuView<'a> {
    /// Single luminance plane.
    Gray(&'a [u8]),
    /// Three planes in fixed channel order.
    Rgb {
        /// Red plane.
        r: &'a [u8],
        /// Green plane.
        g: &'a [u8],
        /// Blue plane.
        b: &'a [u8],
    },
}

impl McuView<'_> {
    /// The raster format these planes interleave into.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        match self {
            Self::Gray(_) => PixelFormat::Gray8,
            Self::Rgb { .. } => PixelFormat::Rgb8,
        }
    }
}

// ---------------------------------------------------------------------------
// McuDecoder
// ---------------------------------------------------------------------------

/// Block decoder driven one MCU at a time.
///
/// The decoder pulls compressed bytes from the supply it is handed; it
/// never owns the input stream. Supply faults surface through the
/// decoder's own error type, so a short read fails initialization or
/// decode exactly like any other stream fault.
///
/// # Call discipline
///
/// [`begin`](McuDecoder::begin) once, then [`next_mcu`](McuDecoder::next_mcu)
/// exactly once per MCU in raster order until it returns `Ok(None)`.
/// Calling out of order or skipping positions is not supported.
pub trait McuDecoder {
    /// The decoder-specific error type.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Parse the stream header and report the image geometry.
    ///
    /// # Errors
    ///
    /// Any stream, header, or supply fault. No geometry is available on
    /// failure and the decoder must not be used further.
    fn begin(&mut self, supply: &mut dyn ByteSupply) -> Result<ImageLayout, Self::Error>;

    /// Decode the next MCU in raster order.
    ///
    /// Returns `Ok(None)` when the stream's blocks are exhausted — normal
    /// termination, decided by the decoder alone.
    ///
    /// # Errors
    ///
    /// Any stream or supply fault; the decode is unrecoverable afterwards.
    fn next_mcu(&mut self, supply: &mut dyn ByteSupply)
    -> Result<Option<McuView<'_>>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_match_interleave_width() {
        assert_eq!(PixelFormat::Gray8.channels(), 1);
        assert_eq!(PixelFormat::Rgb8.channels(), 3);
    }

    #[test]
    fn layout_derives_grid_by_ceil_division() {
        let layout = ImageLayout::new(33, 17, PixelFormat::Rgb8, 16, 16).unwrap();
        assert_eq!(layout.mcus_per_row(), 3);
        assert_eq!(layout.mcus_per_col(), 2);
        assert_eq!(layout.row_pitch(), 33 * 3);
        assert_eq!(layout.frame_bytes(), 33 * 3 * 17);

        // Exact multiples need no extra edge MCU.
        let layout = ImageLayout::new(32, 16, PixelFormat::Gray8, 16, 16).unwrap();
        assert_eq!(layout.mcus_per_row(), 2);
        assert_eq!(layout.mcus_per_col(), 1);
    }

    #[test]
    fn layout_rejects_zero_dimensions() {
        assert_eq!(
            ImageLayout::new(0, 10, PixelFormat::Gray8, 8, 8),
            Err(LayoutError::InvalidDimensions)
        );
        assert_eq!(
            ImageLayout::new(10, 0, PixelFormat::Gray8, 8, 8),
            Err(LayoutError::InvalidDimensions)
        );
    }

    #[test]
    fn layout_rejects_unaligned_mcu() {
        assert_eq!(
            ImageLayout::new(10, 10, PixelFormat::Gray8, 12, 8),
            Err(LayoutError::InvalidMcuGeometry)
        );
        assert_eq!(
            ImageLayout::new(10, 10, PixelFormat::Gray8, 8, 0),
            Err(LayoutError::InvalidMcuGeometry)
        );
    }

    #[test]
    fn view_reports_its_format() {
        let plane = [0u8; BLOCK_SAMPLES];
        assert_eq!(McuView::Gray(&plane).format(), PixelFormat::Gray8);
        assert_eq!(
            McuView::Rgb {
                r: &plane,
                g: &plane,
                b: &plane
            }
            .format(),
            PixelFormat::Rgb8
        );
    }
}
