//! Streaming MCU-to-raster assembly for block-pull image decoders.
//!
//! A block decoder produces one MCU of full 8x8 pixel blocks per step and
//! pulls compressed bytes from its caller on demand. This crate supplies
//! those bytes and assembles the decoded blocks into one contiguous
//! raster:
//!
//! - [`ByteSupply`] — pull contract over a finite, length-known source;
//!   [`SliceSupply`] in memory, [`FileSupply`] over a file (`std`)
//! - [`McuDecoder`] — the seam to the external block decoder, with
//!   [`ImageLayout`], [`McuView`], and [`PixelFormat`]
//! - [`assemble`] — the decode loop: raster-order MCU walk, edge
//!   clipping, one uniform copy path for grayscale and color
//! - [`Framebuffer`] — the assembled raster, convertible to typed
//!   [`ImgVec`] images
//! - [`pnm`] — binary PGM/PPM serialization of the result
//! - [`JpegMcuDecoder`] — bundled collaborator over `jpeg-decoder`
//!   (feature `jpeg`)
//!
//! The `jpg2pnm` binary (feature `cli`) wires these into a one-shot
//! file-to-file converter.

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod assemble;
mod frame;
#[cfg(feature = "jpeg")]
mod jpeg;
mod mcu;
pub mod pnm;
mod supply;

pub use assemble::{RasterError, assemble};
pub use frame::{FrameAllocError, Framebuffer};
#[cfg(feature = "jpeg")]
pub use jpeg::{JpegError, JpegMcuDecoder};
pub use mcu::{
    BLOCK_DIM, BLOCK_SAMPLES, ImageLayout, LayoutError, McuDecoder, McuView, PixelFormat,
};
#[cfg(feature = "std")]
pub use supply::FileSupply;
pub use supply::{ByteSupply, SliceSupply, SupplyError};

// Re-exports for callers working with typed pixels.
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb;
pub use rgb::{Gray, Rgb};
