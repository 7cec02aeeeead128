//! PNM serialization of an assembled raster.
//!
//! Binary PGM (`P5`) for grayscale, binary PPM (`P6`) for color, maxval
//! 255. The payload is byte-for-byte the raster contents — PNM rows are
//! tightly packed and component-interleaved exactly like
//! [`Framebuffer::as_bytes`]. The container is a collaborator concern:
//! the assembly core works the same whatever the caller serializes to.

use alloc::format;
use alloc::vec::Vec;

use crate::frame::Framebuffer;
use crate::mcu::PixelFormat;

/// Serialize the raster as a binary PNM image.
///
/// `P5` for [`PixelFormat::Gray8`], `P6` for [`PixelFormat::Rgb8`],
/// maxval 255. Serialization to memory is infallible; persisting the
/// bytes is the caller's job.
pub fn encode(frame: &Framebuffer) -> Vec<u8> {
    let magic = match frame.format() {
        PixelFormat::Gray8 => "P5",
        PixelFormat::Rgb8 => "P6",
    };
    let header = format!("{magic}\n{} {}\n255\n", frame.width(), frame.height());
    let mut out = Vec::with_capacity(header.len() + frame.as_bytes().len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(frame.as_bytes());
    out
}
