//! Bundled JPEG collaborator over the `jpeg-decoder` crate.
//!
//! The assembly driver only speaks [`McuDecoder`]; this adapter makes
//! `jpeg-decoder` answer it. The upstream crate wants the whole
//! compressed stream and produces a whole upsampled frame, so the
//! adapter drains the supply through the pull contract at
//! [`begin`](McuDecoder::begin), defers the frame decode to the first
//! [`next_mcu`](McuDecoder::next_mcu) call (decode-stage faults surface
//! in the decode stage, not initialization), then serves full 8x8 blocks
//! in raster order. Samples past the image edge are padded with zero;
//! the driver clips padding away before it can reach the output.

use alloc::vec::Vec;
use core::fmt;
use std::io::Cursor;

use jpeg_decoder::{Decoder, PixelFormat as JpegPixelFormat};
use log::debug;

use crate::mcu::{
    BLOCK_DIM, BLOCK_SAMPLES, ImageLayout, LayoutError, McuDecoder, McuView, PixelFormat,
};
use crate::supply::{ByteSupply, SupplyError};

/// Per-call read cap while draining the supply, matching the small fixed
/// buffer of the pull protocol.
const PULL_CHUNK: usize = 255;

/// Errors from the JPEG adapter.
#[derive(Debug)]
#[non_exhaustive]
pub enum JpegError {
    /// The supply faulted while the stream was being drained.
    Supply(SupplyError),
    /// The stream header failed to parse.
    Header(jpeg_decoder::Error),
    /// The frame failed to decode.
    Frame(jpeg_decoder::Error),
    /// The stream decodes to a pixel format this adapter does not serve.
    Unsupported(JpegPixelFormat),
    /// The header reports a geometry no raster can be built for.
    Layout(LayoutError),
    /// `next_mcu` was called before a successful `begin`.
    NotStarted,
}

impl fmt::Display for JpegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supply(_) => write!(f, "byte supply failed while draining the stream"),
            Self::Header(_) => write!(f, "JPEG header rejected"),
            Self::Frame(_) => write!(f, "JPEG frame decode failed"),
            Self::Unsupported(pf) => write!(f, "unsupported decoded pixel format {pf:?}"),
            Self::Layout(_) => write!(f, "JPEG header reports an unusable geometry"),
            Self::NotStarted => write!(f, "next_mcu called before begin"),
        }
    }
}

impl core::error::Error for JpegError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Supply(e) => Some(e),
            Self::Header(e) | Self::Frame(e) => Some(e),
            Self::Layout(e) => Some(e),
            _ => None,
        }
    }
}

enum State {
    Idle,
    Parsed {
        decoder: Decoder<Cursor<Vec<u8>>>,
        layout: ImageLayout,
    },
    Serving {
        pixels: Vec<u8>,
        layout: ImageLayout,
        next: u32,
    },
}

/// [`McuDecoder`] over the `jpeg-decoder` crate.
///
/// Serves an 8x8 MCU geometry: the upstream decoder hands back an
/// already-upsampled full frame, so subsampled streams need no wider
/// MCUs at this seam.
pub struct JpegMcuDecoder {
    state: State,
    planes: [[u8; BLOCK_SAMPLES]; 3],
}

impl JpegMcuDecoder {
    /// Create an adapter ready for [`begin`](McuDecoder::begin).
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            planes: [[0; BLOCK_SAMPLES]; 3],
        }
    }
}

impl Default for JpegMcuDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the whole stream out of the supply in protocol-sized chunks.
fn drain(supply: &mut dyn ByteSupply) -> Result<Vec<u8>, SupplyError> {
    let mut compressed = Vec::with_capacity(supply.remaining() as usize);
    let mut chunk = [0u8; PULL_CHUNK];
    loop {
        let n = supply.pull(&mut chunk)?;
        if n == 0 {
            return Ok(compressed);
        }
        compressed.extend_from_slice(&chunk[..n]);
    }
}

/// Copy the 8x8 block for MCU `index` out of the interleaved frame into
/// per-channel planes, zero-padding past the image edge.
fn extract_blocks(
    planes: &mut [[u8; BLOCK_SAMPLES]; 3],
    pixels: &[u8],
    layout: &ImageLayout,
    index: u32,
) {
    let channels = layout.format().channels();
    let left = (index % layout.mcus_per_row()) as usize * BLOCK_DIM;
    let top = (index / layout.mcus_per_row()) as usize * BLOCK_DIM;
    let width = layout.width() as usize;
    let height = layout.height() as usize;

    for (ch, plane) in planes.iter_mut().enumerate().take(channels) {
        for ry in 0..BLOCK_DIM {
            for rx in 0..BLOCK_DIM {
                let x = left + rx;
                let y = top + ry;
                plane[ry * BLOCK_DIM + rx] = if x < width && y < height {
                    pixels[(y * width + x) * channels + ch]
                } else {
                    0
                };
            }
        }
    }
}

impl McuDecoder for JpegMcuDecoder {
    type Error = JpegError;

    fn begin(&mut self, supply: &mut dyn ByteSupply) -> Result<ImageLayout, JpegError> {
        let compressed = drain(supply).map_err(JpegError::Supply)?;
        let mut decoder = Decoder::new(Cursor::new(compressed));
        decoder.read_info().map_err(JpegError::Header)?;
        let Some(info) = decoder.info() else {
            unreachable!("read_info succeeded without frame info");
        };
        let format = match info.pixel_format {
            JpegPixelFormat::L8 => PixelFormat::Gray8,
            JpegPixelFormat::RGB24 => PixelFormat::Rgb8,
            other => return Err(JpegError::Unsupported(other)),
        };
        let layout = ImageLayout::new(
            u32::from(info.width),
            u32::from(info.height),
            format,
            BLOCK_DIM as u32,
            BLOCK_DIM as u32,
        )
        .map_err(JpegError::Layout)?;
        debug!(
            "JPEG header: {}x{} {:?}, grid {}x{}",
            layout.width(),
            layout.height(),
            layout.format(),
            layout.mcus_per_row(),
            layout.mcus_per_col()
        );
        self.state = State::Parsed { decoder, layout };
        Ok(layout)
    }

    fn next_mcu(
        &mut self,
        _supply: &mut dyn ByteSupply,
    ) -> Result<Option<McuView<'_>>, JpegError> {
        if matches!(self.state, State::Parsed { .. }) {
            let State::Parsed {
                mut decoder,
                layout,
            } = core::mem::replace(&mut self.state, State::Idle)
            else {
                unreachable!("state checked above");
            };
            let pixels = decoder.decode().map_err(JpegError::Frame)?;
            assert!(
                pixels.len() == layout.frame_bytes(),
                "decoded frame holds {} bytes, geometry needs {}",
                pixels.len(),
                layout.frame_bytes()
            );
            debug!("decoded JPEG frame: {} bytes", pixels.len());
            self.state = State::Serving {
                pixels,
                layout,
                next: 0,
            };
        }

        let format = match &mut self.state {
            State::Idle => return Err(JpegError::NotStarted),
            State::Parsed { .. } => unreachable!("frame decoded above"),
            State::Serving {
                pixels,
                layout,
                next,
            } => {
                if *next == layout.mcus_per_row() * layout.mcus_per_col() {
                    return Ok(None);
                }
                let index = *next;
                *next += 1;
                extract_blocks(&mut self.planes, pixels, layout, index);
                layout.format()
            }
        };

        Ok(Some(match format {
            PixelFormat::Gray8 => McuView::Gray(&self.planes[0]),
            PixelFormat::Rgb8 => McuView::Rgb {
                r: &self.planes[0],
                g: &self.planes[1],
                b: &self.planes[2],
            },
        }))
    }
}
