//! The MCU assembly driver.
//!
//! [`assemble`] owns the decode loop: it initializes the decoder through
//! the supply, walks the MCU grid in raster order, and copies each decoded
//! MCU's blocks into a single [`Framebuffer`], clipping blocks that
//! overhang the right and bottom image edges. The clipped copy regions of
//! all MCU positions are pairwise disjoint and cover the raster exactly
//! once, even though the decoder always produces full blocks.

use core::fmt;

use log::debug;

use crate::frame::{FrameAllocError, Framebuffer};
use crate::mcu::{BLOCK_DIM, BLOCK_SAMPLES, ImageLayout, McuDecoder, McuView};
use crate::supply::ByteSupply;

/// Errors from one assembly run.
///
/// Every variant is terminal: the conversion either fully succeeds or
/// fully fails, and a partially built raster is never returned.
#[derive(Debug)]
#[non_exhaustive]
pub enum RasterError<E> {
    /// The decoder rejected the stream during initialization.
    Init(E),
    /// Reported image dimensions are zero or overflow the raster size.
    InvalidDimensions,
    /// The raster allocation failed.
    OutOfMemory {
        /// Byte size of the failed request.
        bytes: usize,
    },
    /// The decoder reported a fault mid-stream.
    Decode(E),
    /// The decoder produced more MCU rows than the image geometry implies.
    GeometryOverflow,
}

impl<E> fmt::Display for RasterError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(_) => write!(f, "decoder rejected the stream during initialization"),
            Self::InvalidDimensions => {
                write!(f, "image dimensions are zero or overflow the raster size")
            }
            Self::OutOfMemory { bytes } => write!(f, "failed to allocate {bytes} byte raster"),
            Self::Decode(_) => write!(f, "decoder reported a fault mid-stream"),
            Self::GeometryOverflow => {
                write!(f, "decoder produced more MCU rows than the image geometry implies")
            }
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for RasterError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Init(e) | Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Drive `decoder` over `supply` and assemble the complete raster.
///
/// Initializes the decoder, allocates the raster from the reported
/// geometry, then requests MCUs until the decoder signals exhaustion.
/// The decoder's `Ok(None)` is trusted even before the nominal last grid
/// position; pixels an early-stopping decoder never produced keep the
/// allocator's zero fill (defined but unspecified content).
///
/// # Errors
///
/// See [`RasterError`]. On any error the partial raster is discarded.
pub fn assemble<D: McuDecoder>(
    decoder: &mut D,
    supply: &mut dyn ByteSupply,
) -> Result<Framebuffer, RasterError<D::Error>> {
    let layout = decoder.begin(supply).map_err(RasterError::Init)?;
    debug!(
        "assembling {}x{} {:?}, MCU {}x{}, grid {}x{}",
        layout.width(),
        layout.height(),
        layout.format(),
        layout.mcu_width(),
        layout.mcu_height(),
        layout.mcus_per_row(),
        layout.mcus_per_col()
    );

    let mut frame =
        Framebuffer::new(layout.width(), layout.height(), layout.format()).map_err(|e| match e {
            FrameAllocError::InvalidDimensions => RasterError::InvalidDimensions,
            FrameAllocError::OutOfMemory { bytes } => RasterError::OutOfMemory { bytes },
        })?;

    let mut mcu_col = 0u32;
    let mut mcu_row = 0u32;
    let mut decoded = 0u64;
    loop {
        let Some(mcu) = decoder.next_mcu(supply).map_err(RasterError::Decode)? else {
            break;
        };
        if mcu_row >= layout.mcus_per_col() {
            return Err(RasterError::GeometryOverflow);
        }
        blit_mcu(&mut frame, &layout, mcu_col, mcu_row, &mcu);
        decoded += 1;
        mcu_col += 1;
        if mcu_col == layout.mcus_per_row() {
            mcu_col = 0;
            mcu_row += 1;
        }
    }
    debug!("assembled {decoded} MCUs into {frame:?}");
    Ok(frame)
}

/// Copy one decoded MCU into the raster, clipping at the image edges.
///
/// A single routine serves both formats, parameterized over the plane
/// set: each destination sample takes one byte from every plane. Source
/// rows always advance by the full block width; clipped trailing samples
/// are skipped, not copied.
fn blit_mcu(
    frame: &mut Framebuffer,
    layout: &ImageLayout,
    mcu_col: u32,
    mcu_row: u32,
    mcu: &McuView<'_>,
) {
    assert!(
        mcu.format() == layout.format(),
        "decoder switched pixel format mid-stream: {:?} then {:?}",
        layout.format(),
        mcu.format()
    );

    let (gray, rgb);
    let planes: &[&[u8]] = match mcu {
        McuView::Gray(p) => {
            gray = [*p];
            &gray
        }
        McuView::Rgb { r, g, b } => {
            rgb = [*r, *g, *b];
            &rgb
        }
    };
    let channels = planes.len();

    let blocks_wide = layout.mcu_width() as usize / BLOCK_DIM;
    let blocks_tall = layout.mcu_height() as usize / BLOCK_DIM;
    let plane_len = blocks_wide * blocks_tall * BLOCK_SAMPLES;
    for (i, plane) in planes.iter().enumerate() {
        assert!(
            plane.len() >= plane_len,
            "plane {i} holds {} bytes, MCU geometry needs {plane_len}",
            plane.len()
        );
    }

    let origin_x = mcu_col * layout.mcu_width();
    let origin_y = mcu_row * layout.mcu_height();

    for by in 0..blocks_tall {
        let block_top = origin_y + (by * BLOCK_DIM) as u32;
        let rows_valid = (layout.height().saturating_sub(block_top) as usize).min(BLOCK_DIM);
        for bx in 0..blocks_wide {
            let block_left = origin_x + (bx * BLOCK_DIM) as u32;
            let cols_valid = (layout.width().saturating_sub(block_left) as usize).min(BLOCK_DIM);
            let block_base = (by * blocks_wide + bx) * BLOCK_SAMPLES;

            for row in 0..rows_valid {
                let src_row = block_base + row * BLOCK_DIM;
                let dst_row = frame.row_mut(block_top + row as u32);
                let mut dst = block_left as usize * channels;
                for col in 0..cols_valid {
                    for (c, plane) in planes.iter().enumerate() {
                        dst_row[dst + c] = plane[src_row + col];
                    }
                    dst += channels;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcu::PixelFormat;
    use crate::supply::SliceSupply;
    use alloc::vec::Vec;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("mock decoder fault with status {status}")]
    struct MockError {
        status: u8,
    }

    /// Fill value for samples past the image edge. The oracle stays below
    /// 251, so poison leaking into the raster is always detectable.
    const POISON: u8 = 0xFF;

    fn oracle(x: u32, y: u32, channel: usize) -> u8 {
        ((x as usize * 7 + y as usize * 13 + channel * 31) % 251) as u8
    }

    fn expected_raster(width: u32, height: u32, format: PixelFormat, replicate: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(width as usize * height as usize * format.channels());
        for y in 0..height {
            for x in 0..width {
                for c in 0..format.channels() {
                    out.push(oracle(x, y, if replicate { 0 } else { c }));
                }
            }
        }
        out
    }

    /// Serves oracle-valued full blocks for a fixed geometry, poison in
    /// the padding, with knobs for early exhaustion, mid-stream faults,
    /// and overproduction.
    struct BlockDecoder {
        layout: ImageLayout,
        planes: [Vec<u8>; 3],
        next: u32,
        calls: u32,
        stop_after: Option<u32>,
        fail_at: Option<(u32, u8)>,
        overshoot: u32,
        replicate: bool,
    }

    impl BlockDecoder {
        fn new(width: u32, height: u32, format: PixelFormat, mcu_dim: u32) -> Self {
            let layout = ImageLayout::new(width, height, format, mcu_dim, mcu_dim).unwrap();
            Self {
                layout,
                planes: [Vec::new(), Vec::new(), Vec::new()],
                next: 0,
                calls: 0,
                stop_after: None,
                fail_at: None,
                overshoot: 0,
                replicate: false,
            }
        }

        fn grid_total(&self) -> u32 {
            self.layout.mcus_per_row() * self.layout.mcus_per_col()
        }

        fn fill_planes(&mut self, index: u32) {
            let grid_col = index % self.layout.mcus_per_row();
            let grid_row = index / self.layout.mcus_per_row();
            let blocks_wide = self.layout.mcu_width() as usize / BLOCK_DIM;
            let blocks_tall = self.layout.mcu_height() as usize / BLOCK_DIM;
            let plane_len = blocks_wide * blocks_tall * BLOCK_SAMPLES;

            for ch in 0..self.layout.format().channels() {
                let plane = &mut self.planes[ch];
                plane.clear();
                plane.resize(plane_len, POISON);
                for by in 0..blocks_tall {
                    for bx in 0..blocks_wide {
                        for ry in 0..BLOCK_DIM {
                            for rx in 0..BLOCK_DIM {
                                let x = grid_col * self.layout.mcu_width()
                                    + (bx * BLOCK_DIM + rx) as u32;
                                let y = grid_row * self.layout.mcu_height()
                                    + (by * BLOCK_DIM + ry) as u32;
                                if x < self.layout.width() && y < self.layout.height() {
                                    let ofs = (by * blocks_wide + bx) * BLOCK_SAMPLES
                                        + ry * BLOCK_DIM
                                        + rx;
                                    plane[ofs] =
                                        oracle(x, y, if self.replicate { 0 } else { ch });
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    impl McuDecoder for BlockDecoder {
        type Error = MockError;

        fn begin(&mut self, _supply: &mut dyn ByteSupply) -> Result<ImageLayout, MockError> {
            Ok(self.layout)
        }

        fn next_mcu(
            &mut self,
            _supply: &mut dyn ByteSupply,
        ) -> Result<Option<McuView<'_>>, MockError> {
            self.calls += 1;
            if let Some((at, status)) = self.fail_at {
                if self.next == at {
                    return Err(MockError { status });
                }
            }
            let total = match self.stop_after {
                Some(n) => n.min(self.grid_total()),
                None => self.grid_total() + self.overshoot,
            };
            if self.next == total {
                return Ok(None);
            }
            let index = self.next;
            self.next += 1;
            self.fill_planes(index);
            Ok(Some(match self.layout.format() {
                PixelFormat::Gray8 => McuView::Gray(&self.planes[0]),
                PixelFormat::Rgb8 => McuView::Rgb {
                    r: &self.planes[0],
                    g: &self.planes[1],
                    b: &self.planes[2],
                },
            }))
        }
    }

    fn assemble_mock(decoder: &mut BlockDecoder) -> Result<Framebuffer, RasterError<MockError>> {
        let mut supply = SliceSupply::new(&[]);
        assemble(decoder, &mut supply)
    }

    /// Coverage and clipping across dimensions that are exact MCU
    /// multiples, one pixel more, and one pixel less, in each axis
    /// independently, for both formats and both common MCU sizes.
    #[test]
    fn covers_every_pixel_exactly() {
        for format in [PixelFormat::Gray8, PixelFormat::Rgb8] {
            for mcu_dim in [8u32, 16] {
                let base = mcu_dim * 2;
                for (width, height) in [
                    (base, base),
                    (base + 1, base),
                    (base - 1, base),
                    (base, base + 1),
                    (base, base - 1),
                    (base + 1, base - 1),
                    (base - 1, base + 1),
                ] {
                    let mut decoder = BlockDecoder::new(width, height, format, mcu_dim);
                    let frame = assemble_mock(&mut decoder).unwrap();
                    assert_eq!(frame.width(), width);
                    assert_eq!(frame.height(), height);
                    assert_eq!(frame.format(), format);
                    assert_eq!(
                        frame.as_bytes(),
                        expected_raster(width, height, format, false).as_slice(),
                        "{width}x{height} {format:?} MCU {mcu_dim}"
                    );
                }
            }
        }
    }

    /// Width 10 against 16-wide MCUs: the rightmost 6 samples of every
    /// block row are clipped and the poison padding never lands in the
    /// raster.
    #[test]
    fn clipping_stops_at_the_image_edge() {
        let mut decoder = BlockDecoder::new(10, 16, PixelFormat::Gray8, 16);
        let frame = assemble_mock(&mut decoder).unwrap();
        assert_eq!(frame.row_pitch(), 10);
        assert!(frame.as_bytes().iter().all(|&b| b != POISON));
        assert_eq!(
            frame.as_bytes(),
            expected_raster(10, 16, PixelFormat::Gray8, false).as_slice()
        );
        // Last column of every row carries the sample for x = 9, never
        // anything from x = 10 and beyond.
        for y in 0..16 {
            assert_eq!(frame.row(y)[9], oracle(9, y, 0));
        }
    }

    /// The same content fed as one plane and as three replicated planes
    /// produces a gray sample equal to each of the three interleaved
    /// samples at every position.
    #[test]
    fn gray_and_color_assemble_symmetrically() {
        let mut gray_dec = BlockDecoder::new(20, 12, PixelFormat::Gray8, 16);
        gray_dec.replicate = true;
        let gray = assemble_mock(&mut gray_dec).unwrap();

        let mut color_dec = BlockDecoder::new(20, 12, PixelFormat::Rgb8, 16);
        color_dec.replicate = true;
        let color = assemble_mock(&mut color_dec).unwrap();

        for y in 0..12 {
            let gray_row = gray.row(y);
            let color_row = color.row(y);
            for x in 0..20usize {
                let g = gray_row[x];
                assert_eq!(&color_row[x * 3..x * 3 + 3], &[g, g, g]);
            }
        }
    }

    /// An early `Ok(None)` is trusted: the raster comes back without
    /// error, decoded MCUs in place and the rest still zero-filled.
    #[test]
    fn early_exhaustion_returns_the_raster_as_is() {
        let mut decoder = BlockDecoder::new(32, 32, PixelFormat::Gray8, 16);
        decoder.stop_after = Some(1);
        let frame = assemble_mock(&mut decoder).unwrap();

        // First MCU (top-left 16x16) is assembled.
        for y in 0..16 {
            for x in 0..16u32 {
                assert_eq!(frame.row(y)[x as usize], oracle(x, y, 0));
            }
        }
        // Everything past it keeps the allocator's fill.
        for y in 0..32u32 {
            for x in 0..32usize {
                if y >= 16 || x >= 16 {
                    assert_eq!(frame.row(y)[x], 0);
                }
            }
        }
    }

    #[test]
    fn mid_stream_fault_discards_the_raster() {
        let mut decoder = BlockDecoder::new(32, 32, PixelFormat::Rgb8, 16);
        decoder.fail_at = Some((2, 9));
        match assemble_mock(&mut decoder) {
            Err(RasterError::Decode(MockError { status })) => assert_eq!(status, 9),
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn init_fault_never_allocates() {
        struct FailingInit;
        impl McuDecoder for FailingInit {
            type Error = MockError;
            fn begin(&mut self, _: &mut dyn ByteSupply) -> Result<ImageLayout, MockError> {
                Err(MockError { status: 3 })
            }
            fn next_mcu(
                &mut self,
                _: &mut dyn ByteSupply,
            ) -> Result<Option<McuView<'_>>, MockError> {
                unreachable!("begin failed")
            }
        }

        let mut supply = SliceSupply::new(&[]);
        match assemble(&mut FailingInit, &mut supply) {
            Err(RasterError::Init(MockError { status })) => assert_eq!(status, 3),
            other => panic!("expected Init error, got {other:?}"),
        }
    }

    /// A decoder that keeps producing past the last grid row trips the
    /// defensive geometry check.
    #[test]
    fn overproduction_is_a_geometry_error() {
        let mut decoder = BlockDecoder::new(16, 16, PixelFormat::Gray8, 16);
        decoder.overshoot = 1;
        assert!(matches!(
            assemble_mock(&mut decoder),
            Err(RasterError::GeometryOverflow)
        ));
    }

    /// 9x9 three-component image with 8x8 MCUs: a 2x2 grid whose right
    /// and bottom MCUs clip to 1 valid column/row, filling all 243 bytes
    /// from source data with zero out-of-bounds writes.
    #[test]
    fn nine_by_nine_color_end_to_end() {
        let mut decoder = BlockDecoder::new(9, 9, PixelFormat::Rgb8, 8);
        let frame = assemble_mock(&mut decoder).unwrap();
        assert_eq!(decoder.calls, 5); // 4 MCUs + the exhaustion signal
        assert_eq!(frame.as_bytes().len(), 243);
        assert_eq!(
            frame.as_bytes(),
            expected_raster(9, 9, PixelFormat::Rgb8, false).as_slice()
        );
        assert!(frame.as_bytes().iter().all(|&b| b != POISON));
    }

    /// Non-overlap and coverage by construction: walking every MCU
    /// position's clipped region touches each pixel exactly once.
    #[test]
    fn copy_regions_tile_the_raster_exactly_once() {
        for format in [PixelFormat::Gray8, PixelFormat::Rgb8] {
            let layout = ImageLayout::new(21, 13, format, 16, 16).unwrap();
            let mut touched = Vec::new();
            touched.resize(21usize * 13, 0u32);

            for mcu_row in 0..layout.mcus_per_col() {
                for mcu_col in 0..layout.mcus_per_row() {
                    let origin_x = mcu_col * layout.mcu_width();
                    let origin_y = mcu_row * layout.mcu_height();
                    for by in 0..layout.mcu_height() as usize / BLOCK_DIM {
                        let block_top = origin_y + (by * BLOCK_DIM) as u32;
                        let rows_valid =
                            (layout.height().saturating_sub(block_top) as usize).min(BLOCK_DIM);
                        for bx in 0..layout.mcu_width() as usize / BLOCK_DIM {
                            let block_left = origin_x + (bx * BLOCK_DIM) as u32;
                            let cols_valid =
                                (layout.width().saturating_sub(block_left) as usize).min(BLOCK_DIM);
                            for row in 0..rows_valid {
                                for col in 0..cols_valid {
                                    let x = block_left as usize + col;
                                    let y = block_top as usize + row;
                                    touched[y * 21 + x] += 1;
                                }
                            }
                        }
                    }
                }
            }
            assert!(touched.iter().all(|&n| n == 1), "{format:?}");
        }
    }

    #[test]
    fn error_text_names_the_failing_stage() {
        use alloc::string::ToString;

        let e: RasterError<MockError> = RasterError::Init(MockError { status: 1 });
        assert_eq!(
            e.to_string(),
            "decoder rejected the stream during initialization"
        );
        let e: RasterError<MockError> = RasterError::GeometryOverflow;
        assert_eq!(
            e.to_string(),
            "decoder produced more MCU rows than the image geometry implies"
        );
    }
}
