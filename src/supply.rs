//! Pull-based compressed byte supply.
//!
//! [`ByteSupply`] is the seam between the caller, who owns the compressed
//! input, and a block decoder that pulls bytes on demand during header
//! parsing and MCU decode. The supply is finite and its total length is
//! known before the first read; the decoder sizes each request to its own
//! (small, fixed) working buffer and the supply delivers at most
//! `min(request, remaining)` bytes per call.
//!
//! # Contract
//!
//! - [`pull()`](ByteSupply::pull) delivers `min(dst.len(), remaining())`
//!   bytes and advances the cursor by exactly that count.
//! - A return of `Ok(0)` means end of stream. It is not an error — whether
//!   running out of bytes is acceptable is the decoder's call, signaled
//!   through its own exhaustion protocol, never the supply's.
//! - [`SupplyError::ShortRead`] is raised only when the underlying source
//!   yields fewer bytes than it claimed were still available — a physical
//!   fault, not a legitimate end of stream.
//! - The cursor is monotonically non-decreasing and never exceeds the
//!   total length. One supply serves one decode; it is never shared.

use core::fmt;

/// Errors from a [`ByteSupply`].
#[derive(Debug)]
#[non_exhaustive]
pub enum SupplyError {
    /// The source delivered fewer bytes than it reported as remaining.
    ShortRead {
        /// Bytes the supply asked the source for.
        requested: usize,
        /// Bytes the source actually produced.
        delivered: usize,
    },
    /// The source reported a read fault.
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

impl fmt::Display for SupplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRead {
                requested,
                delivered,
            } => write!(
                f,
                "source delivered {delivered} of {requested} bytes it reported available"
            ),
            #[cfg(feature = "std")]
            Self::Io(e) => write!(f, "source read failed: {e}"),
        }
    }
}

impl core::error::Error for SupplyError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            #[cfg(feature = "std")]
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Finite source of compressed bytes with an up-front known length.
///
/// # Object safety
///
/// This trait is object-safe. Decoder seams take `&mut dyn ByteSupply`
/// so one decoder type serves any source.
pub trait ByteSupply {
    /// Fill `dst` with the next `min(dst.len(), remaining())` bytes.
    ///
    /// Returns the count actually delivered. `Ok(0)` is end of stream.
    ///
    /// # Errors
    ///
    /// [`SupplyError::ShortRead`] if the source produces fewer bytes than
    /// it reported as still available; [`SupplyError::Io`] for any other
    /// read fault.
    fn pull(&mut self, dst: &mut [u8]) -> Result<usize, SupplyError>;

    /// Bytes not yet delivered.
    fn remaining(&self) -> u64;
}

// ---------------------------------------------------------------------------
// SliceSupply
// ---------------------------------------------------------------------------

/// In-memory supply over a borrowed byte slice.
///
/// The cursor and length are instance fields, so any number of concurrent
/// decodes can each own their own supply.
#[derive(Debug)]
pub struct SliceSupply<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSupply<'a> {
    /// Wrap a byte slice as a supply.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteSupply for SliceSupply<'_> {
    fn pull(&mut self, dst: &mut [u8]) -> Result<usize, SupplyError> {
        let n = dst.len().min(self.data.len() - self.pos);
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn remaining(&self) -> u64 {
        (self.data.len() - self.pos) as u64
    }
}

// ---------------------------------------------------------------------------
// FileSupply
// ---------------------------------------------------------------------------

/// File-backed supply; the length is measured once at open.
///
/// Reads strictly forward. A read that comes up short against the
/// measured length is a [`SupplyError::ShortRead`] — the file shrank or
/// the medium failed mid-decode.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct FileSupply {
    file: std::fs::File,
    remaining: u64,
}

#[cfg(feature = "std")]
impl FileSupply {
    /// Open `path` and measure its length.
    ///
    /// # Errors
    ///
    /// Any I/O error from opening or statting the file.
    pub fn open(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let remaining = file.metadata()?.len();
        Ok(Self { file, remaining })
    }
}

#[cfg(feature = "std")]
impl ByteSupply for FileSupply {
    fn pull(&mut self, dst: &mut [u8]) -> Result<usize, SupplyError> {
        use std::io::Read;

        let want = (dst.len() as u64).min(self.remaining) as usize;
        let mut filled = 0;
        while filled < want {
            match self.file.read(&mut dst[filled..want]) {
                Ok(0) => {
                    return Err(SupplyError::ShortRead {
                        requested: want,
                        delivered: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(SupplyError::Io(e)),
            }
        }
        self.remaining -= want as u64;
        Ok(want)
    }

    fn remaining(&self) -> u64 {
        self.remaining
    }
}
