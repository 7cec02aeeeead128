//! JPEG to PNM file conversion tool.
//!
//! One source path, one destination path. Grayscale streams come out as
//! binary PGM, color streams as binary PPM. Every failure exits non-zero
//! with a diagnostic naming the failing stage (open, decode, write).

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::info;

use zenraster::{FileSupply, JpegMcuDecoder, assemble, pnm};

/// Convert a JPEG image to a binary PGM/PPM raster.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Source JPEG file.
    source: PathBuf,
    /// Destination PNM file.
    dest: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut supply =
        FileSupply::open(&cli.source).with_context(|| format!("open: {}", cli.source.display()))?;

    let mut decoder = JpegMcuDecoder::new();
    let started = Instant::now();
    let frame = assemble(&mut decoder, &mut supply)
        .with_context(|| format!("decode: {}", cli.source.display()))?;
    info!(
        "decoded {}x{}, {} channel(s), in {:.3} ms",
        frame.width(),
        frame.height(),
        frame.format().channels(),
        started.elapsed().as_secs_f64() * 1e3
    );

    std::fs::write(&cli.dest, pnm::encode(&frame))
        .with_context(|| format!("write: {}", cli.dest.display()))?;
    info!("wrote {}", cli.dest.display());
    Ok(())
}
