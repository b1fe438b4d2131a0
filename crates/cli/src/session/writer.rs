//! Writes the reconstructed stream to disk.

use std::path::Path;

use contracts::{BitDepth, ChannelCount, ScanGeometry};
use image::ColorType;
use tracing::info;

use crate::error::{CliError, Result};

/// How the output file is encoded, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Rows as produced, no header
    Raw,
    Png,
    /// PGM / PPM
    Pnm,
}

impl OutputKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("png") => Self::Png,
            Some("pnm" | "pgm" | "ppm") => Self::Pnm,
            _ => Self::Raw,
        }
    }
}

/// Write `data` to `path`; returns the encoding used and the rows written
///
/// Image encodings only take complete rows; a trailing partial row is dropped.
pub fn write_output(path: &Path, data: &[u8], geometry: &ScanGeometry) -> Result<(OutputKind, usize)> {
    let kind = OutputKind::from_path(path);
    let row_bytes = geometry.output_row_bytes();
    let rows = if row_bytes == 0 { 0 } else { data.len() / row_bytes };

    if kind == OutputKind::Raw {
        std::fs::write(path, data)?;
        info!(path = %path.display(), bytes = data.len(), "raw output written");
        return Ok((kind, rows));
    }

    if rows == 0 {
        return Err(CliError::image(path, "no complete rows to encode"));
    }
    let height = u32::try_from(rows).map_err(|_| CliError::image(path, "too many rows"))?;
    let width = geometry.pixels_per_line;
    let data = &data[..rows * row_bytes];

    let (pixels, color) = match (geometry.channel_count, geometry.bit_depth) {
        (ChannelCount::One, BitDepth::One) => (expand_lineart(data, row_bytes, width), ColorType::L8),
        (ChannelCount::One, BitDepth::Eight) => (data.to_vec(), ColorType::L8),
        (ChannelCount::One, BitDepth::Sixteen) => (native_endian_samples(data), ColorType::L16),
        (ChannelCount::Three, BitDepth::Eight) => (data.to_vec(), ColorType::Rgb8),
        (ChannelCount::Three, BitDepth::Sixteen) => (native_endian_samples(data), ColorType::Rgb16),
        (ChannelCount::Three, BitDepth::One) => {
            return Err(CliError::image(path, "1-bit colour is not representable"))
        }
    };

    image::save_buffer(path, &pixels, width, height, color)
        .map_err(|e| CliError::image(path, e.to_string()))?;
    info!(path = %path.display(), width, height, ?kind, "image output written");
    Ok((kind, rows))
}

/// Scan rows carry big-endian 16-bit samples; `image` expects host order
fn native_endian_samples(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(2)
        .flat_map(|s| u16::from_be_bytes([s[0], s[1]]).to_ne_bytes())
        .collect()
}

/// One byte per pixel; a set bit is black
fn expand_lineart(data: &[u8], row_bytes: usize, width: u32) -> Vec<u8> {
    let width = width as usize;
    let mut pixels = Vec::with_capacity(data.len() / row_bytes.max(1) * width);
    for row in data.chunks_exact(row_bytes) {
        pixels.extend((0..width).map(|x| {
            let bit = row[x / 8] & (0x80 >> (x % 8));
            if bit != 0 {
                0x00
            } else {
                0xff
            }
        }));
    }
    pixels
}
