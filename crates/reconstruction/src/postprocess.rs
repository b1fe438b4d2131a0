//! Row post-processing applied to every complete output row.
//!
//! Order is fixed: polarity invert first, then direction mirror.

use contracts::{BitDepth, ScanConfig};

/// Per-scan post-processing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostProcess {
    invert: bool,
    mirror: bool,
    /// Bytes per interleaved pixel; 0 for packed lineart
    pixel_bytes: usize,
    pixels_per_line: usize,
}

impl PostProcess {
    pub fn from_config(config: &ScanConfig) -> Self {
        let geometry = &config.geometry;
        let pixel_bytes = match geometry.bit_depth {
            BitDepth::One => 0,
            depth => depth.sample_bytes() * geometry.channel_count.get(),
        };
        Self {
            invert: config.invert,
            mirror: config.mirror,
            pixel_bytes,
            pixels_per_line: geometry.pixels_per_line as usize,
        }
    }

    #[inline]
    pub fn is_noop(&self) -> bool {
        !self.invert && !self.mirror
    }

    pub fn apply(&self, row: &mut [u8]) {
        if self.invert {
            invert(row);
            if self.pixel_bytes == 0 {
                clear_padding_bits(row, self.pixels_per_line);
            }
        }
        if self.mirror {
            if self.pixel_bytes == 0 {
                mirror_bits(row, self.pixels_per_line);
            } else {
                mirror_pixels(row, self.pixel_bytes);
            }
        }
    }
}

/// Bitwise NOT of every byte
#[inline]
pub fn invert(row: &mut [u8]) {
    row.iter_mut().for_each(|b| *b = !*b);
}

/// Clear every bit past the first `pixels` of a packed lineart row
pub fn clear_padding_bits(row: &mut [u8], pixels: usize) {
    let full = pixels / 8;
    let rem = pixels % 8;
    let mut tail = full;
    if rem > 0 {
        if let Some(b) = row.get_mut(full) {
            *b &= 0xff << (8 - rem);
        }
        tail += 1;
    }
    if let Some(rest) = row.get_mut(tail..) {
        rest.fill(0);
    }
}

/// Reverse pixel order, keeping the bytes of each pixel together
pub fn mirror_pixels(row: &mut [u8], pixel_bytes: usize) {
    if pixel_bytes == 0 {
        return;
    }
    let pixels = row.len() / pixel_bytes;
    for i in 0..pixels / 2 {
        let j = pixels - 1 - i;
        let (head, tail) = row.split_at_mut(j * pixel_bytes);
        head[i * pixel_bytes..(i + 1) * pixel_bytes].swap_with_slice(&mut tail[..pixel_bytes]);
    }
}

/// Reverse the first `pixels` bits (MSB first) of a packed lineart row
///
/// Padding bits past the last pixel come out cleared.
pub fn mirror_bits(row: &mut [u8], pixels: usize) {
    let pixels = pixels.min(row.len() * 8);
    let bit = |bytes: &[u8], i: usize| (bytes[i / 8] >> (7 - i % 8)) & 1;

    let source = row.to_vec();
    row.fill(0);
    for i in 0..pixels {
        if bit(&source, pixels - 1 - i) == 1 {
            row[i / 8] |= 0x80 >> (i % 8);
        }
    }
}
