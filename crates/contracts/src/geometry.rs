//! Scan geometry: 扫描几何参数，整个扫描期间不可变。

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Number of colour channels per output pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChannelCount {
    /// Gray or lineart
    One,
    /// Colour (R, G, B)
    Three,
}

impl ChannelCount {
    /// Channel count as a number
    #[inline]
    pub fn get(self) -> usize {
        match self {
            Self::One => 1,
            Self::Three => 3,
        }
    }
}

impl TryFrom<u8> for ChannelCount {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            3 => Ok(Self::Three),
            other => Err(format!("channel_count must be 1 or 3, got {other}")),
        }
    }
}

impl From<ChannelCount> for u8 {
    fn from(value: ChannelCount) -> Self {
        value.get() as u8
    }
}

/// Bits per channel sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BitDepth {
    /// Lineart, 8 pixels per byte, MSB first
    One,
    Eight,
    /// Two bytes per sample, moved as one unit
    Sixteen,
}

impl BitDepth {
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    /// Bytes per sample unit (lineart packs several pixels into one byte and reports 1)
    #[inline]
    pub fn sample_bytes(self) -> usize {
        match self {
            Self::One | Self::Eight => 1,
            Self::Sixteen => 2,
        }
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            other => Err(format!("bit_depth must be 1, 8 or 16, got {other}")),
        }
    }
}

impl From<BitDepth> for u8 {
    fn from(value: BitDepth) -> Self {
        value.bits() as u8
    }
}

/// Scan geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ScanGeometry {
    /// Pixels per output line
    #[validate(range(min = 1))]
    pub pixels_per_line: u32,

    /// Output lines the caller expects
    #[validate(range(min = 1))]
    pub total_output_lines: u32,

    /// Bytes per raw hardware line (may include padding)
    #[validate(range(min = 1))]
    pub bytes_per_raw_line: u32,

    pub channel_count: ChannelCount,

    pub bit_depth: BitDepth,
}

impl ScanGeometry {
    /// Bytes of one channel's row
    pub fn channel_row_bytes(&self) -> usize {
        let ppl = self.pixels_per_line as usize;
        match self.bit_depth {
            BitDepth::One => ppl.div_ceil(8),
            depth => ppl * depth.sample_bytes(),
        }
    }

    /// Bytes of one pixel-interleaved output row
    pub fn output_row_bytes(&self) -> usize {
        self.channel_row_bytes() * self.channel_count.get()
    }

    /// Total bytes of a complete scan
    pub fn total_output_bytes(&self) -> u64 {
        self.output_row_bytes() as u64 * u64::from(self.total_output_lines)
    }
}
