//! Raw row layout: where each channel's samples live inside one raw line.

use contracts::{RawLayout, ScanConfig};

/// Typed view over the channel groups of a raw line
#[derive(Debug, Clone)]
pub struct RowLayout {
    layout: RawLayout,
    /// Raw position of each output channel
    positions: Vec<usize>,
    channels: usize,
    /// Bytes per channel row
    row_bytes: usize,
    /// Bytes per sample unit
    sample_bytes: usize,
    /// Distance between channel blocks in a channel-major line
    block_stride: usize,
}

impl RowLayout {
    pub fn from_config(config: &ScanConfig) -> Self {
        let geometry = &config.geometry;
        let channels = geometry.channel_count.get();
        Self {
            layout: config.raw_layout,
            positions: config.channel_positions(),
            channels,
            row_bytes: geometry.channel_row_bytes(),
            sample_bytes: geometry.bit_depth.sample_bytes(),
            block_stride: geometry.bytes_per_raw_line as usize / channels.max(1),
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Copy `channel`'s samples from `raw` into `dst` (`row_bytes` long)
    ///
    /// Missing bytes (a raw line shorter than the layout) are left untouched.
    pub fn extract(&self, raw: &[u8], channel: usize, dst: &mut [u8]) {
        let pos = self.positions.get(channel).copied().unwrap_or(channel);

        if self.channels == 1 {
            copy_prefix(raw, dst);
            return;
        }

        match self.layout {
            RawLayout::ChannelMajor => {
                let start = pos * self.block_stride;
                if let Some(block) = raw.get(start..) {
                    copy_prefix(block, dst);
                }
            }
            RawLayout::SampleInterleaved => {
                let unit = self.sample_bytes;
                let pixel_stride = unit * self.channels;
                for (p, out) in dst.chunks_exact_mut(unit).enumerate() {
                    let start = p * pixel_stride + pos * unit;
                    if let Some(sample) = raw.get(start..start + unit) {
                        out.copy_from_slice(sample);
                    }
                }
            }
        }
    }

    /// Interleave per-channel rows into one output row
    pub fn interleave(&self, channel_rows: &[Vec<u8>], out: &mut [u8]) {
        if self.channels == 1 {
            if let Some(row) = channel_rows.first() {
                copy_prefix(row, out);
            }
            return;
        }

        let unit = self.sample_bytes;
        let pixel_stride = unit * self.channels;
        for (c, row) in channel_rows.iter().enumerate() {
            for (p, sample) in row.chunks_exact(unit).enumerate() {
                let start = p * pixel_stride + c * unit;
                if let Some(slot) = out.get_mut(start..start + unit) {
                    slot.copy_from_slice(sample);
                }
            }
        }
    }
}

#[inline]
fn copy_prefix(src: &[u8], dst: &mut [u8]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
}
