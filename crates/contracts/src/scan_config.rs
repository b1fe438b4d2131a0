//! Scan configuration contracts shared by the acquisition loop and reconstruction engine.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{BitDepth, ContractError, ScanGeometry};

/// Per-channel sensor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ChannelConfig {
    /// Native lines this channel's sensor row trails the earliest one
    #[serde(default)]
    pub skew: u32,

    /// Native line rate (sensor resolution)
    #[validate(range(min = 1))]
    pub native_rate: u32,

    /// Requested line rate
    #[validate(range(min = 1))]
    pub target_rate: u32,
}

impl ChannelConfig {
    /// Channel with no skew and no resampling
    pub fn passthrough(rate: u32) -> Self {
        Self {
            skew: 0,
            native_rate: rate,
            target_rate: rate,
        }
    }
}

/// How channel samples are arranged inside one raw hardware line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawLayout {
    /// One contiguous block per channel: `R..R G..G B..B`
    #[default]
    ChannelMajor,
    /// Samples already interleaved per pixel: `RGB RGB ...`
    SampleInterleaved,
}

fn default_true() -> bool {
    true
}

/// Full configuration of one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ScanConfig {
    #[validate(nested)]
    pub geometry: ScanGeometry,

    /// One entry per output channel, in output order
    #[validate(length(min = 1, max = 3), nested)]
    pub channels: Vec<ChannelConfig>,

    #[serde(default)]
    pub raw_layout: RawLayout,

    /// Output channel carried at each raw position (`[1, 2, 0]` = hardware sends G, B, R)
    #[serde(default)]
    pub raw_channel_order: Option<Vec<usize>>,

    /// Reverse pixel order of every output row
    #[serde(default)]
    pub mirror: bool,

    /// Bitwise-invert every output byte
    #[serde(default)]
    pub invert: bool,

    /// Maximum native lines per hardware read request
    #[validate(range(min = 1))]
    pub line_budget: u32,

    /// Native lines to request in total (derived from geometry and rates when absent)
    #[serde(default)]
    pub native_lines: Option<u32>,

    /// Keep two reads outstanding; `false` falls back to one buffer
    #[serde(default = "default_true")]
    pub double_buffering: bool,

    /// Maximum native lines per hardware block
    #[serde(default)]
    #[validate(range(min = 1))]
    pub block_lines: Option<u32>,

    /// Strip height limit, caps the lines of a single request
    #[serde(default)]
    #[validate(range(min = 1))]
    pub strip_lines: Option<u32>,
}

impl ScanConfig {
    /// Validate field ranges and cross-field consistency
    ///
    /// # Errors
    /// Returns `ContractError::ConfigValidation` naming the offending field.
    pub fn check(&self) -> Result<(), ContractError> {
        self.validate()
            .map_err(|e| ContractError::config_validation("scan", e.to_string()))?;

        let geometry = &self.geometry;
        let channels = geometry.channel_count.get();

        if self.channels.len() != channels {
            return Err(ContractError::config_validation(
                "channels",
                format!(
                    "expected {channels} channel entries for channel_count, got {}",
                    self.channels.len()
                ),
            ));
        }

        if geometry.bit_depth == BitDepth::One && channels != 1 {
            return Err(ContractError::config_validation(
                "geometry.bit_depth",
                "1-bit scans must use a single channel",
            ));
        }

        let first = self.channels[0];
        for (i, ch) in self.channels.iter().enumerate().skip(1) {
            let lhs = u64::from(ch.native_rate) * u64::from(first.target_rate);
            let rhs = u64::from(first.native_rate) * u64::from(ch.target_rate);
            if lhs != rhs {
                return Err(ContractError::config_validation(
                    format!("channels[{i}]"),
                    format!(
                        "resampling ratio {}:{} differs from channel 0 ({}:{})",
                        ch.native_rate, ch.target_rate, first.native_rate, first.target_rate
                    ),
                ));
            }
        }

        self.check_raw_line()?;

        if let Some(order) = &self.raw_channel_order {
            let mut seen = vec![false; channels];
            if order.len() != channels {
                return Err(ContractError::config_validation(
                    "raw_channel_order",
                    format!("expected {channels} entries, got {}", order.len()),
                ));
            }
            for &c in order {
                if c >= channels || std::mem::replace(&mut seen[c], true) {
                    return Err(ContractError::config_validation(
                        "raw_channel_order",
                        format!("{order:?} is not a permutation of 0..{channels}"),
                    ));
                }
            }
        }

        if let Some(native) = self.native_lines {
            if native <= self.max_skew() {
                return Err(ContractError::config_validation(
                    "native_lines",
                    format!(
                        "{native} native lines cannot clear the largest skew of {}",
                        self.max_skew()
                    ),
                ));
            }
        }

        if let Some(block) = self.block_lines {
            if block < self.buffer_lines() {
                return Err(ContractError::config_validation(
                    "block_lines",
                    format!(
                        "block of {block} lines is smaller than one {}-line request",
                        self.buffer_lines()
                    ),
                ));
            }
        }

        Ok(())
    }

    fn check_raw_line(&self) -> Result<(), ContractError> {
        let geometry = &self.geometry;
        let bpl = geometry.bytes_per_raw_line as usize;
        let channels = geometry.channel_count.get();
        let row = geometry.channel_row_bytes();

        match self.raw_layout {
            RawLayout::ChannelMajor => {
                if bpl % channels != 0 {
                    return Err(ContractError::config_validation(
                        "geometry.bytes_per_raw_line",
                        format!("{bpl} is not divisible into {channels} channel blocks"),
                    ));
                }
                if bpl / channels < row {
                    return Err(ContractError::config_validation(
                        "geometry.bytes_per_raw_line",
                        format!("channel block of {} bytes is shorter than a {row}-byte row", bpl / channels),
                    ));
                }
            }
            RawLayout::SampleInterleaved => {
                if bpl < row * channels {
                    return Err(ContractError::config_validation(
                        "geometry.bytes_per_raw_line",
                        format!("{bpl} bytes cannot hold {} interleaved samples", row * channels),
                    ));
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn max_skew(&self) -> u32 {
        self.channels.iter().map(|c| c.skew).max().unwrap_or(0)
    }

    /// Skew spread, also the pending row capacity per channel
    #[inline]
    pub fn skew_spread(&self) -> u32 {
        let min = self.channels.iter().map(|c| c.skew).min().unwrap_or(0);
        self.max_skew() - min
    }

    /// Raw position of each output channel
    pub fn channel_positions(&self) -> Vec<usize> {
        let channels = self.geometry.channel_count.get();
        let mut positions: Vec<usize> = (0..channels).collect();
        if let Some(order) = &self.raw_channel_order {
            for (pos, &c) in order.iter().enumerate() {
                if let Some(slot) = positions.get_mut(c) {
                    *slot = pos;
                }
            }
        }
        positions
    }

    /// Lines per raw buffer: the line budget capped by the strip height
    pub fn buffer_lines(&self) -> u32 {
        match self.strip_lines {
            Some(strip) => self.line_budget.min(strip),
            None => self.line_budget,
        }
    }

    /// Reads kept in flight
    pub fn buffer_depth(&self) -> usize {
        if self.double_buffering {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelCount;

    fn colour_config() -> ScanConfig {
        ScanConfig {
            geometry: ScanGeometry {
                pixels_per_line: 4,
                total_output_lines: 10,
                bytes_per_raw_line: 12,
                channel_count: ChannelCount::Three,
                bit_depth: BitDepth::Eight,
            },
            channels: vec![
                ChannelConfig { skew: 0, native_rate: 600, target_rate: 300 },
                ChannelConfig { skew: 2, native_rate: 600, target_rate: 300 },
                ChannelConfig { skew: 5, native_rate: 600, target_rate: 300 },
            ],
            raw_layout: RawLayout::ChannelMajor,
            raw_channel_order: None,
            mirror: false,
            invert: false,
            line_budget: 4,
            native_lines: None,
            double_buffering: true,
            block_lines: None,
            strip_lines: None,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = colour_config();
        assert!(config.check().is_ok());
        assert_eq!(config.skew_spread(), 5);
        assert_eq!(config.buffer_depth(), 2);
    }

    #[test]
    fn test_block_must_hold_one_request() {
        let mut config = colour_config();
        config.block_lines = Some(3);
        let err = config.check().unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { ref field, .. } if field == "block_lines"));

        config.block_lines = Some(4);
        assert!(config.check().is_ok());

        // the strip height caps the request size
        config.block_lines = Some(3);
        config.strip_lines = Some(2);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut config = colour_config();
        config.channels[1].target_rate = 0;
        assert!(config.check().is_err());
    }

    #[test]
    fn test_channel_count_mismatch() {
        let mut config = colour_config();
        config.channels.pop();
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("channels"));
    }

    #[test]
    fn test_unequal_ratio_rejected() {
        let mut config = colour_config();
        config.channels[2].target_rate = 600;
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("channels[2]"));
    }

    #[test]
    fn test_equivalent_ratio_accepted() {
        let mut config = colour_config();
        config.channels[2] = ChannelConfig { skew: 5, native_rate: 200, target_rate: 100 };
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_raw_line_too_short() {
        let mut config = colour_config();
        config.geometry.bytes_per_raw_line = 9;
        assert!(config.check().is_err());

        config.geometry.bytes_per_raw_line = 13;
        assert!(config.check().is_err(), "not divisible into channel blocks");

        config.raw_layout = RawLayout::SampleInterleaved;
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_channel_order() {
        let mut config = colour_config();
        config.raw_channel_order = Some(vec![1, 2, 0]);
        assert!(config.check().is_ok());
        // G at 0, B at 1, R at 2
        assert_eq!(config.channel_positions(), vec![2, 0, 1]);

        config.raw_channel_order = Some(vec![1, 1, 0]);
        assert!(config.check().is_err());
    }

    #[test]
    fn test_lineart_requires_one_channel() {
        let mut config = colour_config();
        config.geometry.bit_depth = BitDepth::One;
        assert!(config.check().is_err());
    }

    #[test]
    fn test_native_lines_must_clear_skew() {
        let mut config = colour_config();
        config.native_lines = Some(5);
        assert!(config.check().is_err());
        config.native_lines = Some(6);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_strip_caps_buffer_lines() {
        let mut config = colour_config();
        config.strip_lines = Some(3);
        assert_eq!(config.buffer_lines(), 3);
        config.double_buffering = false;
        assert_eq!(config.buffer_depth(), 1);
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{
            "geometry": {"pixels_per_line": 4, "total_output_lines": 2, "bytes_per_raw_line": 4,
                         "channel_count": 1, "bit_depth": 8},
            "channels": [{"native_rate": 300, "target_rate": 300}],
            "line_budget": 8
        }"#;
        let config: ScanConfig = serde_json::from_str(json).unwrap();
        assert!(config.double_buffering);
        assert_eq!(config.raw_layout, RawLayout::ChannelMajor);
        assert_eq!(config.channels[0].skew, 0);
        assert!(config.check().is_ok());
    }
}
