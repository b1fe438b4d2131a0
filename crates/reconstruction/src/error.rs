//! Reconstruction error types

use thiserror::Error;

/// Reconstruction-specific errors
///
/// Any of these ends the scan as failed; none is caused by sensor data content.
#[derive(Debug, Error)]
pub enum ReconstructionError {
    /// Pending rows exceeded the skew spread
    #[error("pending ring overflow on channel {channel} (capacity {capacity} rows)")]
    RingOverflow { channel: usize, capacity: usize },

    /// Caller claimed more rows than the buffer holds
    #[error("raw input holds {actual} bytes, {lines} lines need {expected}")]
    ShortInput {
        lines: usize,
        expected: usize,
        actual: usize,
    },

    /// Configuration rejected before the engine was built
    #[error("invalid scan configuration: {0}")]
    Config(#[from] contracts::ContractError),
}
