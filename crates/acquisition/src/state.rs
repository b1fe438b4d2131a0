//! Acquisition loop states.

use std::fmt;

/// Loop state, observable through the scan handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    /// Entering read requests
    Requesting,
    /// Waiting for the oldest outstanding request
    Waiting,
    /// Running the reconstruction engine over a returned buffer
    Reconstructing,
    /// Everything requested; settling the report
    Draining,
    Completed,
    Cancelled,
    Failed,
}

impl LoopState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Requesting => "requesting",
            Self::Waiting => "waiting",
            Self::Reconstructing => "reconstructing",
            Self::Draining => "draining",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
