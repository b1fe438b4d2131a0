//! Output channel status and end-of-scan report.

use serde::{Deserialize, Serialize};

/// Output channel state as seen by the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum OutputStatus {
    /// Producer still running
    Open,
    Completed,
    Cancelled,
    Failed(String),
}

impl OutputStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// How a scan that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed,
    Cancelled,
}

/// Fewer rows than requested were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineShortfall {
    pub expected: u32,
    pub emitted: u32,
}

impl LineShortfall {
    #[inline]
    pub fn missing(&self) -> u32 {
        self.expected.saturating_sub(self.emitted)
    }
}

/// End-of-scan accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub outcome: ScanOutcome,

    /// Output rows written
    pub emitted_lines: u32,

    /// Output rows requested by the geometry
    pub expected_lines: u32,

    /// Set when a completed scan produced fewer rows than expected
    pub shortfall: Option<LineShortfall>,

    /// Native lines entered into read requests
    pub native_lines_requested: u64,

    /// Native lines actually delivered by the transport
    pub native_lines_received: u64,

    pub requests_issued: u64,

    pub blocks_started: u64,

    pub bytes_written: u64,

    /// Channel rows still waiting for siblings when the scan ended
    pub pending_rows_discarded: u64,
}

impl ScanReport {
    /// Empty report for a scan that produced nothing yet
    pub fn new(outcome: ScanOutcome, expected_lines: u32) -> Self {
        Self {
            outcome,
            emitted_lines: 0,
            expected_lines,
            shortfall: None,
            native_lines_requested: 0,
            native_lines_received: 0,
            requests_issued: 0,
            blocks_started: 0,
            bytes_written: 0,
            pending_rows_discarded: 0,
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.outcome == ScanOutcome::Completed && self.shortfall.is_none()
    }
}
