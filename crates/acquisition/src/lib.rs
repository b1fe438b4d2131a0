//! # Acquisition
//!
//! Scan acquisition loop.
//!
//! Responsibilities:
//! - Drive the hardware `Transport` with up to two outstanding read requests
//! - Feed completed buffers through the `ReconstructionEngine` in scan order
//! - Push reconstructed rows into the `OutputChannel` with backpressure
//! - Cancellation that never blocks on the transport or a full output queue
//!
//! ## Usage Example
//!
//! ```ignore
//! use acquisition::{start, MockTransport};
//! use output::OutputChannel;
//!
//! let (writer, mut reader) = OutputChannel::bounded(8);
//! let transport = MockTransport::new(&config);
//! let handle = start(config, transport, writer)?;
//!
//! let image = reader.read_to_end().await;
//! let report = handle.join().await?;
//! ```

mod cancel;
mod error;
mod mock;
mod scan;
mod state;
mod stats;

// Re-exports
pub use cancel::CancelToken;
pub use contracts::{ScanConfig, ScanOutcome, ScanReport, Transport, TransportError};
pub use error::{Result, ScanError};
pub use mock::{document_sample, MockScanner, MockTransport, TransportEvent, TransportLog, FILLER};
pub use scan::{start, ScanHandle, ScanPlan};
pub use state::LoopState;
pub use stats::{AcquisitionMetrics, MetricsSnapshot};
