//! Output channel error types

use thiserror::Error;

/// Output channel errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// Consumer dropped its reader; nobody will see further bytes
    #[error("output reader dropped")]
    ReaderDropped,

    /// Non-blocking read found nothing queued yet
    #[error("no output available yet")]
    WouldBlock,
}
