//! Scan session: one scan from profile to written output.

mod runner;
mod writer;

pub use runner::{ScanSession, SessionOptions, SessionResult};
pub use writer::{write_output, OutputKind};
