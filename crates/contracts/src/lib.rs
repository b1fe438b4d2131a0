//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the scanner core.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Line model
//! - A *native line* is one raw row as the sensor produced it
//! - An *output line* is one pixel-interleaved, skew-corrected, resampled row
//! - Bytes leave the core strictly in scan order

mod error;
mod geometry;
mod profile;
mod report;
mod scan_config;
mod transport;

pub use error::*;
pub use geometry::*;
pub use profile::*;
pub use report::*;
pub use scan_config::*;
pub use transport::*;
