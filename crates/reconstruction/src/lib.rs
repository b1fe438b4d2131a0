//! # Reconstruction
//!
//! 扫描行重建引擎。
//!
//! 负责：
//! - 通道偏移（skew）消除
//! - 整数 DDA 行率重采样
//! - 多通道像素交织
//! - 行后处理（反相 / 镜像）
//!
//! ## 使用示例
//!
//! ```ignore
//! use reconstruction::ReconstructionEngine;
//! use bytes::BytesMut;
//!
//! let mut engine = ReconstructionEngine::new(&config)?;
//! let mut out = BytesMut::new();
//!
//! // Feed raw lines in scan order, any chunking
//! let rows = engine.process(raw, raw_lines, &mut out)?;
//!
//! let summary = engine.finish();
//! ```

mod engine;
mod error;
mod layout;
mod postprocess;
pub mod rate;
mod ring;
pub mod skew;

// Re-exports
pub use engine::{required_native_lines, EngineState, EngineSummary, ReconstructionEngine};
pub use error::ReconstructionError;
pub use layout::RowLayout;
pub use postprocess::{clear_padding_bits, invert, mirror_bits, mirror_pixels, PostProcess};
pub use rate::RateAccumulator;
pub use ring::PendingRing;
pub use skew::{SkewDecision, SkewTracker};

// Re-export contracts types
pub use contracts::{LineShortfall, ScanConfig};
