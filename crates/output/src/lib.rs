//! # Output
//!
//! 扫描输出通道。
//!
//! 负责：
//! - 按扫描顺序把重建后的字节交给消费者
//! - 有界队列背压
//! - 终止状态（Completed / Cancelled / Failed）只设置一次
//!
//! ## 使用示例
//!
//! ```ignore
//! use output::OutputChannel;
//!
//! let (writer, mut reader) = OutputChannel::bounded(8);
//! let handle = acquisition::start(config, transport, writer)?;
//!
//! let mut buf = vec![0u8; 4096];
//! while reader.read(&mut buf).await > 0 {
//!     // consume bytes
//! }
//! println!("{:?}", reader.status());
//! ```

pub mod channel;
pub mod error;
pub mod metrics;

pub use channel::{OutputChannel, OutputReader, OutputWriter, DEFAULT_CAPACITY};
pub use contracts::OutputStatus;
pub use error::OutputError;
pub use metrics::{MetricsSnapshot, OutputMetrics};
