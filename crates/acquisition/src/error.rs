//! Acquisition 错误类型

use contracts::{ContractError, TransportError};
use reconstruction::ReconstructionError;
use thiserror::Error;

/// Scan failure
#[derive(Debug, Error)]
pub enum ScanError {
    /// 配置非法（在任何 Transport 调用之前拒绝）
    #[error("configuration error: {0}")]
    Configuration(#[from] ContractError),

    /// Transport 失败，原样传递
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// 重建引擎内部错误
    #[error("reconstruction error: {0}")]
    Reconstruction(ReconstructionError),

    /// Worker 任务异常退出
    #[error("scan worker panicked: {0}")]
    WorkerPanicked(String),
}

impl From<ReconstructionError> for ScanError {
    fn from(err: ReconstructionError) -> Self {
        match err {
            ReconstructionError::Config(e) => Self::Configuration(e),
            other => Self::Reconstruction(other),
        }
    }
}

/// Acquisition Result 类型别名
pub type Result<T> = std::result::Result<T, ScanError>;
