//! Error types for CLI operations.

use std::path::PathBuf;

use acquisition::ScanError;
use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Profile file not found
    #[error("profile not found: {}", path.display())]
    ProfileNotFound { path: PathBuf },

    /// Profile failed to load
    #[error("failed to load profile {}: {source}", path.display())]
    Profile {
        path: PathBuf,
        #[source]
        source: ContractError,
    },

    /// Scan ended with an error
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    /// Scan data could not be encoded as an image
    #[error("cannot write image {}: {message}", path.display())]
    Image { path: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn image(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Image {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Short label for failure metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProfileNotFound { .. } | Self::Profile { .. } => "profile",
            Self::Scan(ScanError::Configuration(_)) => "configuration",
            Self::Scan(ScanError::Transport(_)) => "transport",
            Self::Scan(ScanError::Reconstruction(_)) => "reconstruction",
            Self::Scan(ScanError::WorkerPanicked(_)) => "panic",
            Self::Image { .. } | Self::Io(_) => "output",
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Load a profile, distinguishing a missing file from a bad one
pub fn load_profile(path: &std::path::Path) -> Result<contracts::ScanProfile> {
    if !path.exists() {
        return Err(CliError::ProfileNotFound {
            path: path.to_path_buf(),
        });
    }
    config_loader::ConfigLoader::load_from_path(path).map_err(|source| CliError::Profile {
        path: path.to_path_buf(),
        source,
    })
}
