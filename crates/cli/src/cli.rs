//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// linescan - flatbed scanner acquisition and line reconstruction
#[derive(Parser, Debug)]
#[command(
    name = "linescan",
    author,
    version,
    about = "Flatbed scanner acquisition and line reconstruction",
    long_about = "Drives a scan against the simulated scanner transport, reconstructs \n\
                  skew-corrected, resampled, pixel-interleaved rows and writes them \n\
                  as raw bytes or as an image."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LINESCAN_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "LINESCAN_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scan against the simulated scanner
    Run(RunArgs),

    /// Validate a profile without scanning
    Validate(ValidateArgs),

    /// Show the acquisition plan derived from a profile
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Scan profile (TOML or JSON)
    #[arg(short, long, default_value = "profile.toml", env = "LINESCAN_PROFILE")]
    pub profile: PathBuf,

    /// Output file; `.png`, `.pgm`, `.ppm` and `.pnm` are written as images, anything else as raw rows
    #[arg(short, long, env = "LINESCAN_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Simulated latency of one read request in milliseconds
    #[arg(long, default_value = "0", env = "LINESCAN_LATENCY_MS")]
    pub latency_ms: u64,

    /// Cancel the scan after this many milliseconds
    #[arg(long, env = "LINESCAN_CANCEL_AFTER_MS")]
    pub cancel_after_ms: Option<u64>,

    /// Simulated document length in native lines (shorter than the plan causes a shortfall)
    #[arg(long)]
    pub document_lines: Option<u64>,

    /// Output channel depth in chunks
    #[arg(long, default_value = "8", env = "LINESCAN_OUTPUT_CAPACITY")]
    pub output_capacity: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LINESCAN_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print the scan report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Profile to validate
    #[arg(short, long, default_value = "profile.toml", env = "LINESCAN_PROFILE")]
    pub profile: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Profile to describe
    #[arg(short, long, default_value = "profile.toml", env = "LINESCAN_PROFILE")]
    pub profile: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-channel settings
    #[arg(long)]
    pub channels: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
