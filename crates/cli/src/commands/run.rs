//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::{load_profile, CliError};
use crate::session::{write_output, ScanSession, SessionOptions};
use observability::ScanSummary;

/// Execute the `run` command
pub async fn run_scan(args: &RunArgs) -> Result<()> {
    info!(profile = %args.profile.display(), "Loading profile");
    let profile = load_profile(&args.profile)?;
    let geometry = profile.scan.geometry.clone();

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let options = SessionOptions {
        latency: Duration::from_millis(args.latency_ms),
        cancel_after: args.cancel_after_ms.map(Duration::from_millis),
        document_lines: args.document_lines,
        output_capacity: args.output_capacity,
    };

    info!(
        profile = %profile.name,
        lines = geometry.total_output_lines,
        pixels = geometry.pixels_per_line,
        "Starting scan"
    );
    let result = ScanSession::new(profile, options)
        .run(shutdown_signal())
        .await;

    let report = match result.outcome {
        Ok(report) => report,
        Err(e) => {
            let err = CliError::from(e);
            observability::record_scan_failure(err.kind());
            return Err(err).context("Scan did not finish");
        }
    };
    observability::record_scan_report(&report, result.elapsed);

    if let Some(ref path) = args.output {
        if result.data.is_empty() {
            warn!(path = %path.display(), "no data received, output not written");
        } else {
            let (kind, rows) = write_output(path, &result.data, &geometry)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), ?kind, rows, "Output saved");
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    } else {
        print!("{}", ScanSummary::new(report, result.elapsed, &result.reads));
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
