//! Drives one scan against the simulated scanner and consumes its output.

use std::future::Future;
use std::time::{Duration, Instant};

use acquisition::{MockTransport, ScanError};
use contracts::{OutputStatus, ScanProfile, ScanReport};
use observability::RunningStats;
use output::OutputChannel;
use tracing::{info, warn};

/// Session knobs not stored in the profile
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Simulated completion latency per request
    pub latency: Duration,
    /// Cancel after this long
    pub cancel_after: Option<Duration>,
    /// Simulated document length in native lines
    pub document_lines: Option<u64>,
    /// Output channel depth in chunks
    pub output_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            cancel_after: None,
            document_lines: None,
            output_capacity: output::DEFAULT_CAPACITY,
        }
    }
}

/// What a session produced
#[derive(Debug)]
pub struct SessionResult {
    /// Report, or the fatal error
    pub outcome: Result<ScanReport, ScanError>,
    /// Every byte the consumer received, in scan order
    pub data: Vec<u8>,
    /// Final output channel status
    pub status: OutputStatus,
    pub elapsed: Duration,
    /// Consumer read sizes
    pub reads: RunningStats,
}

impl SessionResult {
    /// Complete rows contained in `data`
    pub fn rows(&self, row_bytes: usize) -> usize {
        if row_bytes == 0 {
            0
        } else {
            self.data.len() / row_bytes
        }
    }
}

/// One scan from profile to collected bytes
pub struct ScanSession {
    profile: ScanProfile,
    options: SessionOptions,
}

impl ScanSession {
    pub fn new(profile: ScanProfile, options: SessionOptions) -> Self {
        Self { profile, options }
    }

    /// Run the scan until it ends or `shutdown` resolves
    ///
    /// `shutdown` and the `cancel_after` timer both cancel the scan; the
    /// consumer keeps reading until the channel reports end of stream.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> SessionResult {
        let started = Instant::now();
        let scan = self.profile.scan;

        let mut transport = MockTransport::new(&scan).with_latency(self.options.latency);
        if let Some(lines) = self.options.document_lines {
            transport = transport.deliver_lines(lines);
        }

        let (writer, mut reader) = OutputChannel::bounded(self.options.output_capacity);
        let handle = match acquisition::start(scan, transport, writer) {
            Ok(handle) => handle,
            Err(e) => {
                return SessionResult {
                    outcome: Err(e),
                    data: Vec::new(),
                    status: reader.status(),
                    elapsed: started.elapsed(),
                    reads: RunningStats::default(),
                }
            }
        };

        let plan = handle.plan();
        info!(
            profile = %self.profile.name,
            native_lines = plan.native_lines,
            buffer_lines = plan.buffer_lines,
            depth = plan.depth,
            "scan session started"
        );

        let token = handle.cancel_token();
        let cancel_after = self.options.cancel_after;
        let canceller = tokio::spawn(async move {
            let timer = async {
                match cancel_after {
                    Some(after) => tokio::time::sleep(after).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = timer => info!("cancel timer fired"),
                _ = shutdown => warn!("shutdown requested, cancelling scan"),
            }
            token.cancel();
        });

        let mut data = Vec::new();
        let mut reads = RunningStats::default();
        let mut buf = vec![0u8; plan.buffer_bytes().max(4096)];
        loop {
            let n = reader.read(&mut buf).await;
            if n == 0 {
                break;
            }
            reads.push(n as f64);
            observability::record_consumer_read(n);
            data.extend_from_slice(&buf[..n]);
        }

        let outcome = handle.join().await;
        canceller.abort();

        SessionResult {
            outcome,
            data,
            status: reader.status(),
            elapsed: started.elapsed(),
            reads,
        }
    }
}
