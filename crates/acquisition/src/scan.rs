//! Double-buffered acquisition loop.
//!
//! One worker task per scan. Up to two read requests are outstanding while the
//! previous buffer is reconstructed; a buffer only reaches the engine after its
//! request completed, because until then the transport owns it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use contracts::{
    AcquisitionRequest, ContractError, OutputStatus, RawBuffer, ReadCompletion, ScanConfig, ScanOutcome,
    ScanReport, Transport,
};
use output::OutputWriter;
use reconstruction::{required_native_lines, EngineState, ReconstructionEngine};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::cancel::CancelToken;
use crate::error::{Result, ScanError};
use crate::stats::{AcquisitionMetrics, MetricsSnapshot};
use crate::state::LoopState;

/// Request plan derived from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPlan {
    /// Native lines to request in total
    pub native_lines: u64,
    /// Lines per raw buffer
    pub buffer_lines: u32,
    /// Native lines per hardware block
    pub block_lines: u64,
    /// Reads kept in flight
    pub depth: usize,
    pub bytes_per_line: usize,
}

impl ScanPlan {
    pub fn from_config(config: &ScanConfig) -> Self {
        let native_lines = config
            .native_lines
            .map(u64::from)
            .unwrap_or_else(|| required_native_lines(config));
        Self {
            native_lines,
            buffer_lines: config.buffer_lines(),
            block_lines: config.block_lines.map(u64::from).unwrap_or(native_lines),
            depth: config.buffer_depth(),
            bytes_per_line: config.geometry.bytes_per_raw_line as usize,
        }
    }

    /// Bytes of one raw buffer
    pub fn buffer_bytes(&self) -> usize {
        self.buffer_lines as usize * self.bytes_per_line
    }

    /// Read requests a full scan issues; requests never straddle a block
    pub fn request_count(&self) -> u64 {
        let per_request = u64::from(self.buffer_lines.max(1));
        let block = self.block_lines.max(1);
        let full_blocks = self.native_lines / block;
        let tail = self.native_lines % block;
        full_blocks * block.div_ceil(per_request) + tail.div_ceil(per_request)
    }
}

/// How the request loop stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Drained,
    Cancelled,
    ReaderDropped,
}

/// Handle to a running scan
#[derive(Debug)]
pub struct ScanHandle {
    cancel: CancelToken,
    state: watch::Receiver<LoopState>,
    metrics: Arc<AcquisitionMetrics>,
    plan: ScanPlan,
    join: JoinHandle<Result<ScanReport>>,
}

impl ScanHandle {
    /// Request cancellation; never blocks
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token usable from other tasks or threads
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current loop state
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// State updates receiver
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn plan(&self) -> ScanPlan {
        self.plan
    }

    /// Wait for the worker and return its report
    ///
    /// # Errors
    /// The scan's fatal error, or `WorkerPanicked`.
    pub async fn join(self) -> Result<ScanReport> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(ScanError::WorkerPanicked(e.to_string())),
        }
    }
}

/// Start a scan on its own tokio task
///
/// Configuration is validated before the transport is touched; on error the
/// writer is closed as failed so no consumer is left waiting.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
/// `ScanError::Configuration` for an invalid configuration.
#[instrument(name = "acquisition_start", skip_all, fields(transport = transport.name()))]
pub fn start<T>(config: ScanConfig, transport: T, writer: OutputWriter) -> Result<ScanHandle>
where
    T: Transport + 'static,
{
    let engine = match ReconstructionEngine::new(&config) {
        Ok(engine) => engine,
        Err(e) => return Err(reject(writer, ScanError::from(e))),
    };

    let plan = ScanPlan::from_config(&config);
    let buffers = match allocate_buffers(&plan) {
        Ok(buffers) => buffers,
        Err(e) => return Err(reject(writer, e)),
    };
    let cancel = CancelToken::new();
    let (state_tx, state_rx) = watch::channel(LoopState::Init);
    let metrics = Arc::new(AcquisitionMetrics::new());

    info!(
        native_lines = plan.native_lines,
        output_lines = config.geometry.total_output_lines,
        buffer_lines = plan.buffer_lines,
        depth = plan.depth,
        "scan starting"
    );

    let worker = AcquisitionLoop {
        transport,
        engine,
        plan,
        buffers,
        expected_lines: config.geometry.total_output_lines,
        cancel: cancel.clone(),
        state: state_tx,
        metrics: Arc::clone(&metrics),
        report: ScanReport::new(ScanOutcome::Completed, config.geometry.total_output_lines),
    };
    let join = tokio::spawn(worker.run(writer));

    Ok(ScanHandle {
        cancel,
        state: state_rx,
        metrics,
        plan,
        join,
    })
}

/// Close the output as failed and hand the error back
fn reject(writer: OutputWriter, err: ScanError) -> ScanError {
    warn!(error = %err, "scan rejected");
    writer.close(OutputStatus::Failed(err.to_string()));
    err
}

/// The raw buffer pool: one buffer per read kept in flight
fn allocate_buffers(plan: &ScanPlan) -> Result<VecDeque<RawBuffer>> {
    (0..plan.depth)
        .map(|slot| {
            RawBuffer::try_new(slot, plan.buffer_lines as usize, plan.bytes_per_line).map_err(|e| {
                ScanError::Configuration(ContractError::config_validation(
                    "line_budget",
                    format!(
                        "{} lines of {} bytes cannot be allocated: {e}",
                        plan.buffer_lines, plan.bytes_per_line
                    ),
                ))
            })
        })
        .collect()
}

struct AcquisitionLoop<T> {
    transport: T,
    engine: ReconstructionEngine,
    plan: ScanPlan,
    /// Free raw buffers, moved into the request loop
    buffers: VecDeque<RawBuffer>,
    expected_lines: u32,
    cancel: CancelToken,
    state: watch::Sender<LoopState>,
    metrics: Arc<AcquisitionMetrics>,
    report: ScanReport,
}

impl<T: Transport> AcquisitionLoop<T> {
    async fn run(mut self, mut writer: OutputWriter) -> Result<ScanReport> {
        let started = Instant::now();
        let flow = self.drive(&mut writer).await;

        let summary = self.engine.finish();
        self.report.emitted_lines = summary.emitted;
        self.report.pending_rows_discarded = summary.pending_discarded;
        self.report.bytes_written = writer.bytes_written();

        match flow {
            Ok(Flow::Drained) => {
                self.set_state(LoopState::Draining);
                self.report.outcome = ScanOutcome::Completed;
                self.report.shortfall = summary.shortfall;
                if let Some(shortfall) = summary.shortfall {
                    warn!(
                        expected = shortfall.expected,
                        emitted = shortfall.emitted,
                        "scan ended short of the requested lines"
                    );
                    metrics::counter!("linescan_line_shortfall_total")
                        .increment(u64::from(shortfall.missing()));
                }
                writer.close(OutputStatus::Completed);
                self.set_state(LoopState::Completed);
                info!(
                    emitted = summary.emitted,
                    expected = self.expected_lines,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "scan completed"
                );
                Ok(self.report)
            }
            Ok(flow) => {
                self.transport.cancel_hint();
                self.report.outcome = ScanOutcome::Cancelled;
                writer.close(OutputStatus::Cancelled);
                self.set_state(LoopState::Cancelled);
                info!(
                    emitted = summary.emitted,
                    reader_dropped = flow == Flow::ReaderDropped,
                    "scan cancelled"
                );
                Ok(self.report)
            }
            Err(e) => {
                self.transport.cancel_hint();
                error!(error = %e, emitted = summary.emitted, "scan failed");
                writer.close(OutputStatus::Failed(e.to_string()));
                self.set_state(LoopState::Failed);
                Err(e)
            }
        }
    }

    #[instrument(
        name = "acquisition_loop",
        skip_all,
        fields(transport = self.transport.name(), native_lines = self.plan.native_lines)
    )]
    async fn drive(&mut self, writer: &mut OutputWriter) -> Result<Flow> {
        let plan = self.plan;
        let mut free = std::mem::take(&mut self.buffers);
        let mut in_flight: VecDeque<AcquisitionRequest> = VecDeque::with_capacity(plan.depth);
        let mut issued: u64 = 0;
        let mut block_left: u64 = 0;
        let mut out = BytesMut::new();

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }

            if issued < plan.native_lines && !free.is_empty() {
                // a new block starts only once the previous one is drained
                if block_left == 0 && in_flight.is_empty() {
                    let lines = plan.block_lines.min(plan.native_lines - issued);
                    let lines = u32::try_from(lines).unwrap_or(u32::MAX);
                    self.set_state(LoopState::Requesting);
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Ok(Flow::Cancelled),
                        r = self.transport.begin_block(lines) => r?,
                    }
                    block_left = u64::from(lines);
                    self.report.blocks_started += 1;
                    debug!(lines, block = self.report.blocks_started, "block started");
                }

                if block_left > 0 {
                    if let Some(buffer) = free.pop_front() {
                        let lines = u64::from(plan.buffer_lines).min(block_left) as u32;
                        let slot = buffer.slot();
                        self.set_state(LoopState::Requesting);
                        let request = tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => return Ok(Flow::Cancelled),
                            r = self.transport.issue_read(buffer, lines) => r?,
                        };

                        // lines count as requested whether or not they arrive
                        issued += u64::from(lines);
                        block_left -= u64::from(lines);
                        self.report.requests_issued += 1;
                        self.report.native_lines_requested = issued;
                        self.metrics.record_issued(lines);
                        metrics::counter!("linescan_requests_total").increment(1);
                        debug!(request_id = request.id, slot, lines, issued, "read request entered");

                        in_flight.push_back(request);
                        continue;
                    }
                }
            }

            let Some(request) = in_flight.pop_front() else {
                return Ok(Flow::Drained);
            };

            self.set_state(LoopState::Waiting);
            let request_id = request.id;
            let expected = request.expected_line_count;
            let waited = Instant::now();
            let completion = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Flow::Cancelled),
                r = self.transport.wait(request) => r?,
            };
            metrics::histogram!("linescan_request_wait_ms")
                .record(waited.elapsed().as_secs_f64() * 1000.0);

            self.set_state(LoopState::Reconstructing);
            let rows = self.reconstruct(request_id, expected, &completion, &mut out)?;
            free.push_back(completion.buffer);

            if !out.is_empty() {
                let chunk = out.split().freeze();
                let bytes = chunk.len();
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(Flow::Cancelled),
                    r = writer.write(chunk) => {
                        if r.is_err() {
                            debug!("output reader dropped, stopping scan");
                            return Ok(Flow::ReaderDropped);
                        }
                    }
                }
                trace!(request_id, rows, bytes, "output written");
            }
        }
    }

    fn reconstruct(
        &mut self,
        request_id: u64,
        expected: u32,
        completion: &ReadCompletion,
        out: &mut BytesMut,
    ) -> Result<usize> {
        let lines = completion.lines_read().min(expected as usize);
        let short = lines < expected as usize;

        if completion.partial_bytes() > 0 {
            warn!(
                request_id,
                partial_bytes = completion.partial_bytes(),
                "dropping trailing partial raw line"
            );
        }
        if short {
            warn!(request_id, expected, delivered = lines, "short read");
        }

        self.metrics.record_completed(lines, short);
        self.report.native_lines_received += lines as u64;
        metrics::counter!("linescan_native_lines_total").increment(lines as u64);

        let rows = self
            .engine
            .process(completion.buffer.as_bytes(), lines, out)
            .map_err(ScanError::from)?;

        self.metrics.record_emitted(rows);
        metrics::counter!("linescan_lines_emitted_total").increment(rows as u64);
        if rows > 0 && self.engine.state() == EngineState::Exhausted {
            debug!(request_id, "every output row emitted, draining remaining requests");
        }
        trace!(request_id, lines, rows, emitted = self.engine.emitted_lines(), "buffer reconstructed");
        Ok(rows)
    }

    fn set_state(&self, state: LoopState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}
