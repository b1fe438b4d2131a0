//! Mock 扫描仪 Transport
//!
//! 用于无硬件环境的测试与模拟扫描。
//!
//! The simulated sensor scans a synthetic document. Raw line `n` carries, for
//! channel `c`, document line `n - skew[c]` (or filler while the sensor row has
//! not reached the document yet), laid out exactly as the scan configuration
//! describes the hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{
    AcquisitionRequest, BitDepth, RawBuffer, RawLayout, ReadCompletion, ScanConfig,
    Transport, TransportError,
};
use reconstruction::{PostProcess, RateAccumulator, RowLayout};
use tracing::{debug, trace};

/// Filler byte for sensor rows still outside the document
pub const FILLER: u8 = 0xa5;

/// Synthetic document sample
#[inline]
pub fn document_sample(line: u64, channel: usize, pixel: usize) -> u16 {
    ((line * 131 + channel as u64 * 67 + pixel as u64 * 29 + 7) % 65_521) as u16
}

/// Renders document lines in the hardware's raw layout
#[derive(Debug, Clone)]
pub struct MockScanner {
    skews: Vec<u32>,
    positions: Vec<usize>,
    layout: RawLayout,
    bit_depth: BitDepth,
    pixels_per_line: usize,
    row_bytes: usize,
    bytes_per_line: usize,
    block_stride: usize,
}

impl MockScanner {
    pub fn new(config: &ScanConfig) -> Self {
        let geometry = &config.geometry;
        let channels = geometry.channel_count.get();
        Self {
            skews: config.channels.iter().map(|c| c.skew).collect(),
            positions: config.channel_positions(),
            layout: config.raw_layout,
            bit_depth: geometry.bit_depth,
            pixels_per_line: geometry.pixels_per_line as usize,
            row_bytes: geometry.channel_row_bytes(),
            bytes_per_line: geometry.bytes_per_raw_line as usize,
            block_stride: geometry.bytes_per_raw_line as usize / channels.max(1),
        }
    }

    #[inline]
    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    /// One channel's row of document line `line`
    pub fn render_channel_row(&self, line: u64, channel: usize, dst: &mut [u8]) {
        match self.bit_depth {
            BitDepth::One => {
                dst.fill(0);
                for p in 0..self.pixels_per_line {
                    if (document_sample(line, channel, p) >> 3) & 1 == 1 {
                        dst[p / 8] |= 0x80 >> (p % 8);
                    }
                }
            }
            BitDepth::Eight => {
                for (p, b) in dst.iter_mut().enumerate() {
                    *b = document_sample(line, channel, p) as u8;
                }
            }
            BitDepth::Sixteen => {
                for (p, pair) in dst.chunks_exact_mut(2).enumerate() {
                    pair.copy_from_slice(&document_sample(line, channel, p).to_be_bytes());
                }
            }
        }
    }

    /// Raw native line `n`
    pub fn render_raw_line(&self, n: u64, dst: &mut [u8]) {
        dst.fill(0);
        let mut row = vec![0u8; self.row_bytes];
        let channels = self.skews.len();
        let unit = self.bit_depth.sample_bytes();

        for (c, &skew) in self.skews.iter().enumerate() {
            match n.checked_sub(u64::from(skew)) {
                Some(line) => self.render_channel_row(line, c, &mut row),
                None => row.fill(FILLER),
            }
            let pos = self.positions.get(c).copied().unwrap_or(c);

            if channels == 1 || self.layout == RawLayout::ChannelMajor {
                let start = pos * self.block_stride;
                if let Some(slot) = dst.get_mut(start..start + self.row_bytes) {
                    slot.copy_from_slice(&row);
                }
            } else {
                for (p, sample) in row.chunks_exact(unit).enumerate() {
                    let start = (p * channels + pos) * unit;
                    if let Some(slot) = dst.get_mut(start..start + unit) {
                        slot.copy_from_slice(sample);
                    }
                }
            }
        }
    }

    /// Output a correct reconstruction produces from `native_lines` raw lines
    pub fn expected_output(config: &ScanConfig, native_lines: u64) -> Vec<u8> {
        let scanner = Self::new(config);
        let layout = RowLayout::from_config(config);
        let post = PostProcess::from_config(config);
        let total = config.geometry.total_output_lines as usize;
        let Some(first) = config.channels.first() else {
            return Vec::new();
        };

        let forwarded = native_lines.saturating_sub(u64::from(config.max_skew()));
        let mut acc = RateAccumulator::new(first.native_rate, first.target_rate);
        let mut channel_rows = vec![vec![0u8; layout.row_bytes()]; layout.channels()];
        let mut row = vec![0u8; config.geometry.output_row_bytes()];
        let mut out = Vec::with_capacity(total * row.len());

        let mut emitted = 0;
        for k in 0..forwarded {
            if emitted == total {
                break;
            }
            if !acc.step() {
                continue;
            }
            for (c, dst) in channel_rows.iter_mut().enumerate() {
                scanner.render_channel_row(k, c, dst);
            }
            layout.interleave(&channel_rows, &mut row);
            post.apply(&mut row);
            out.extend_from_slice(&row);
            emitted += 1;
        }
        out
    }
}

/// Transport call record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    BeginBlock { lines: u32 },
    Issue { id: u64, slot: usize, lines: u32 },
    Complete { id: u64, slot: usize, bytes: usize },
    CancelHint,
}

/// Shared event log of a mock transport
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    events: Arc<Mutex<Vec<TransportEvent>>>,
}

impl TransportLog {
    fn push(&self, event: TransportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Largest number of requests outstanding at once
    pub fn max_in_flight(&self) -> usize {
        let mut current = 0usize;
        let mut max = 0;
        for event in self.events() {
            match event {
                TransportEvent::Issue { .. } => {
                    current += 1;
                    max = max.max(current);
                }
                TransportEvent::Complete { .. } => current = current.saturating_sub(1),
                _ => {}
            }
        }
        max
    }

    pub fn count(&self, pred: impl Fn(&TransportEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

#[derive(Debug)]
struct PendingRead {
    id: u64,
    index: u64,
    buffer: RawBuffer,
    first_line: u64,
    lines: u32,
}

/// Simulated scanner transport
///
/// Completes requests in issue order after `latency`. Failure injection is
/// keyed by request index (0-based, in issue order).
#[derive(Debug)]
pub struct MockTransport {
    scanner: MockScanner,
    latency: Duration,
    fail_on: Option<(u64, TransportError)>,
    stall_on: Option<u64>,
    deliver_lines: Option<u64>,
    truncate: Option<(u64, usize)>,
    next_id: u64,
    issued: u64,
    next_line: u64,
    outstanding: VecDeque<PendingRead>,
    log: TransportLog,
}

impl MockTransport {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            scanner: MockScanner::new(config),
            latency: Duration::ZERO,
            fail_on: None,
            stall_on: None,
            deliver_lines: None,
            truncate: None,
            next_id: 1,
            issued: 0,
            next_line: 0,
            outstanding: VecDeque::new(),
            log: TransportLog::default(),
        }
    }

    /// Delay every completion
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the wait of request `index`
    pub fn fail_on_request(mut self, index: u64, error: TransportError) -> Self {
        self.fail_on = Some((index, error));
        self
    }

    /// Never complete request `index`
    pub fn stall_on_request(mut self, index: u64) -> Self {
        self.stall_on = Some(index);
        self
    }

    /// Device stops delivering after `lines` native lines
    pub fn deliver_lines(mut self, lines: u64) -> Self {
        self.deliver_lines = Some(lines);
        self
    }

    /// Request `index` delivers only `bytes` bytes
    pub fn truncate_request(mut self, index: u64, bytes: usize) -> Self {
        self.truncate = Some((index, bytes));
        self
    }

    /// Event log handle (clone before moving the transport into a scan)
    pub fn log(&self) -> TransportLog {
        self.log.clone()
    }

    fn fill(&self, read: &mut PendingRead) -> usize {
        let requested = u64::from(read.lines);
        let available = self
            .deliver_lines
            .map_or(requested, |limit| limit.saturating_sub(read.first_line).min(requested))
            as usize;

        for i in 0..available {
            if let Some(line) = read.buffer.line_mut(i) {
                self.scanner.render_raw_line(read.first_line + i as u64, line);
            }
        }

        let bytes = available * self.scanner.bytes_per_line();
        match self.truncate {
            Some((index, limit)) if index == read.index => bytes.min(limit),
            _ => bytes,
        }
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn begin_block(&mut self, lines: u32) -> Result<(), TransportError> {
        debug!(lines, "mock block started");
        self.log.push(TransportEvent::BeginBlock { lines });
        Ok(())
    }

    async fn issue_read(
        &mut self,
        buffer: RawBuffer,
        max_lines: u32,
    ) -> Result<AcquisitionRequest, TransportError> {
        let lines = max_lines.min(buffer.line_capacity() as u32);
        let id = self.next_id;
        self.next_id += 1;

        self.log.push(TransportEvent::Issue {
            id,
            slot: buffer.slot(),
            lines,
        });
        trace!(id, lines, first_line = self.next_line, "mock read entered");

        self.outstanding.push_back(PendingRead {
            id,
            index: self.issued,
            buffer,
            first_line: self.next_line,
            lines,
        });
        self.issued += 1;
        self.next_line += u64::from(lines);

        Ok(AcquisitionRequest::new(id, lines, self.scanner.bytes_per_line()))
    }

    async fn wait(&mut self, request: AcquisitionRequest) -> Result<ReadCompletion, TransportError> {
        match self.outstanding.front() {
            Some(front) if front.id == request.id => {}
            _ => {
                return Err(TransportError::io(format!(
                    "request {} is not the oldest outstanding read",
                    request.id
                )))
            }
        }

        let index = self.outstanding.front().map(|r| r.index).unwrap_or_default();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.stall_on == Some(index) {
            std::future::pending::<()>().await;
        }
        if let Some((fail_index, error)) = &self.fail_on {
            if *fail_index == index {
                return Err(error.clone());
            }
        }

        let Some(mut read) = self.outstanding.pop_front() else {
            return Err(TransportError::io("no outstanding read"));
        };
        let bytes_read = self.fill(&mut read);

        self.log.push(TransportEvent::Complete {
            id: read.id,
            slot: read.buffer.slot(),
            bytes: bytes_read,
        });

        Ok(ReadCompletion {
            buffer: read.buffer,
            bytes_read,
        })
    }

    fn cancel_hint(&mut self) {
        debug!(outstanding = self.outstanding.len(), "mock transport cancel hint");
        self.outstanding.clear();
        self.log.push(TransportEvent::CancelHint);
    }
}
