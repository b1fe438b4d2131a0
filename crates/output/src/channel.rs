//! Bounded output byte channel between the scan worker and its consumer.
//!
//! The writer half belongs to the acquisition worker, the reader half to the
//! consumer. Bytes arrive in scan order; the terminal status is set exactly
//! once, when the writer is closed (or dropped).

use std::sync::{Arc, OnceLock};

use async_channel::{Receiver, Sender, TryRecvError};
use bytes::{Buf, Bytes};
use contracts::OutputStatus;
use tracing::{debug, warn};

use crate::error::OutputError;
use crate::metrics::{MetricsSnapshot, OutputMetrics};

/// Default queue depth in chunks
pub const DEFAULT_CAPACITY: usize = 8;

#[derive(Debug, Default)]
struct Shared {
    status: OnceLock<OutputStatus>,
    metrics: OutputMetrics,
}

impl Shared {
    fn status(&self) -> OutputStatus {
        self.status.get().cloned().unwrap_or(OutputStatus::Open)
    }

    fn is_cancelled(&self) -> bool {
        matches!(self.status.get(), Some(OutputStatus::Cancelled))
    }
}

/// Output channel constructor
pub struct OutputChannel;

impl OutputChannel {
    /// Channel holding at most `capacity` chunks in flight
    pub fn bounded(capacity: usize) -> (OutputWriter, OutputReader) {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        let shared = Arc::new(Shared::default());
        (
            OutputWriter {
                tx,
                shared: Arc::clone(&shared),
                closed: false,
            },
            OutputReader {
                rx,
                pending: Bytes::new(),
                shared,
            },
        )
    }
}

/// Producer half
#[derive(Debug)]
pub struct OutputWriter {
    tx: Sender<Bytes>,
    shared: Arc<Shared>,
    closed: bool,
}

impl OutputWriter {
    /// Queue `chunk`, waiting while the channel is full
    ///
    /// Dropping the returned future abandons the chunk.
    ///
    /// # Errors
    /// `ReaderDropped` once the consumer is gone.
    pub async fn write(&mut self, chunk: Bytes) -> Result<(), OutputError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let len = chunk.len();
        self.tx
            .send(chunk)
            .await
            .map_err(|_| OutputError::ReaderDropped)?;
        self.shared.metrics.record_write(len);
        Ok(())
    }

    /// Set the terminal status and end the stream
    pub fn close(mut self, status: OutputStatus) {
        self.finish(status);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn bytes_written(&self) -> u64 {
        self.shared.metrics.bytes_written()
    }

    fn finish(&mut self, status: OutputStatus) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!(status = ?status, "output channel closed");
        if self.shared.status.set(status).is_err() {
            warn!("output status already set");
        }
        self.tx.close();
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        if !self.closed {
            self.finish(OutputStatus::Failed("producer dropped without closing".to_string()));
        }
    }
}

/// Consumer half
#[derive(Debug)]
pub struct OutputReader {
    rx: Receiver<Bytes>,
    /// Unread remainder of the current chunk
    pending: Bytes,
    shared: Arc<Shared>,
}

impl OutputReader {
    /// Read up to `buf.len()` bytes, waiting for data
    ///
    /// Returns 0 at end of stream, or immediately once the scan was cancelled.
    pub async fn read(&mut self, buf: &mut [u8]) -> usize {
        loop {
            if self.discard_if_cancelled() {
                return 0;
            }
            if !self.pending.is_empty() || buf.is_empty() {
                return self.copy_pending(buf);
            }
            match self.rx.recv().await {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return 0,
            }
        }
    }

    /// Blocking variant of [`read`](Self::read) for non-async consumers
    pub fn blocking_read(&mut self, buf: &mut [u8]) -> usize {
        loop {
            if self.discard_if_cancelled() {
                return 0;
            }
            if !self.pending.is_empty() || buf.is_empty() {
                return self.copy_pending(buf);
            }
            match self.rx.recv_blocking() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return 0,
            }
        }
    }

    /// Non-blocking read
    ///
    /// # Errors
    /// `WouldBlock` when the stream is still open but nothing is queued.
    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, OutputError> {
        loop {
            if self.discard_if_cancelled() {
                return Ok(0);
            }
            if !self.pending.is_empty() || buf.is_empty() {
                return Ok(self.copy_pending(buf));
            }
            match self.rx.try_recv() {
                Ok(chunk) => self.pending = chunk,
                Err(TryRecvError::Empty) => return Err(OutputError::WouldBlock),
                Err(TryRecvError::Closed) => return Ok(0),
            }
        }
    }

    /// Read everything until end of stream
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = self.read(&mut buf).await;
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Current channel status
    pub fn status(&self) -> OutputStatus {
        self.shared.status()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn copy_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        self.shared.metrics.record_read(n);
        n
    }

    fn discard_if_cancelled(&mut self) -> bool {
        if !self.shared.is_cancelled() {
            return false;
        }
        let mut discarded = self.pending.len();
        self.pending.clear();
        while let Ok(chunk) = self.rx.try_recv() {
            discarded += chunk.len();
        }
        if discarded > 0 {
            self.shared.metrics.record_discard(discarded);
        }
        true
    }
}
