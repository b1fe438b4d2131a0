//! Transport trait - hardware read interface consumed by the acquisition loop
//!
//! The loop hands a [`RawBuffer`] to the transport with every read request and gets
//! it back from [`LocalTransport::wait`]. While a request is outstanding the buffer
//! is owned by the transport, so nothing else can look at half-filled memory.

use std::collections::TryReserveError;

use thiserror::Error;

/// Transport failure, propagated verbatim to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(String),

    #[error("transport timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    #[error("device busy")]
    DeviceBusy,

    #[error("document feeder jammed")]
    Jammed,

    #[error("no document loaded")]
    NoDocument,

    #[error("scanner cover open")]
    CoverOpen,
}

impl TransportError {
    /// Create io error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}

/// Fixed-size raw line buffer
///
/// Row views are bounds-checked slices of `bytes_per_line` bytes.
#[derive(Debug)]
pub struct RawBuffer {
    slot: usize,
    bytes_per_line: usize,
    data: Vec<u8>,
}

impl RawBuffer {
    /// Allocate a zeroed buffer for `line_capacity` raw lines
    pub fn new(slot: usize, line_capacity: usize, bytes_per_line: usize) -> Self {
        Self {
            slot,
            bytes_per_line,
            data: vec![0; line_capacity * bytes_per_line],
        }
    }

    /// Fallible [`new`](Self::new) for sizes taken from configuration
    ///
    /// # Errors
    /// The allocation cannot be made; a size overflowing `usize` reports as
    /// capacity overflow.
    pub fn try_new(slot: usize, line_capacity: usize, bytes_per_line: usize) -> Result<Self, TryReserveError> {
        let len = line_capacity.checked_mul(bytes_per_line).unwrap_or(usize::MAX);
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, 0);
        Ok(Self {
            slot,
            bytes_per_line,
            data,
        })
    }

    /// Pool slot this buffer belongs to
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    #[inline]
    pub fn line_capacity(&self) -> usize {
        if self.bytes_per_line == 0 {
            0
        } else {
            self.data.len() / self.bytes_per_line
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Raw line `index`, if inside the buffer
    pub fn line_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let start = index.checked_mul(self.bytes_per_line)?;
        self.data.get_mut(start..start + self.bytes_per_line)
    }
}

/// Handle to an outstanding read
///
/// Not `Clone`: it is consumed exactly once by [`LocalTransport::wait`].
#[derive(Debug, PartialEq, Eq)]
pub struct AcquisitionRequest {
    /// Transport-assigned request id
    pub id: u64,
    /// Lines asked for
    pub expected_line_count: u32,
    /// Bytes asked for
    pub expected_byte_count: usize,
}

impl AcquisitionRequest {
    pub fn new(id: u64, expected_line_count: u32, bytes_per_line: usize) -> Self {
        Self {
            id,
            expected_line_count,
            expected_byte_count: expected_line_count as usize * bytes_per_line,
        }
    }
}

/// Completed read: the buffer comes back with the number of valid bytes
#[derive(Debug)]
pub struct ReadCompletion {
    pub buffer: RawBuffer,
    pub bytes_read: usize,
}

impl ReadCompletion {
    /// Complete lines delivered
    #[inline]
    pub fn lines_read(&self) -> usize {
        let bpl = self.buffer.bytes_per_line();
        if bpl == 0 {
            0
        } else {
            self.bytes_read.min(self.buffer.as_bytes().len()) / bpl
        }
    }

    /// Trailing bytes that do not form a complete line
    #[inline]
    pub fn partial_bytes(&self) -> usize {
        let bpl = self.buffer.bytes_per_line();
        if bpl == 0 {
            0
        } else {
            self.bytes_read.min(self.buffer.as_bytes().len()) % bpl
        }
    }
}

/// Hardware transport
///
/// Implementations issue asynchronous line reads and complete them in issue order.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging)
    fn name(&self) -> &str;

    /// Start a hardware block covering `lines` native lines
    async fn begin_block(&mut self, lines: u32) -> Result<(), TransportError>;

    /// Enter a read request for up to `max_lines` lines into `buffer`
    ///
    /// # Errors
    /// Returns the transport failure; the buffer is lost with the scan.
    async fn issue_read(
        &mut self,
        buffer: RawBuffer,
        max_lines: u32,
    ) -> Result<AcquisitionRequest, TransportError>;

    /// Wait for `request` to complete and hand its buffer back
    async fn wait(&mut self, request: AcquisitionRequest) -> Result<ReadCompletion, TransportError>;

    /// Best-effort notice that outstanding requests were abandoned
    fn cancel_hint(&mut self);
}
