//! Main reconstruction engine implementation.

use bytes::BytesMut;
use contracts::{LineShortfall, ScanConfig};
use tracing::{debug, instrument};

use crate::error::ReconstructionError;
use crate::layout::RowLayout;
use crate::postprocess::PostProcess;
use crate::rate::{native_samples_for, RateAccumulator};
use crate::ring::PendingRing;
use crate::skew::{SkewDecision, SkewTracker};

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No output row complete yet (skew still clearing)
    Priming,
    /// Emitting rows
    Streaming,
    /// Every requested row emitted; further input is consumed silently
    Exhausted,
}

/// Result of [`ReconstructionEngine::finish`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSummary {
    pub emitted: u32,
    pub native_rows: u64,
    pub shortfall: Option<LineShortfall>,
    /// Channel rows dropped from the pending rings
    pub pending_discarded: u64,
}

/// Native lines a scan has to read to produce every output row
///
/// The slowest channel must clear its skew and then feed enough samples
/// through the accumulator.
pub fn required_native_lines(config: &ScanConfig) -> u64 {
    let total = config.geometry.total_output_lines;
    let per_channel = config
        .channels
        .first()
        .map(|c| native_samples_for(total, c.native_rate, c.target_rate))
        .unwrap_or(u64::from(total));
    u64::from(config.max_skew()) + per_channel
}

/// Skew-correcting, resampling line reconstructor
///
/// Feed raw lines in scan order through [`process`](Self::process); chunk
/// boundaries never change the output.
#[derive(Debug)]
pub struct ReconstructionEngine {
    layout: RowLayout,
    post: PostProcess,
    skew: SkewTracker,
    rates: Vec<RateAccumulator>,
    rings: Vec<PendingRing>,
    /// Channel rows produced so far, per channel
    row_index: Vec<u32>,
    /// Current raw line yielded a not-yet-stored row, per channel
    fresh: Vec<bool>,
    channel_rows: Vec<Vec<u8>>,
    out_row: Vec<u8>,
    bytes_per_raw_line: usize,
    total_lines: u32,
    emitted: u32,
    native_rows: u64,
}

impl ReconstructionEngine {
    /// Build an engine for one scan
    ///
    /// # Errors
    /// Configuration errors from [`ScanConfig::check`].
    pub fn new(config: &ScanConfig) -> Result<Self, ReconstructionError> {
        config.check()?;

        let layout = RowLayout::from_config(config);
        let channels = layout.channels();
        let row_bytes = layout.row_bytes();
        let spread = config.skew_spread() as usize;

        let rings = (0..channels)
            .map(|c| PendingRing::new(c, spread, row_bytes))
            .collect();
        let rates = config
            .channels
            .iter()
            .map(|c| RateAccumulator::new(c.native_rate, c.target_rate))
            .collect();
        let skews: Vec<u32> = config.channels.iter().map(|c| c.skew).collect();

        debug!(
            channels,
            row_bytes,
            ring_capacity = spread,
            total_lines = config.geometry.total_output_lines,
            "reconstruction engine created"
        );

        Ok(Self {
            post: PostProcess::from_config(config),
            skew: SkewTracker::new(skews),
            rates,
            rings,
            row_index: vec![0; channels],
            fresh: vec![false; channels],
            channel_rows: vec![vec![0; row_bytes]; channels],
            out_row: vec![0; config.geometry.output_row_bytes()],
            bytes_per_raw_line: config.geometry.bytes_per_raw_line as usize,
            total_lines: config.geometry.total_output_lines,
            emitted: 0,
            native_rows: 0,
            layout,
        })
    }

    /// Consume `raw_lines` raw lines from `raw`, appending complete rows to `out`
    ///
    /// Returns the number of output rows appended.
    ///
    /// # Errors
    /// `ShortInput` when `raw` holds fewer than `raw_lines` lines, `RingOverflow`
    /// if the pending rows ever outgrow the skew spread.
    #[instrument(
        level = "trace",
        name = "reconstruction_process",
        skip(self, raw, out),
        fields(emitted = self.emitted)
    )]
    pub fn process(
        &mut self,
        raw: &[u8],
        raw_lines: usize,
        out: &mut BytesMut,
    ) -> Result<usize, ReconstructionError> {
        let bpl = self.bytes_per_raw_line;
        let expected = raw_lines.saturating_mul(bpl);
        if raw.len() < expected {
            return Err(ReconstructionError::ShortInput {
                lines: raw_lines,
                expected,
                actual: raw.len(),
            });
        }

        let before = self.emitted;
        if bpl > 0 {
            out.reserve(raw_lines.min((self.total_lines - self.emitted) as usize) * self.out_row.len());
            for line in raw[..expected].chunks_exact(bpl) {
                self.consume_line(line, out)?;
            }
        }
        Ok((self.emitted - before) as usize)
    }

    fn consume_line(&mut self, raw: &[u8], out: &mut BytesMut) -> Result<(), ReconstructionError> {
        self.native_rows += 1;
        let channels = self.layout.channels();

        for c in 0..channels {
            self.fresh[c] = false;
            if self.skew.consider(c) == SkewDecision::Discard {
                continue;
            }
            if !self.rates[c].step() {
                continue;
            }
            if self.row_index[c] >= self.total_lines {
                continue;
            }
            self.fresh[c] = true;
            self.row_index[c] += 1;
        }

        // Every channel advances by at most one row per raw line, so at most one
        // output row completes here.
        let ready = self.row_index.iter().copied().min().unwrap_or(0);
        if ready > self.emitted {
            for c in 0..channels {
                if self.rings[c].pop_into(&mut self.channel_rows[c]) {
                    continue;
                }
                // nothing pending: this channel's row is the current raw line
                self.layout.extract(raw, c, &mut self.channel_rows[c]);
                self.fresh[c] = false;
            }
            self.layout.interleave(&self.channel_rows, &mut self.out_row);
            if !self.post.is_noop() {
                self.post.apply(&mut self.out_row);
            }
            out.extend_from_slice(&self.out_row);
            self.emitted += 1;
        }

        for c in 0..channels {
            if self.fresh[c] {
                let layout = &self.layout;
                self.rings[c].push_with(|dst| layout.extract(raw, c, dst))?;
            }
        }
        Ok(())
    }

    /// End of input: report shortfall and discard pending rows
    pub fn finish(&mut self) -> EngineSummary {
        let pending_discarded: usize = self.rings.iter_mut().map(PendingRing::clear).sum();
        let shortfall = (self.emitted < self.total_lines).then_some(LineShortfall {
            expected: self.total_lines,
            emitted: self.emitted,
        });

        debug!(
            emitted = self.emitted,
            native_rows = self.native_rows,
            pending_discarded,
            "reconstruction finished"
        );

        EngineSummary {
            emitted: self.emitted,
            native_rows: self.native_rows,
            shortfall,
            pending_discarded: pending_discarded as u64,
        }
    }

    pub fn state(&self) -> EngineState {
        if self.emitted >= self.total_lines {
            EngineState::Exhausted
        } else if self.emitted == 0 {
            EngineState::Priming
        } else {
            EngineState::Streaming
        }
    }

    #[inline]
    pub fn emitted_lines(&self) -> u32 {
        self.emitted
    }

    #[inline]
    pub fn native_rows(&self) -> u64 {
        self.native_rows
    }

    #[inline]
    pub fn output_row_bytes(&self) -> usize {
        self.out_row.len()
    }

    /// Rows waiting in each channel's ring
    pub fn pending_rows(&self) -> Vec<usize> {
        self.rings.iter().map(PendingRing::len).collect()
    }

    /// Largest ring occupancy seen, per channel
    pub fn ring_high_water(&self) -> Vec<usize> {
        self.rings.iter().map(PendingRing::high_water).collect()
    }

    /// Accumulator remainders, per channel
    pub fn remainders(&self) -> Vec<i64> {
        self.rates.iter().map(RateAccumulator::remainder).collect()
    }
}
