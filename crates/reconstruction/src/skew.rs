//! Per-channel skew tracking.

/// Decision for one native sample of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkewDecision {
    /// Sensor row has not reached the first scan line yet
    Discard,
    Forward,
}

/// Pure form of the skew rule
#[inline]
pub fn consider_at(skew: u32, native_sample_index: u64) -> SkewDecision {
    if native_sample_index < u64::from(skew) {
        SkewDecision::Discard
    } else {
        SkewDecision::Forward
    }
}

/// Discards each channel's first `skew[c]` native samples
#[derive(Debug, Clone)]
pub struct SkewTracker {
    skews: Vec<u32>,
    seen: Vec<u64>,
}

impl SkewTracker {
    pub fn new(skews: impl Into<Vec<u32>>) -> Self {
        let skews = skews.into();
        let seen = vec![0; skews.len()];
        Self { skews, seen }
    }

    /// Classify the next native sample of `channel`
    ///
    /// Channels outside the tracker are forwarded untouched.
    #[inline]
    pub fn consider(&mut self, channel: usize) -> SkewDecision {
        let (Some(&skew), Some(seen)) = (self.skews.get(channel), self.seen.get_mut(channel))
        else {
            return SkewDecision::Forward;
        };
        let decision = consider_at(skew, *seen);
        *seen += 1;
        decision
    }

    /// Native samples seen so far for `channel`
    pub fn seen(&self, channel: usize) -> u64 {
        self.seen.get(channel).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.seen.iter_mut().for_each(|s| *s = 0);
    }
}
