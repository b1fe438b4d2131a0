//! Integer rate accumulator (DDA).
//!
//! Decides per forwarded native sample whether it survives to the target rate.
//! Integer-only, so the same input always selects the same samples.

/// One accumulator step
///
/// Adds `target_rate` to `acc`; the sample survives when the sum exceeds
/// `native_rate` (strictly), in which case `native_rate` is subtracted again.
/// The remainder never exceeds `native_rate`.
#[inline]
pub fn step(acc: i64, native_rate: u32, target_rate: u32) -> (i64, bool) {
    let native = i64::from(native_rate);
    let mut next = acc + i64::from(target_rate);
    let emit = next > native;
    if emit {
        next -= native;
    }
    (next.min(native), emit)
}

/// Per-channel accumulator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateAccumulator {
    remainder: i64,
    native_rate: u32,
    target_rate: u32,
}

impl RateAccumulator {
    /// Fresh accumulator, seeded so the first forwarded sample survives
    pub fn new(native_rate: u32, target_rate: u32) -> Self {
        Self {
            remainder: i64::from(native_rate),
            native_rate,
            target_rate,
        }
    }

    /// Feed one forwarded native sample
    #[inline]
    pub fn step(&mut self) -> bool {
        let (next, emit) = step(self.remainder, self.native_rate, self.target_rate);
        self.remainder = next;
        emit
    }

    #[inline]
    pub fn remainder(&self) -> i64 {
        self.remainder
    }

    /// Back to the scan-start state
    pub fn reset(&mut self) {
        self.remainder = i64::from(self.native_rate);
    }
}

/// Native samples needed for `output_lines` survivors
///
/// Inverse of the accumulator's counting law: after `k` samples with
/// `target <= native`, `ceil(k * target / native)` samples have survived.
pub fn native_samples_for(output_lines: u32, native_rate: u32, target_rate: u32) -> u64 {
    if output_lines == 0 {
        return 0;
    }
    if target_rate >= native_rate {
        return u64::from(output_lines);
    }
    (u64::from(output_lines) - 1) * u64::from(native_rate) / u64::from(target_rate) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survivors(native: u32, target: u32, samples: usize) -> usize {
        let mut acc = RateAccumulator::new(native, target);
        (0..samples).filter(|_| acc.step()).count()
    }

    #[test]
    fn test_passthrough_keeps_everything() {
        assert_eq!(survivors(300, 300, 100), 100);
    }

    #[test]
    fn test_half_rate() {
        assert_eq!(survivors(600, 300, 100), 50);
    }

    #[test]
    fn test_first_sample_survives() {
        let mut acc = RateAccumulator::new(1200, 75);
        assert!(acc.step());
        assert!(!acc.step());
    }

    #[test]
    fn test_upsampling_keeps_every_sample() {
        assert_eq!(survivors(300, 600, 40), 40);
        let mut acc = RateAccumulator::new(300, 600);
        for _ in 0..1000 {
            acc.step();
            assert!(acc.remainder() <= 300);
        }
    }

    #[test]
    fn test_counting_law() {
        for &(native, target) in &[(600, 300), (600, 400), (1200, 75), (7, 3), (5, 5)] {
            let mut acc = RateAccumulator::new(native, target);
            let mut emitted = 0u64;
            for k in 1..=500u64 {
                if acc.step() {
                    emitted += 1;
                }
                let expected = (k * u64::from(target)).div_ceil(u64::from(native));
                assert_eq!(emitted, expected, "{native}:{target} after {k} samples");
                assert!(acc.remainder() > 0 && acc.remainder() <= i64::from(native));
            }
        }
    }

    #[test]
    fn test_step_is_pure() {
        assert_eq!(step(600, 600, 300), (300, true));
        assert_eq!(step(300, 600, 300), (600, false));
        // strict comparison: landing exactly on native does not emit
        assert_eq!(step(0, 600, 600), (600, false));
    }

    #[test]
    fn test_native_samples_for() {
        assert_eq!(native_samples_for(50, 600, 300), 99);
        assert_eq!(native_samples_for(10, 300, 300), 10);
        assert_eq!(native_samples_for(10, 300, 600), 10);
        assert_eq!(native_samples_for(0, 600, 300), 0);

        for &(native, target) in &[(600, 300), (1200, 75), (7, 3), (600, 400)] {
            for lines in 1..60u32 {
                let needed = native_samples_for(lines, native, target) as usize;
                assert_eq!(survivors(native, target, needed), lines as usize);
                assert_eq!(survivors(native, target, needed - 1), lines as usize - 1);
            }
        }
    }

    #[test]
    fn test_reset() {
        let mut acc = RateAccumulator::new(600, 300);
        acc.step();
        acc.reset();
        assert_eq!(acc.remainder(), 600);
    }
}
