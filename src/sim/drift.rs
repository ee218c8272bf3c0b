//! Slow random baseline wander added to every trace.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::WaveformKind;

const PERIOD_MIN_SECS: f64 = 3.0;
const PERIOD_MAX_SECS: f64 = 7.0;

/// Wandering baseline offset for one waveform.
///
/// Every 3–7 s a new random target is drawn in `[-0.5, 0.5]` scaled by the
/// trace's amplitude factor, and the offset ramps there along the same
/// logistic curve the parameter smoother uses. Purely additive, no error
/// conditions.
#[derive(Debug)]
pub struct BaselineDrift {
    factor: f64,
    rng: SmallRng,
    period: f64,
    elapsed: f64,
    last: f64,
    target: f64,
}

impl WaveformKind {
    fn drift_factor(self) -> f64 {
        match self {
            WaveformKind::Ecg => 0.5,
            WaveformKind::Pleth => 10.0,
            WaveformKind::Capno => 3.0,
        }
    }
}

impl BaselineDrift {
    pub fn new(kind: WaveformKind, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let period = rng.gen_range(PERIOD_MIN_SECS..PERIOD_MAX_SECS);
        Self {
            factor: kind.drift_factor(),
            rng,
            period,
            elapsed: 0.0,
            last: 0.0,
            target: 0.0,
        }
    }

    /// Current drift offset, advancing the internal clock by `dt`.
    pub fn next(&mut self, dt: f64) -> f64 {
        if self.elapsed >= self.period {
            self.last = self.target;
            self.target = self.rng.gen_range(-0.5..0.5) * self.factor;
            self.period = self.rng.gen_range(PERIOD_MIN_SECS..PERIOD_MAX_SECS);
            self.elapsed = 0.0;
        }

        let t0 = self.period / 2.0;
        let k = 3.0 / t0;
        let value =
            self.last + (self.target - self.last) / (1.0 + (-k * (self.elapsed - t0)).exp());
        self.elapsed += dt;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_stays_inside_type_envelope() {
        for (kind, limit) in [
            (WaveformKind::Ecg, 0.25),
            (WaveformKind::Pleth, 5.0),
            (WaveformKind::Capno, 1.5),
        ] {
            let mut drift = BaselineDrift::new(kind, 7);
            for _ in 0..5000 {
                let v = drift.next(0.02);
                assert!(
                    v.abs() <= limit + 1e-9,
                    "{kind:?} drift {v} exceeded {limit}"
                );
            }
        }
    }

    #[test]
    fn drift_is_deterministic_per_seed() {
        let mut a = BaselineDrift::new(WaveformKind::Ecg, 42);
        let mut b = BaselineDrift::new(WaveformKind::Ecg, 42);
        for _ in 0..500 {
            assert_eq!(a.next(0.02), b.next(0.02));
        }
    }

    #[test]
    fn drift_moves_eventually() {
        let mut drift = BaselineDrift::new(WaveformKind::Pleth, 3);
        let first = drift.next(0.02);
        let mut moved = false;
        for _ in 0..2000 {
            if (drift.next(0.02) - first).abs() > 0.05 {
                moved = true;
                break;
            }
        }
        assert!(moved);
    }
}
