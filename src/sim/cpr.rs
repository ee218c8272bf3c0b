//! Chest-compression artifact injection.

use std::f64::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::WaveformKind;

/// Default compression rate, compressions per minute.
const DEFAULT_RATE_CPM: f64 = 110.0;

/// Periodic pseudo-sinusoidal disturbance while CPR is active.
///
/// Rate and amplitude are re-randomized every compression (±10 % / ±20 %)
/// and each sample gets a small phase jitter so the artifact never looks
/// machine-perfect. ECG and pleth receive a half-rectified sine; the
/// capnography trace gets a full sine riding on a positive offset.
#[derive(Debug)]
pub struct CprArtifact {
    kind: WaveformKind,
    rng: SmallRng,
    rate_cpm: f64,
    amplitude: f64,
    time: f64,
}

impl WaveformKind {
    fn cpr_amplitude(self) -> f64 {
        match self {
            WaveformKind::Ecg => 1.2,
            WaveformKind::Pleth => 25.0,
            WaveformKind::Capno => 6.0,
        }
    }
}

impl CprArtifact {
    pub fn new(kind: WaveformKind, seed: u64) -> Self {
        Self {
            kind,
            rng: SmallRng::seed_from_u64(seed),
            rate_cpm: DEFAULT_RATE_CPM,
            amplitude: kind.cpr_amplitude(),
            time: 0.0,
        }
    }

    /// Artifact value for the current sample, advancing by `dt`.
    pub fn next(&mut self, dt: f64) -> f64 {
        self.time += dt;
        if self.time > 60.0 / self.rate_cpm {
            self.rate_cpm = DEFAULT_RATE_CPM * (1.0 + self.rng.gen_range(-0.10..0.10));
            self.amplitude = self.kind.cpr_amplitude() * (1.0 + self.rng.gen_range(-0.20..0.20));
            self.time = 0.0;
        }

        let jitter = self.rng.gen_range(-0.01..0.01);
        let phase = 2.0 * PI * (self.rate_cpm / 60.0) * self.time + jitter;
        match self.kind {
            WaveformKind::Ecg | WaveformKind::Pleth => self.amplitude * phase.sin().max(0.0),
            WaveformKind::Capno => self.amplitude * (0.5 + 0.5 * phase.sin()),
        }
    }

    /// Restart the compression cycle, e.g. when CPR is toggled back on.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.rate_cpm = DEFAULT_RATE_CPM;
        self.amplitude = self.kind.cpr_amplitude();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecg_artifact_is_half_rectified() {
        let mut cpr = CprArtifact::new(WaveformKind::Ecg, 11);
        for _ in 0..2000 {
            assert!(cpr.next(0.02) >= 0.0);
        }
    }

    #[test]
    fn capno_artifact_keeps_positive_offset() {
        let mut cpr = CprArtifact::new(WaveformKind::Capno, 11);
        for _ in 0..2000 {
            let v = cpr.next(0.02);
            assert!(v >= -1e-9);
            assert!(v <= WaveformKind::Capno.cpr_amplitude() * 1.25);
        }
    }

    #[test]
    fn reset_restarts_the_compression_cycle() {
        let mut cpr = CprArtifact::new(WaveformKind::Pleth, 6);
        // Advance into the rectified-zero half of the cycle.
        let mut v = 0.0;
        for _ in 0..20 {
            v = cpr.next(0.02);
        }
        assert_eq!(v, 0.0);

        cpr.reset();
        assert!(cpr.next(0.02) > 0.0);
    }

    #[test]
    fn compression_rate_stays_near_default() {
        let mut cpr = CprArtifact::new(WaveformKind::Pleth, 5);
        // Count zero-to-positive transitions over a minute of samples.
        let mut prev = 0.0;
        let mut compressions = 0;
        for _ in 0..3000 {
            let v = cpr.next(0.02);
            if prev == 0.0 && v > 0.0 {
                compressions += 1;
            }
            prev = v;
        }
        assert!(
            (85..=135).contains(&compressions),
            "saw {compressions} compressions/min"
        );
    }
}
