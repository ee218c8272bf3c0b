//! Causal gradient peak detection with hysteresis.

/// Outcome of feeding one sample to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakStep {
    /// Nothing armed or accepted; idle time accumulates.
    Idle,
    /// Rising edge crossed the arming threshold.
    Armed,
    /// Falling edge crossed the disarm threshold: a peak is accepted.
    Peak,
}

/// Streaming peak detector over a single-step gradient.
///
/// Arms when the causal gradient `(y[n] - y[n-1]) / timestep` exceeds the
/// rise threshold and at least `refractory_samples` samples have passed
/// since the last accepted peak (a 300 bpm ceiling at the default window
/// parameters); accepts the peak when the gradient then falls below the
/// fall threshold.
#[derive(Debug, Clone)]
pub struct GradientPeakDetector {
    rise_threshold: f64,
    fall_threshold: f64,
    refractory_samples: usize,
    armed: bool,
    prev: Option<f64>,
    index: usize,
    last_peak: Option<usize>,
}

impl GradientPeakDetector {
    pub fn new(rise_threshold: f64, fall_threshold: f64, refractory_samples: usize) -> Self {
        Self {
            rise_threshold,
            fall_threshold,
            refractory_samples,
            armed: false,
            prev: None,
            index: 0,
            last_peak: None,
        }
    }

    /// Feed one sample; `timestep` is the fixed tick width in seconds.
    pub fn push(&mut self, value: f64, timestep: f64) -> PeakStep {
        let Some(prev) = self.prev.replace(value) else {
            self.index += 1;
            return PeakStep::Idle;
        };
        let gradient = (value - prev) / timestep;

        let step = if !self.armed && gradient > self.rise_threshold && self.refractory_elapsed() {
            self.armed = true;
            PeakStep::Armed
        } else if self.armed && gradient < self.fall_threshold {
            self.armed = false;
            self.last_peak = Some(self.index);
            PeakStep::Peak
        } else {
            PeakStep::Idle
        };

        self.index += 1;
        step
    }

    fn refractory_elapsed(&self) -> bool {
        match self.last_peak {
            None => true,
            Some(at) => self.index - at >= self.refractory_samples,
        }
    }

    /// Forget all streaming state (idle timeout, channel disable).
    pub fn reset(&mut self) {
        self.armed = false;
        self.prev = None;
        self.index = 0;
        self.last_peak = None;
    }
}

/// Independent non-causal pass over a whole window: same gradient and
/// refractory rules, fresh state. Used at window close for the rate count,
/// decoupled from the streaming detector's arming state.
pub fn count_window_peaks(
    window: &[f64],
    timestep: f64,
    rise_threshold: f64,
    fall_threshold: f64,
    refractory_samples: usize,
) -> usize {
    let mut detector = GradientPeakDetector::new(rise_threshold, fall_threshold, refractory_samples);
    window
        .iter()
        .filter(|&&v| detector.push(v, timestep) == PeakStep::Peak)
        .count()
}
