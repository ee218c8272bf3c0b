//! Windowed measurement extraction.
//!
//! Each channel owns a fixed-capacity sample window, a streaming peak
//! detector and small rolling histories. When the window fills it either
//! reports "no signal" (idle time exceeded the channel's timeout, a
//! first-class outcome rather than a zero average) or computes min/max,
//! re-counts
//! peaks over the whole window and emits a rate from the averaged peak
//! history.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::SimError;

use super::peaks::{count_window_peaks, GradientPeakDetector, PeakStep};

/// How a peak count becomes an integer rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateRounding {
    /// Round to nearest (ECG, pleth).
    Nearest,
    /// Truncate toward zero (EtCO2/RR, an inherited asymmetry kept on
    /// purpose).
    Truncate,
}

/// Per-channel extraction parameters.
#[derive(Debug, Clone)]
pub struct ExtractorParams {
    /// Samples per window (200 ≈ 4 s for ECG/pleth, 800 ≈ 16 s for EtCO2
    /// at the 0.02 s tick).
    pub window_len: usize,
    /// Rolling min/max history length.
    pub minmax_history: usize,
    /// Rolling peak-count history length.
    pub peak_history: usize,
    /// Arming gradient threshold.
    pub rise_threshold: f64,
    /// Disarm gradient threshold.
    pub fall_threshold: f64,
    /// Minimum samples between accepted peaks.
    pub refractory_samples: usize,
    /// Idle seconds after which the window reports "no signal".
    pub max_idle_secs: f64,
    /// Rate rounding policy.
    pub rounding: RateRounding,
}

impl ExtractorParams {
    pub fn ecg() -> Self {
        Self {
            window_len: 200,
            minmax_history: 4,
            peak_history: 4,
            rise_threshold: 20.0,
            fall_threshold: -20.0,
            refractory_samples: 10,
            max_idle_secs: 3.0,
            rounding: RateRounding::Nearest,
        }
    }

    pub fn pleth() -> Self {
        Self {
            rise_threshold: 50.0,
            fall_threshold: -50.0,
            ..Self::ecg()
        }
    }

    pub fn capno() -> Self {
        Self {
            window_len: 800,
            minmax_history: 2,
            peak_history: 2,
            rise_threshold: 5.0,
            fall_threshold: -5.0,
            refractory_samples: 10,
            max_idle_secs: 10.0,
            rounding: RateRounding::Truncate,
        }
    }
}

/// Result of closing one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    /// Averaged rate, already rounded per channel policy. Zero on idle.
    pub rate: i32,
    /// Window maximum (0.0 on idle).
    pub max: f64,
    /// Window minimum (0.0 on idle).
    pub min: f64,
    /// True when the idle timeout fired and the buffers were cleared.
    pub idle: bool,
}

/// Shared windowed extraction core.
pub struct WindowedExtractor {
    params: ExtractorParams,
    detector: GradientPeakDetector,
    samples: Vec<f64>,
    idle_secs: f64,
    peak_history: VecDeque<usize>,
}

impl WindowedExtractor {
    pub fn new(params: ExtractorParams) -> Result<Self, SimError> {
        if params.window_len == 0 {
            return Err(SimError::invalid(
                "WindowedExtractor",
                "window length must be positive",
            ));
        }
        if params.max_idle_secs <= 0.0 {
            return Err(SimError::invalid(
                "WindowedExtractor",
                format!("idle timeout must be positive, got {}", params.max_idle_secs),
            ));
        }
        Ok(Self {
            detector: GradientPeakDetector::new(
                params.rise_threshold,
                params.fall_threshold,
                params.refractory_samples,
            ),
            samples: Vec::with_capacity(params.window_len),
            idle_secs: 0.0,
            peak_history: VecDeque::with_capacity(params.peak_history),
            params,
        })
    }

    /// Feed one sample. Returns whether a peak was accepted at this sample
    /// and, when the window just closed, its summary.
    pub fn push(&mut self, value: f64, timestep: f64) -> (bool, Option<WindowSummary>) {
        let step = self.detector.push(value, timestep);
        match step {
            PeakStep::Idle => self.idle_secs += timestep,
            PeakStep::Armed | PeakStep::Peak => self.idle_secs = 0.0,
        }

        self.samples.push(value);
        let summary = (self.samples.len() >= self.params.window_len)
            .then(|| self.close_window(timestep));
        (step == PeakStep::Peak, summary)
    }

    fn close_window(&mut self, timestep: f64) -> WindowSummary {
        let window_secs = self.params.window_len as f64 * timestep;

        if self.idle_secs >= self.params.max_idle_secs {
            trace!(idle_secs = self.idle_secs, "window closed idle");
            self.clear();
            return WindowSummary {
                rate: 0,
                max: 0.0,
                min: 0.0,
                idle: true,
            };
        }

        let max = self.samples.iter().copied().fold(f64::MIN, f64::max);
        let min = self.samples.iter().copied().fold(f64::MAX, f64::min);

        let count = count_window_peaks(
            &self.samples,
            timestep,
            self.params.rise_threshold,
            self.params.fall_threshold,
            self.params.refractory_samples,
        );
        if self.peak_history.len() == self.params.peak_history {
            self.peak_history.pop_front();
        }
        self.peak_history.push_back(count);

        let mean_peaks = self.peak_history.iter().sum::<usize>() as f64
            / self.peak_history.len() as f64;
        let rate_raw = mean_peaks * 60.0 / window_secs;
        let rate = match self.params.rounding {
            RateRounding::Nearest => rate_raw.round() as i32,
            RateRounding::Truncate => rate_raw.trunc() as i32,
        };

        trace!(count, rate, max, min, "window closed");
        self.samples.clear();
        self.idle_secs = 0.0;
        WindowSummary {
            rate,
            max,
            min,
            idle: false,
        }
    }

    /// Clear every buffer (idle timeout, channel disable). Histories are
    /// reused, never reallocated.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.peak_history.clear();
        self.detector.reset();
        self.idle_secs = 0.0;
    }
}

/// Bounded rolling scalar history with an averaging accessor.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// ECG heart-rate extractor.
pub struct EcgExtractor {
    inner: WindowedExtractor,
    max_history: RollingHistory,
    min_history: RollingHistory,
}

impl EcgExtractor {
    pub fn new() -> Result<Self, SimError> {
        let params = ExtractorParams::ecg();
        Ok(Self {
            max_history: RollingHistory::new(params.minmax_history),
            min_history: RollingHistory::new(params.minmax_history),
            inner: WindowedExtractor::new(params)?,
        })
    }

    /// Returns `(qrs_peak, heart_rate)`; the rate appears once per window.
    pub fn push(&mut self, sample: f64, timestep: f64) -> (bool, Option<i32>) {
        let (peak, summary) = self.inner.push(sample, timestep);
        let rate = summary.map(|s| {
            if s.idle {
                self.max_history.clear();
                self.min_history.clear();
            } else {
                self.max_history.push(s.max);
                self.min_history.push(s.min);
            }
            s.rate
        });
        (peak, rate)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.max_history.clear();
        self.min_history.clear();
    }
}

/// SpO2/pulse extractor with the NIBP validity gate.
pub struct Spo2Extractor {
    inner: WindowedExtractor,
    max_history: RollingHistory,
    min_history: RollingHistory,
}

/// One SpO2 window's worth of vitals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spo2Reading {
    /// Pulse rate from the pleth pulses, bpm.
    pub pulse_rate: i32,
    /// Saturation percentage (0 when no valid reading exists).
    pub spo2: i32,
}

impl Spo2Extractor {
    pub fn new() -> Result<Self, SimError> {
        let params = ExtractorParams::pleth();
        Ok(Self {
            max_history: RollingHistory::new(params.minmax_history),
            min_history: RollingHistory::new(params.minmax_history),
            inner: WindowedExtractor::new(params)?,
        })
    }

    /// Feed one pleth sample along with the SpO2 target and the NIBP
    /// values in effect. Without adequate pressure (`sys > 70`,
    /// `dia <= sys`) the histories receive 0/0 instead of a real reading.
    pub fn push(
        &mut self,
        sample: f64,
        timestep: f64,
        spo2_target: f64,
        sys: f64,
        dia: f64,
    ) -> (bool, Option<Spo2Reading>) {
        let (peak, summary) = self.inner.push(sample, timestep);
        let reading = summary.map(|s| {
            if s.idle {
                self.max_history.clear();
                self.min_history.clear();
                return Spo2Reading {
                    pulse_rate: 0,
                    spo2: 0,
                };
            }

            let nibp_valid = sys > 70.0 && dia <= sys;
            if nibp_valid {
                self.max_history.push(s.max);
                self.min_history.push(s.min);
            } else {
                self.max_history.push(0.0);
                self.min_history.push(0.0);
            }

            let spo2 = if self.max_history.average() <= 0.0 {
                0
            } else {
                spo2_target.round() as i32
            };
            Spo2Reading {
                pulse_rate: s.rate,
                spo2,
            }
        });
        (peak, reading)
    }

    /// Averaged rolling maximum (test hook for the gating invariant).
    pub fn rolling_max(&self) -> f64 {
        self.max_history.average()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.max_history.clear();
        self.min_history.clear();
    }
}

/// EtCO2 level + respiratory-rate extractor.
pub struct CapnoExtractor {
    inner: WindowedExtractor,
    max_history: RollingHistory,
    min_history: RollingHistory,
}

/// One capnography window's worth of vitals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapnoReading {
    /// Respiratory rate, breaths per minute.
    pub resp_rate: i32,
    /// End-tidal CO2 level, mmHg (0 below the instrument cutoff).
    pub etco2: i32,
}

/// Rolling EtCO2 averages below this read as zero (instrument cutoff).
const ETCO2_CUTOFF_MMHG: f64 = 5.0;

impl CapnoExtractor {
    pub fn new() -> Result<Self, SimError> {
        let params = ExtractorParams::capno();
        Ok(Self {
            max_history: RollingHistory::new(params.minmax_history),
            min_history: RollingHistory::new(params.minmax_history),
            inner: WindowedExtractor::new(params)?,
        })
    }

    /// Returns `(breath_peak, reading)`; the reading appears once per
    /// (16 s) window.
    pub fn push(&mut self, sample: f64, timestep: f64) -> (bool, Option<CapnoReading>) {
        let (peak, summary) = self.inner.push(sample, timestep);
        let reading = summary.map(|s| {
            if s.idle {
                self.max_history.clear();
                self.min_history.clear();
                return CapnoReading {
                    resp_rate: 0,
                    etco2: 0,
                };
            }

            self.max_history.push(s.max);
            self.min_history.push(s.min);

            // Level cutoff is independent of the RR computation.
            let level_avg = self.max_history.average();
            let etco2 = if level_avg < ETCO2_CUTOFF_MMHG {
                0
            } else {
                level_avg.round() as i32
            };
            CapnoReading {
                resp_rate: s.rate,
                etco2,
            }
        });
        (peak, reading)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.max_history.clear();
        self.min_history.clear();
    }
}
