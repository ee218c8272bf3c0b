//! Plethysmograph (SpO2) waveform synthesis.
//!
//! One pulse is two superimposed skew-normal-like lobes (a Gaussian times
//! the error-function CDF): the systolic upstroke and a time-shifted,
//! attenuated dicrotic lobe. Pulse timing follows the ECG generator's
//! randomized beat rate so both traces stay beat-synchronous, with a
//! debounced resync when the ECG phase wraps.

use std::f64::consts::SQRT_2;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::debug;

use crate::config::SimConfig;
use crate::error::SimError;

use super::ecg::EcgGenerator;
use super::{uniform_noise, BaselineDrift, CprArtifact, ParamSmoother, WaveformKind};

/// Display baseline of the pleth trace.
const DISPLAY_FLOOR: f64 = 70.0;
/// Display ceiling.
const DISPLAY_CEIL: f64 = 120.0;
/// Pressure the amplitude squash is centered on, mmHg.
const SQUASH_CENTER_MMHG: f64 = 85.0;

/// Ticks the ECG phase may disagree before we resync to it.
const RESYNC_DEBOUNCE_TICKS: u32 = 4;

/// Abramowitz & Stegun 7.1.26 polynomial approximation, |error| < 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// Skew-normal-like lobe: Gaussian envelope times the skewed CDF.
fn skew_lobe(t: f64, center: f64, width: f64, skew: f64) -> f64 {
    let z = (t - center) / width;
    let gauss = (-0.5 * z * z).exp();
    let cdf = 0.5 * (1.0 + erf(skew * z / SQRT_2));
    2.0 * gauss * cdf
}

/// Logistic squash of NIBP into the bounded display amplitude.
fn display_amplitude(sys: f64, dia: f64) -> f64 {
    let map = (sys + 2.0 * dia) / 3.0;
    DISPLAY_FLOOR
        + (DISPLAY_CEIL - DISPLAY_FLOOR) / (1.0 + (-(map - SQUASH_CENTER_MMHG) / 20.0).exp())
}

/// Pleth waveform generator.
pub struct PlethGenerator {
    current: SimConfig,
    pending: Option<SimConfig>,

    sim_time: f64,
    period: f64,

    sys: ParamSmoother,
    dia: ParamSmoother,

    last_ecg_beat: u64,
    resync_count: u32,

    drift: BaselineDrift,
    cpr: CprArtifact,
    rng: SmallRng,
}

impl PlethGenerator {
    pub fn new(config: SimConfig, seed: u64) -> Result<Self, SimError> {
        if config.state.change_duration_secs <= 0.0 {
            return Err(SimError::invalid(
                "PlethGenerator",
                format!(
                    "change duration must be positive, got {}",
                    config.state.change_duration_secs
                ),
            ));
        }
        Ok(Self {
            sys: ParamSmoother::new(config.vitals.nibp_sys).with_snap_below(4.0),
            dia: ParamSmoother::new(config.vitals.nibp_dia).with_snap_below(4.0),
            sim_time: 0.0,
            period: 60.0 / config.vitals.hr.max(1.0),
            last_ecg_beat: 0,
            resync_count: 0,
            drift: BaselineDrift::new(WaveformKind::Pleth, seed.wrapping_add(1)),
            cpr: CprArtifact::new(WaveformKind::Pleth, seed.wrapping_add(2)),
            rng: SmallRng::seed_from_u64(seed),
            current: config,
            pending: None,
        })
    }

    /// Replace the configuration snapshot; deferred to the next pulse
    /// boundary unless `force` is set.
    pub fn apply_config(&mut self, config: SimConfig, force: bool) {
        if force {
            debug!(revision = config.revision, "pleth config applied immediately");
            self.install_config(config);
            self.pending = None;
        } else {
            self.pending = Some(config);
        }
    }

    /// Make `next` the live configuration; a CPR turn-on restarts the
    /// compression cycle.
    fn install_config(&mut self, next: SimConfig) {
        if next.state.cpr_active && !self.current.state.cpr_active {
            self.cpr.reset();
        }
        self.current = next;
    }

    /// Smoothed systolic value currently in effect (read by the SpO2
    /// extractor's validity gate).
    pub fn current_systolic(&self) -> f64 {
        self.sys.value()
    }

    /// Smoothed diastolic value currently in effect.
    pub fn current_diastolic(&self) -> f64 {
        self.dia.value()
    }

    /// Advance one tick and return the pleth sample. Reads the ECG
    /// generator's beat state, so the engine must tick the ECG first.
    pub fn tick(&mut self, dt: f64, ecg: &EcgGenerator) -> f64 {
        let hr = if self.current.state.ecg_enabled {
            ecg.randomized_heart_rate()
        } else {
            self.current.vitals.hr
        };

        let mut out;
        if hr <= 0.0 {
            // Pulseless: flat floor, accessories still visible. No pulse
            // boundary will arrive, so a deferred snapshot is applied here.
            self.sim_time = 0.0;
            if let Some(next) = self.pending.take() {
                debug!(
                    revision = next.revision,
                    "pleth config applied from flat state"
                );
                self.install_config(next);
            }
            out = DISPLAY_FLOOR;
        } else {
            self.period = 60.0 / hr;
            self.resync_to_ecg(ecg);

            let height = {
                let sys = self.sys.value();
                let dia = self.dia.value();
                display_amplitude(sys, dia) - DISPLAY_FLOOR
            };

            let primary = skew_lobe(self.sim_time, 0.3 * self.period, 0.12 * self.period, 3.0);
            let dicrotic = skew_lobe(self.sim_time, 0.65 * self.period, 0.15 * self.period, 1.5);
            out = DISPLAY_FLOOR + height * (primary + 0.45 * dicrotic) / 1.5;

            self.sim_time += dt;
            if self.sim_time >= self.period {
                self.begin_pulse();
            }
        }

        out += uniform_noise(&mut self.rng, self.current.vitals.spo2_noise);
        if self.current.state.cpr_active {
            out += self.cpr.next(dt);
        }
        out += self.drift.next(dt);
        out
    }

    /// Resynchronize the local phase to the ECG when its beat counter has
    /// moved on, but only after the disagreement persists for a few ticks.
    /// The debounce swallows transient jitter and does nothing while the
    /// ECG channel is disabled.
    fn resync_to_ecg(&mut self, ecg: &EcgGenerator) {
        if !self.current.state.ecg_enabled {
            self.resync_count = 0;
            return;
        }
        if ecg.beat_count() != self.last_ecg_beat {
            self.resync_count += 1;
            if self.resync_count >= RESYNC_DEBOUNCE_TICKS {
                self.sim_time = ecg.phase_time();
                self.last_ecg_beat = ecg.beat_count();
                self.resync_count = 0;
            }
        } else {
            self.resync_count = 0;
        }
    }

    /// Pulse-boundary bookkeeping: apply a deferred config and advance the
    /// NIBP smoothers once for the whole period (once-per-beat cadence, so
    /// the pulse contour never changes shape mid-beat).
    fn begin_pulse(&mut self) {
        self.sim_time = 0.0;
        if let Some(next) = self.pending.take() {
            debug!(
                revision = next.revision,
                "pleth config applied at pulse boundary"
            );
            self.install_config(next);
        }
        let change = self.current.state.change_duration_secs;
        let period = self.period;
        self.sys
            .advance(self.current.vitals.nibp_sys, change, period);
        self.dia
            .advance(self.current.vitals.nibp_dia, change, period);
    }
}
