//! Capnography (EtCO2) waveform synthesis.
//!
//! Each breath is built from analytic segments: a logistic rise to ~90 % of
//! the target during early expiration, a linear taper to 100 % across the
//! alveolar plateau (held flat at 100 % for COPD), a logistic decay to zero
//! during inspiration, then a zero-flow pause sized so the overall
//! inspiration:expiration ratio matches the selected shape.
//!
//! Rate/level changes are gated to the baseline: the RR and EtCO2 smoothers
//! only advance while the curve sits in the zero-flow segment, so a target
//! change can never snap the trace mid-breath.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{RespiratoryRatio, SimConfig};
use crate::error::SimError;

use super::{uniform_noise, BaselineDrift, CprArtifact, ParamSmoother, WaveformKind};

/// Values at or below this never receive per-breath jitter (too slow or
/// flat to read).
const JITTER_FLOOR: f64 = 5.0;

/// Normalized logistic ramp over `u` in `[0, 1]`, pinned to 0 and 1 at the
/// ends.
fn logistic01(u: f64) -> f64 {
    let f = |x: f64| 1.0 / (1.0 + (-10.0 * (x - 0.5)).exp());
    let lo = f(0.0);
    let hi = f(1.0);
    ((f(u) - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Normalized breath contour in `[0, 1]` at breath fraction `t` (0..1).
fn breath_shape(t: f64, inspiratory_fraction: f64, copd: bool) -> f64 {
    let exp_frac = 1.0 - inspiratory_fraction;
    let rise_end = exp_frac * 0.35;
    let plateau_end = exp_frac;
    let decay_end = exp_frac + inspiratory_fraction * 0.4;

    if t < rise_end {
        let target = if copd { 1.0 } else { 0.9 };
        target * logistic01(t / rise_end)
    } else if t < plateau_end {
        if copd {
            1.0
        } else {
            0.9 + 0.1 * (t - rise_end) / (plateau_end - rise_end)
        }
    } else if t < decay_end {
        1.0 - logistic01((t - plateau_end) / (decay_end - plateau_end))
    } else {
        0.0 // zero-flow pause completing the I:E ratio
    }
}

/// Capnography waveform generator.
pub struct CapnoGenerator {
    current: SimConfig,
    pending: Option<SimConfig>,

    sim_time: f64,
    breath_period: f64,

    rr: ParamSmoother,
    etco2: ParamSmoother,
    rand_rr: f64,
    rand_etco2: f64,

    // Shape selectors are latched once per breath, never mid-breath.
    latched_ratio: RespiratoryRatio,
    latched_copd: bool,

    drift: BaselineDrift,
    cpr: CprArtifact,
    rng: SmallRng,
}

impl CapnoGenerator {
    pub fn new(config: SimConfig, seed: u64) -> Result<Self, SimError> {
        if config.state.change_duration_secs <= 0.0 {
            return Err(SimError::invalid(
                "CapnoGenerator",
                format!(
                    "change duration must be positive, got {}",
                    config.state.change_duration_secs
                ),
            ));
        }
        Ok(Self {
            rr: ParamSmoother::new(config.vitals.rr).with_snap_below(2.0),
            etco2: ParamSmoother::new(config.vitals.etco2).with_snap_below(2.0),
            rand_rr: config.vitals.rr,
            rand_etco2: config.vitals.etco2,
            sim_time: 0.0,
            breath_period: 60.0 / config.vitals.rr.max(1.0),
            latched_ratio: config.state.resp_ratio,
            latched_copd: config.state.has_copd,
            drift: BaselineDrift::new(WaveformKind::Capno, seed.wrapping_add(1)),
            cpr: CprArtifact::new(WaveformKind::Capno, seed.wrapping_add(2)),
            rng: SmallRng::seed_from_u64(seed),
            current: config,
            pending: None,
        })
    }

    /// Replace the configuration snapshot; deferred to the next breath
    /// boundary unless `force` is set.
    pub fn apply_config(&mut self, config: SimConfig, force: bool) {
        if force {
            debug!(revision = config.revision, "capno config applied immediately");
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

    /// Apply a deferred snapshot while the trace is flat: there is no breath
    /// boundary to defer to, so the smoothers and breath timing re-anchor to
    /// the new targets directly.
    fn resume_from_flat(&mut self) {
        if let Some(next) = self.pending.take() {
            debug!(
                revision = next.revision,
                "capno config applied from flat state"
            );
            self.install_config(next);
            self.rr.snap_to(self.current.vitals.rr.max(0.0));
            self.etco2.snap_to(self.current.vitals.etco2.max(0.0));
            self.rand_rr = self.rr.value();
            self.rand_etco2 = self.etco2.value();
            self.breath_period = 60.0 / self.rand_rr.max(1.0);
            self.latched_ratio = self.current.state.resp_ratio;
            self.latched_copd = self.current.state.has_copd;
        }
    }

    /// Advance one tick and return the capnography sample, mmHg.
    pub fn tick(&mut self, dt: f64) -> f64 {
        let rr_target = self.current.vitals.rr;
        let etco2_target = self.current.vitals.etco2;

        // No breath: the curve collapses to accessories only and the phase
        // resets every tick so the next breath starts clean.
        if rr_target <= 0.0 || etco2_target <= 0.0 {
            self.sim_time = 0.0;
            self.rr.snap_to(rr_target.max(0.0));
            self.etco2.snap_to(etco2_target.max(0.0));
            self.rand_rr = self.rr.value();
            self.rand_etco2 = self.etco2.value();
            self.resume_from_flat();
            return self.accessories(dt);
        }

        let fraction = (self.sim_time / self.breath_period).min(1.0);
        let shape = breath_shape(
            fraction,
            self.latched_ratio.inspiratory_fraction(),
            self.latched_copd,
        );

        // Baseline gate: only advance the smoothers while the curve sits at
        // zero flow, detected by the shape being flat at the baseline.
        if shape == 0.0 {
            let change = self.current.state.change_duration_secs;
            self.rr.advance(rr_target, change, dt);
            self.etco2.advance(etco2_target, change, dt);
        }

        let value = self.rand_etco2 * shape;

        self.sim_time += dt;
        if self.sim_time >= self.breath_period {
            self.begin_breath();
        }

        value + self.accessories(dt)
    }

    /// Noise, CPR and drift, added to every sample and the only output
    /// while no breath runs.
    fn accessories(&mut self, dt: f64) -> f64 {
        let mut out = uniform_noise(&mut self.rng, self.current.vitals.cap_noise);
        if self.current.state.cpr_active {
            out += self.cpr.next(dt);
        }
        out + self.drift.next(dt)
    }

    /// Breath-boundary bookkeeping: apply a deferred config, latch the
    /// shape selectors, jitter RR/EtCO2 once for the whole breath.
    fn begin_breath(&mut self) {
        self.sim_time = 0.0;
        if let Some(next) = self.pending.take() {
            debug!(
                revision = next.revision,
                "capno config applied at breath boundary"
            );
            self.install_config(next);
        }

        self.latched_ratio = self.current.state.resp_ratio;
        self.latched_copd = self.current.state.has_copd;

        self.rand_rr = Self::jitter(&mut self.rng, self.rr.value());
        self.rand_etco2 = Self::jitter(&mut self.rng, self.etco2.value());
        self.breath_period = 60.0 / self.rand_rr.max(1.0);
    }

    /// ±7.5 % per-breath jitter; readings at or below the floor pass
    /// through unchanged.
    fn jitter(rng: &mut SmallRng, value: f64) -> f64 {
        if value <= JITTER_FLOOR {
            value
        } else {
            value * (1.0 + rng.gen_range(-0.075..0.075))
        }
    }
}
