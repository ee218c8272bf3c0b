//! ECG waveform synthesis.
//!
//! Each beat is the sum of six wave components approximated by truncated
//! Fourier series: rounded pulses for P, T and U, triangular pulses for Q,
//! the QRS complex and S. The series is periodic in the cardiac period, so
//! the phase counter `sim_time` simply wraps at the end of every beat.
//!
//! Layered on top of the generic synthesis: pacer capture, beat-to-beat
//! rate jitter, ST-segment elevation, third-degree AV block (an isolated
//! sub-state-machine decoupling atrial and ventricular timing), defibrillation
//! shock artifacts, low-rate silence stretching and the asystole hard zero.

use std::f64::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{EcgWaveTable, Pathology, SimConfig, WaveShape};
use crate::error::SimError;

use super::{uniform_noise, BaselineDrift, CprArtifact, ParamSmoother, WaveformKind};

/// Harmonics kept in each truncated Fourier series.
const HARMONICS: usize = 40;

/// Below this rate (except in AV block) the gap between complexes is
/// rendered as held baseline instead of stretched waves.
const LOW_HR_BPM: f64 = 35.0;

/// Ventricular escape rate an AV-block heart settles toward.
const AV_ESCAPE_BPM: f64 = 40.0;

const SHOCK_RISE_SECS: f64 = 0.02;
const SHOCK_TOTAL_SECS: f64 = 0.04;
const SHOCK_PEAK_MV: f64 = 5.0;
const SHOCK_UNDERSHOOT_MV: f64 = 2.0;

/// Rounded-rectangular pulse of height `amp` and width `duration`,
/// centered at `x = 0`, periodic in `2 * half_period`.
fn rounded_pulse(x: f64, amp: f64, duration: f64, half_period: f64) -> f64 {
    if amp == 0.0 || duration <= 0.0 || half_period <= 0.0 {
        return 0.0;
    }
    let l = half_period;
    let b = 2.0 * l / duration;
    // DC term is the mean of a half-cosine lobe of width `duration`, so the
    // pulse stays localized instead of riding on a constant background.
    let mut acc = 2.0 / (PI * b);
    for i in 1..=HARMONICS {
        let n = i as f64;
        let lo = b - 2.0 * n;
        let hi = b + 2.0 * n;
        // lo crosses zero when a harmonic lands exactly on the pulse width;
        // take the sinc limit there instead of dividing by zero.
        let term_lo = if lo.abs() < 1e-9 {
            PI / (2.0 * b)
        } else {
            ((PI / (2.0 * b)) * lo).sin() / lo
        };
        let term_hi = ((PI / (2.0 * b)) * hi).sin() / hi;
        acc += (term_lo + term_hi) * (2.0 / PI) * ((n * PI * x) / l).cos();
    }
    amp * acc
}

/// Triangular pulse of height `amp` and width `duration`, centered at
/// `x = 0`, periodic in `2 * half_period`. Used for the sharp Q/QRS/S
/// deflections.
fn triangular_pulse(x: f64, amp: f64, duration: f64, half_period: f64) -> f64 {
    if amp == 0.0 || duration <= 0.0 || half_period <= 0.0 {
        return 0.0;
    }
    let l = half_period;
    let b = 2.0 * l / duration;
    // Mean of a triangle of height `amp` and base `duration` over the period.
    let mut acc = amp / (2.0 * b);
    for i in 1..=HARMONICS {
        let n = i as f64;
        acc += ((2.0 * b * amp) / (n * n * PI * PI))
            * (1.0 - ((n * PI) / b).cos())
            * ((n * PI * x) / l).cos();
    }
    acc
}

/// Rate-dependent compression of inter-wave timing. Keeps PR/QT-like
/// intervals plausible: ~1.0 at 60 bpm, stretched at bradycardic rates,
/// compressed toward ~0.4 at 180 bpm.
fn interval_scale(hr: f64) -> f64 {
    0.35 + 1.3 / (1.0 + ((hr - 60.0) / 40.0).exp())
}

/// Two-phase defibrillation artifact: exponential rise over the first
/// 20 ms, exponential overshoot recovery over the next 20 ms.
fn shock_artifact(t: f64) -> f64 {
    if t < SHOCK_RISE_SECS {
        SHOCK_PEAK_MV * (1.0 - (-t / 0.004).exp())
    } else {
        -SHOCK_UNDERSHOOT_MV * (-(t - SHOCK_RISE_SECS) / 0.006).exp()
    }
}

/// Smoothers for one wave's amplitude/start/duration triple.
#[derive(Debug, Clone)]
struct WaveSmoother {
    amplitude: ParamSmoother,
    start: ParamSmoother,
    duration: ParamSmoother,
}

impl WaveSmoother {
    fn new(shape: &WaveShape) -> Self {
        Self {
            amplitude: ParamSmoother::new(shape.amplitude),
            start: ParamSmoother::new(shape.start),
            duration: ParamSmoother::new(shape.duration),
        }
    }

    fn advance(&mut self, target: &WaveShape, change_duration: f64, dt: f64) -> WaveShape {
        WaveShape {
            amplitude: self.amplitude.advance(target.amplitude, change_duration, dt),
            start: self.start.advance(target.start, change_duration, dt),
            duration: self.duration.advance(target.duration, change_duration, dt),
        }
    }

    fn snap_to(&mut self, shape: &WaveShape) {
        self.amplitude.snap_to(shape.amplitude);
        self.start.snap_to(shape.start);
        self.duration.snap_to(shape.duration);
    }
}

/// Third-degree AV block timing, isolated from the main synthesis path.
///
/// Owns its own counter, smoother and randomness; the generator consumes
/// only the ventricular phase and period it reports. The counter resets
/// every `60 / jittered rate` seconds while the rate itself is pulled
/// toward the escape rate by its own interpolator.
#[derive(Debug)]
struct AvBlockTimer {
    counter: f64,
    period: f64,
    rate: ParamSmoother,
    rng: SmallRng,
}

impl AvBlockTimer {
    fn new(initial_rate: f64, seed: u64) -> Self {
        let rate = initial_rate.max(AV_ESCAPE_BPM);
        Self {
            counter: 0.0,
            period: 60.0 / rate,
            rate: ParamSmoother::new(rate).with_snap_below(2.0),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Advance by `dt`; returns the ventricular phase within the current
    /// ventricular period.
    fn tick(&mut self, dt: f64, change_duration: f64) -> f64 {
        self.counter += dt;
        if self.counter >= self.period {
            self.counter = 0.0;
            let rate = self.rate.advance(AV_ESCAPE_BPM, change_duration, self.period);
            let jittered = rate * (1.0 + self.rng.gen_range(-0.05..0.05));
            self.period = 60.0 / jittered.max(5.0);
        }
        self.counter
    }

    fn period(&self) -> f64 {
        self.period
    }

    fn reset(&mut self, rate: f64) {
        self.counter = 0.0;
        let rate = rate.max(AV_ESCAPE_BPM);
        self.period = 60.0 / rate;
        self.rate.snap_to(rate);
    }
}

/// ECG waveform generator.
pub struct EcgGenerator {
    current: SimConfig,
    pending: Option<SimConfig>,

    sim_time: f64,
    period: f64,
    beat_count: u64,
    rand_hr: f64,

    hr: ParamSmoother,
    p: WaveSmoother,
    q: WaveSmoother,
    qrs: WaveSmoother,
    s: WaveSmoother,
    t: WaveSmoother,
    u: WaveSmoother,
    qrs_duration_offset: ParamSmoother,
    st_offset: ParamSmoother,

    baseline_ref: f64,
    baseline_dirty: bool,

    shock_elapsed: Option<f64>,
    paced: bool,
    pacer_mark_pending: bool,

    av_block: AvBlockTimer,
    drift: BaselineDrift,
    cpr: CprArtifact,
    rng: SmallRng,
}

impl EcgGenerator {
    pub fn new(config: SimConfig, seed: u64) -> Result<Self, SimError> {
        if config.state.change_duration_secs <= 0.0 {
            return Err(SimError::invalid(
                "EcgGenerator",
                format!(
                    "change duration must be positive, got {}",
                    config.state.change_duration_secs
                ),
            ));
        }

        let hr = config.vitals.hr;
        let waves = config.vitals.ecg_waves;
        Ok(Self {
            hr: ParamSmoother::new(hr).with_snap_below(2.0),
            p: WaveSmoother::new(&waves.p),
            q: WaveSmoother::new(&waves.q),
            qrs: WaveSmoother::new(&waves.qrs),
            s: WaveSmoother::new(&waves.s),
            t: WaveSmoother::new(&waves.t),
            u: WaveSmoother::new(&waves.u),
            qrs_duration_offset: ParamSmoother::new(waves.qrs_duration_offset),
            st_offset: ParamSmoother::new(config.vitals.st_offset),
            sim_time: 0.0,
            period: 60.0 / hr.max(1.0),
            beat_count: 0,
            rand_hr: hr,
            baseline_ref: 0.0,
            baseline_dirty: true,
            shock_elapsed: None,
            paced: false,
            pacer_mark_pending: false,
            av_block: AvBlockTimer::new(hr, seed.wrapping_add(1)),
            drift: BaselineDrift::new(WaveformKind::Ecg, seed.wrapping_add(2)),
            cpr: CprArtifact::new(WaveformKind::Ecg, seed.wrapping_add(3)),
            rng: SmallRng::seed_from_u64(seed),
            current: config,
            pending: None,
        })
    }

    /// Replace the configuration snapshot. Without `force` the swap is
    /// deferred to the next beat boundary so the trace never snaps
    /// mid-complex; `force` applies it immediately (shock, channel-enable
    /// transitions).
    pub fn apply_config(&mut self, config: SimConfig, force: bool) {
        if force {
            debug!(
                revision = config.revision,
                pathology = config.vitals.pathology.label(),
                "ecg config applied immediately"
            );
            self.install_config(config);
            self.pending = None;
        } else {
            self.pending = Some(config);
        }
    }

    /// Make `next` the live configuration, resetting the sub-states whose
    /// cycles must restart on the transition.
    fn install_config(&mut self, next: SimConfig) {
        if next.state.cpr_active && !self.current.state.cpr_active {
            self.cpr.reset();
        }
        let entering_av_block = matches!(next.vitals.pathology, Pathology::AVBlock3)
            && !matches!(self.current.vitals.pathology, Pathology::AVBlock3);
        self.current = next;
        self.baseline_dirty = true;
        if entering_av_block {
            self.av_block.reset(self.current.vitals.hr);
        }
    }

    fn pacer_captured(&self) -> bool {
        let pacer = self.current.state.pacer;
        pacer.enabled
            && pacer.energy_ma >= pacer.capture_threshold_ma
            && self.current.vitals.hr < pacer.frequency_ppm
    }

    /// Begin the two-phase shock artifact on the next tick.
    pub fn request_shock(&mut self) {
        self.shock_elapsed = Some(0.0);
    }

    /// True while the shock artifact still overrides synthesis.
    pub fn shock_active(&self) -> bool {
        self.shock_elapsed.is_some()
    }

    /// Beat-rate the current beat was randomized to (read by the pleth
    /// generator within the same tick).
    pub fn randomized_heart_rate(&self) -> f64 {
        self.rand_hr
    }

    /// Phase within the current cardiac period, seconds.
    pub fn phase_time(&self) -> f64 {
        self.sim_time
    }

    /// Number of completed cardiac periods.
    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    /// Take (and clear) the pending pacing-mark flag, set once per captured
    /// beat for the host renderer.
    pub fn take_pacer_mark(&mut self) -> bool {
        std::mem::take(&mut self.pacer_mark_pending)
    }

    /// Advance one tick and return the ECG sample, millivolts.
    pub fn tick(&mut self, dt: f64) -> f64 {
        // A parked (asystolic, unpaced) trace never reaches a beat boundary,
        // so a deferred snapshot is applied here instead of waiting forever.
        if self.pending.is_some() && self.current.vitals.hr <= 0.0 && !self.pacer_captured() {
            if let Some(next) = self.pending.take() {
                debug!(
                    revision = next.revision,
                    pathology = next.vitals.pathology.label(),
                    "ecg config applied from parked state"
                );
                self.install_config(next);
                self.hr.snap_to(self.current.vitals.hr);
                self.rand_hr = self.current.vitals.hr;
                self.period = 60.0 / self.rand_hr.max(1.0);
            }
        }

        let change_duration = self.current.state.change_duration_secs;
        let pacer = self.current.state.pacer;
        let target_hr = self.current.vitals.hr;
        let pathology = self.current.vitals.pathology.clone();

        self.paced = self.pacer_captured();
        let effective_target = if self.paced {
            pacer.frequency_ppm
        } else {
            target_hr
        };
        self.hr.advance(effective_target, change_duration, dt);

        let wave_targets = self.current.vitals.ecg_waves;
        let waves = EcgWaveTable {
            p: self.p.advance(&wave_targets.p, change_duration, dt),
            q: self.q.advance(&wave_targets.q, change_duration, dt),
            qrs: self.qrs.advance(&wave_targets.qrs, change_duration, dt),
            s: self.s.advance(&wave_targets.s, change_duration, dt),
            t: self.t.advance(&wave_targets.t, change_duration, dt),
            u: self.u.advance(&wave_targets.u, change_duration, dt),
            qrs_duration_offset: self.qrs_duration_offset.advance(
                wave_targets.qrs_duration_offset,
                change_duration,
                dt,
            ),
        };
        let st_offset = self
            .st_offset
            .advance(self.current.vitals.st_offset, change_duration, dt);

        let asystole = target_hr == 0.0 && !self.paced;
        let is_av_block = matches!(pathology, Pathology::AVBlock3) && !self.paced;

        let synth = if let Some(elapsed) = self.shock_elapsed {
            // Sample the artifact at the window midpoint so the first tick
            // already shows the rising edge.
            let value = shock_artifact(elapsed + 0.5 * dt);
            let next = elapsed + dt;
            self.shock_elapsed = (next < SHOCK_TOTAL_SECS).then_some(next);
            value
        } else if asystole {
            // Asystole is a first-class state: every wave returns exactly
            // zero, the phase stays parked.
            self.sim_time = 0.0;
            self.baseline_ref = 0.0;
            0.0
        } else if is_av_block {
            let v_phase = self.av_block.tick(dt, change_duration);
            self.synthesize_av_block(v_phase, &waves)
        } else {
            self.synthesize_beat(&waves, st_offset)
        };

        let mut out = synth + self.current.vitals.ecg_offset;
        out += uniform_noise(&mut self.rng, self.current.vitals.ecg_noise);
        if self.current.state.cpr_active {
            out += self.cpr.next(dt);
        }
        out += self.drift.next(dt);

        if !asystole {
            self.sim_time += dt;
            if self.sim_time >= self.period {
                self.begin_beat();
            }
        }

        out
    }

    /// Normal (non-AV-block) synthesis at the current phase.
    fn synthesize_beat(&mut self, waves: &EcgWaveTable, st_offset: f64) -> f64 {
        let scale = interval_scale(self.rand_hr);

        // Below LOW_HR_BPM the complex keeps a fixed 35 bpm footprint and
        // the remaining diastole holds at baseline, which avoids the smeared
        // artifacts a stretched Fourier period would produce.
        let (half_period, synth_span) = if self.rand_hr < LOW_HR_BPM {
            let ref_period = 60.0 / LOW_HR_BPM;
            (ref_period / 2.0, ref_period)
        } else {
            (self.period / 2.0, f64::INFINITY)
        };

        if self.baseline_dirty || self.sim_time == 0.0 {
            self.baseline_ref = Self::quiet_reference(waves, scale, half_period);
            self.baseline_dirty = false;
        }

        if self.sim_time > synth_span {
            return 0.0; // held baseline between stretched complexes
        }

        let x = self.sim_time;
        let raw = Self::wave_sum(x, waves, scale, half_period);
        raw - self.baseline_ref + Self::st_plateau(x, waves, scale, st_offset)
    }

    /// AV block: P waves follow the atrial (configured) rate on the main
    /// phase counter, everything ventricular follows the escape timer.
    fn synthesize_av_block(&mut self, v_phase: f64, waves: &EcgWaveTable) -> f64 {
        let atrial_l = self.period / 2.0;
        let atrial_scale = interval_scale(self.rand_hr);

        let v_period = self.av_block.period();
        let v_l = v_period / 2.0;
        let v_scale = interval_scale(60.0 / v_period);

        if self.baseline_dirty || self.sim_time == 0.0 {
            self.baseline_ref = Self::quiet_reference(waves, v_scale, v_l);
            self.baseline_dirty = false;
        }

        let p = rounded_pulse(
            self.sim_time - waves.p.start * atrial_scale,
            waves.p.amplitude,
            waves.p.duration,
            atrial_l,
        );

        let ventricular = Self::ventricular_sum(v_phase, waves, v_scale, v_l);
        p + ventricular - self.baseline_ref
    }

    /// Sum of all six wave components at phase `x`.
    fn wave_sum(x: f64, waves: &EcgWaveTable, scale: f64, l: f64) -> f64 {
        let p = rounded_pulse(
            x - waves.p.start * scale,
            waves.p.amplitude,
            waves.p.duration,
            l,
        );
        p + Self::ventricular_sum(x, waves, scale, l)
    }

    /// Q/QRS/S/T/U portion of the complex (everything driven by the
    /// ventricles), at phase `x`.
    fn ventricular_sum(x: f64, waves: &EcgWaveTable, scale: f64, l: f64) -> f64 {
        let q = triangular_pulse(
            x - waves.q.start * scale,
            waves.q.amplitude,
            waves.q.duration,
            l,
        );
        let qrs = triangular_pulse(
            x - waves.qrs.start * scale,
            waves.qrs.amplitude,
            waves.qrs.duration + waves.qrs_duration_offset,
            l,
        );
        let s = triangular_pulse(
            x - waves.s.start * scale,
            waves.s.amplitude,
            waves.s.duration,
            l,
        );
        let t = rounded_pulse(
            x - waves.t.start * scale,
            waves.t.amplitude,
            waves.t.duration,
            l,
        );
        let u = rounded_pulse(
            x - waves.u.start * scale,
            waves.u.amplitude,
            waves.u.duration,
            l,
        );
        -q + qrs - s + t + u
    }

    /// Raised plateau between the end of S and the start of T.
    fn st_plateau(x: f64, waves: &EcgWaveTable, scale: f64, st_offset: f64) -> f64 {
        if st_offset == 0.0 {
            return 0.0;
        }
        let s_end = waves.s.start * scale + waves.s.duration / 2.0;
        let t_start = waves.t.start * scale - waves.t.duration / 2.0;
        if t_start <= s_end || x < s_end || x > t_start {
            return 0.0;
        }
        let u = (x - s_end) / (t_start - s_end);
        let edge = 0.2;
        let ramp = if u < edge {
            0.5 * (1.0 - (PI * u / edge).cos())
        } else if u > 1.0 - edge {
            0.5 * (1.0 - (PI * (1.0 - u) / edge).cos())
        } else {
            1.0
        };
        st_offset * ramp
    }

    /// Waveform value in mid-diastole, used as the zero-phase reference
    /// that keeps the trace centered. Recomputed at each beat start and
    /// after every config or rate change.
    fn quiet_reference(waves: &EcgWaveTable, scale: f64, l: f64) -> f64 {
        let period = 2.0 * l;
        let complex_end = (waves.u.start + waves.u.duration) * scale;
        let next_p_start = period + waves.p.start * scale;
        let x_ref = 0.5 * (complex_end + next_p_start);
        Self::wave_sum(x_ref, waves, scale, l)
    }

    /// Roll over to the next cardiac period: apply a deferred config,
    /// re-randomize the beat rate, arm the pacing mark.
    fn begin_beat(&mut self) {
        self.sim_time = 0.0;
        self.beat_count += 1;
        self.baseline_dirty = true;

        if let Some(next) = self.pending.take() {
            debug!(
                revision = next.revision,
                pathology = next.vitals.pathology.label(),
                "ecg config applied at beat boundary"
            );
            self.install_config(next);
        }

        self.rand_hr = self.randomize_beat_rate(self.hr.value());
        self.period = 60.0 / self.rand_hr.max(1.0);

        if self.paced {
            self.pacer_mark_pending = true;
        }
    }

    /// Beat-to-beat rate jitter, pathology dependent. Paced beats are
    /// metronomic.
    fn randomize_beat_rate(&mut self, hr: f64) -> f64 {
        if hr <= 0.0 {
            return 0.0;
        }
        if self.paced {
            return hr;
        }
        match self.current.vitals.pathology {
            Pathology::VentricularFibrillation => {
                (hr / 2.0) * (1.0 + self.rng.gen_range(-0.35..0.35))
            }
            Pathology::AtrialFibrillation => hr * (1.0 + self.rng.gen_range(-0.05..0.05)),
            // AV block keeps atrial timing regular; its ventricular jitter
            // lives in the escape timer.
            Pathology::AVBlock3 => hr,
            _ => {
                let frac = 0.01 + 0.14 / (1.0 + (-(hr - 150.0) / 30.0).exp());
                hr * (1.0 + self.rng.gen_range(-frac..frac))
            }
        }
    }
}
