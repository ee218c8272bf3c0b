//! Tick-driven simulation engine.
//!
//! [`MonitorSim`] owns the three waveform generators and their measurement
//! extractors and advances everything in a fixed order per tick: ECG first
//! (the pleth generator reads its beat state within the same tick), then
//! pleth, then capnography. The host calls [`MonitorSim::tick`] at the
//! nominal 50 Hz cadence and renders the returned samples; derived vitals
//! are pushed to registered [`VitalsObserver`]s as their windows close.

use tracing::{debug, info};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::measure::{
    CapnoExtractor, EcgExtractor, MeasurementChannel, Spo2Extractor, VitalsObserver,
};
use crate::sim::{CapnoGenerator, EcgGenerator, PlethGenerator};

/// One tick's worth of waveform samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSample {
    /// ECG, millivolts.
    pub ecg: f64,
    /// Plethysmograph, display units.
    pub pleth: f64,
    /// Capnogram, mmHg.
    pub capno: f64,
}

/// The complete patient simulation: generators, extractors and observers.
pub struct MonitorSim {
    config: SimConfig,

    ecg: EcgGenerator,
    pleth: PlethGenerator,
    capno: CapnoGenerator,

    ecg_ex: EcgExtractor,
    spo2_ex: Spo2Extractor,
    capno_ex: CapnoExtractor,

    // One-shot flags so a disabled channel clears its extractor exactly
    // once instead of every tick.
    ecg_ex_cleared: bool,
    spo2_ex_cleared: bool,
    capno_ex_cleared: bool,

    observers: Vec<Box<dyn VitalsObserver>>,
}

impl MonitorSim {
    /// Build a simulation with a randomly drawn seed.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        Self::with_seed(config, rand::random())
    }

    /// Build a simulation with a fixed seed. Identical seeds and tick
    /// sequences reproduce identical traces.
    pub fn with_seed(config: SimConfig, seed: u64) -> Result<Self, SimError> {
        info!(
            pathology = config.vitals.pathology.label(),
            seed, "simulation starting"
        );
        Ok(Self {
            ecg: EcgGenerator::new(config.clone(), seed)?,
            pleth: PlethGenerator::new(config.clone(), seed.wrapping_add(100))?,
            capno: CapnoGenerator::new(config.clone(), seed.wrapping_add(200))?,
            ecg_ex: EcgExtractor::new()?,
            spo2_ex: Spo2Extractor::new()?,
            capno_ex: CapnoExtractor::new()?,
            ecg_ex_cleared: false,
            spo2_ex_cleared: false,
            capno_ex_cleared: false,
            observers: Vec::new(),
            config,
        })
    }

    /// Register a vitals sink. Observers are invoked in registration order,
    /// synchronously from [`tick`](Self::tick).
    pub fn add_observer(&mut self, observer: Box<dyn VitalsObserver>) {
        self.observers.push(observer);
    }

    /// Configuration snapshot currently targeted by the generators.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Push a new configuration to every generator. With `force` the swap
    /// happens immediately; otherwise each generator defers to its next
    /// beat, pulse or breath boundary.
    pub fn apply_config(&mut self, config: SimConfig, force: bool) {
        debug!(
            revision = config.revision,
            pathology = config.vitals.pathology.label(),
            force,
            "configuration update"
        );
        self.ecg.apply_config(config.clone(), force);
        self.pleth.apply_config(config.clone(), force);
        self.capno.apply_config(config.clone(), force);
        self.config = config;
    }

    /// Trigger the defibrillation artifact on the ECG trace.
    pub fn request_shock(&mut self) {
        info!(
            energy = self.config.state.defi.charged_energy_joules,
            "shock delivered"
        );
        self.ecg.request_shock();
    }

    /// Take (and clear) the pacing-mark flag for the renderer.
    pub fn take_pacer_mark(&mut self) -> bool {
        self.ecg.take_pacer_mark()
    }

    /// Advance the whole simulation by `dt` seconds and return the three
    /// waveform samples. Disabled channels output zero and stop feeding
    /// their extractor.
    pub fn tick(&mut self, dt: f64) -> Result<TickSample, SimError> {
        if dt <= 0.0 || !dt.is_finite() {
            return Err(SimError::invalid(
                "MonitorSim",
                format!("tick width must be positive and finite, got {dt}"),
            ));
        }

        let state = self.config.state.clone();

        // The ECG generator always advances so the other traces keep a
        // beat reference; only the sample and extraction are gated.
        let ecg_raw = self.ecg.tick(dt);
        let ecg_sample = if state.ecg_enabled {
            self.ecg_ex_cleared = false;
            let (peak, rate) = self.ecg_ex.push(ecg_raw, dt);
            if peak {
                self.notify_peak(MeasurementChannel::HeartRate);
            }
            if let Some(rate) = rate {
                self.notify_measurement(MeasurementChannel::HeartRate, rate);
            }
            ecg_raw
        } else {
            if !self.ecg_ex_cleared {
                self.ecg_ex.clear();
                self.ecg_ex_cleared = true;
                self.notify_measurement(MeasurementChannel::HeartRate, 0);
            }
            0.0
        };

        let pleth_raw = self.pleth.tick(dt, &self.ecg);
        let pleth_sample = if state.spo2_enabled {
            self.spo2_ex_cleared = false;
            let (sys, dia) = if state.nibp_enabled {
                (self.pleth.current_systolic(), self.pleth.current_diastolic())
            } else {
                (0.0, 0.0)
            };
            let (peak, reading) =
                self.spo2_ex
                    .push(pleth_raw, dt, self.config.vitals.spo2, sys, dia);
            if peak {
                self.notify_peak(MeasurementChannel::PulseRate);
            }
            if let Some(reading) = reading {
                self.notify_measurement(MeasurementChannel::PulseRate, reading.pulse_rate);
                self.notify_measurement(MeasurementChannel::Spo2, reading.spo2);
            }
            pleth_raw
        } else {
            if !self.spo2_ex_cleared {
                self.spo2_ex.clear();
                self.spo2_ex_cleared = true;
                self.notify_measurement(MeasurementChannel::PulseRate, 0);
                self.notify_measurement(MeasurementChannel::Spo2, 0);
            }
            0.0
        };

        let capno_raw = self.capno.tick(dt);
        let capno_sample = if state.capno_enabled {
            self.capno_ex_cleared = false;
            let (peak, reading) = self.capno_ex.push(capno_raw, dt);
            if peak {
                self.notify_peak(MeasurementChannel::RespRate);
            }
            if let Some(reading) = reading {
                self.notify_measurement(MeasurementChannel::RespRate, reading.resp_rate);
                self.notify_measurement(MeasurementChannel::Etco2, reading.etco2);
            }
            capno_raw
        } else {
            if !self.capno_ex_cleared {
                self.capno_ex.clear();
                self.capno_ex_cleared = true;
                self.notify_measurement(MeasurementChannel::RespRate, 0);
                self.notify_measurement(MeasurementChannel::Etco2, 0);
            }
            0.0
        };

        Ok(TickSample {
            ecg: ecg_sample,
            pleth: pleth_sample,
            capno: capno_sample,
        })
    }

    fn notify_measurement(&mut self, channel: MeasurementChannel, value: i32) {
        for obs in &mut self.observers {
            obs.on_measurement(channel, value);
        }
    }

    fn notify_peak(&mut self, channel: MeasurementChannel) {
        for obs in &mut self.observers {
            obs.on_peak(channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pathology;
    use crate::sim::TICK_SECONDS;

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct Capture {
        measurements: HashMap<MeasurementChannel, Vec<i32>>,
        peaks: HashMap<MeasurementChannel, usize>,
    }

    struct SharedObserver(Rc<RefCell<Capture>>);

    impl VitalsObserver for SharedObserver {
        fn on_measurement(&mut self, channel: MeasurementChannel, value: i32) {
            self.0
                .borrow_mut()
                .measurements
                .entry(channel)
                .or_default()
                .push(value);
        }

        fn on_peak(&mut self, channel: MeasurementChannel) {
            *self.0.borrow_mut().peaks.entry(channel).or_default() += 1;
        }
    }

    fn quiet_config(pathology: &Pathology) -> SimConfig {
        let mut cfg = SimConfig::from_pathology(pathology);
        cfg.vitals.ecg_noise = 0.0;
        cfg.vitals.spo2_noise = 0.0;
        cfg.vitals.cap_noise = 0.0;
        cfg
    }

    #[test]
    fn rejects_non_positive_tick() {
        let mut sim =
            MonitorSim::with_seed(quiet_config(&Pathology::SinusRhythm), 1).unwrap();
        assert!(sim.tick(0.0).is_err());
        assert!(sim.tick(-0.02).is_err());
        assert!(sim.tick(f64::NAN).is_err());
    }

    #[test]
    fn sinus_rhythm_reports_a_plausible_heart_rate() {
        let capture = Rc::new(RefCell::new(Capture::default()));
        let mut sim =
            MonitorSim::with_seed(quiet_config(&Pathology::SinusRhythm), 2).unwrap();
        sim.add_observer(Box::new(SharedObserver(capture.clone())));

        for _ in 0..600 {
            // 12 s, three HR windows
            sim.tick(TICK_SECONDS).unwrap();
        }

        let capture = capture.borrow();
        let rates = &capture.measurements[&MeasurementChannel::HeartRate];
        assert!(!rates.is_empty());
        let last = *rates.last().unwrap();
        assert!((50..=70).contains(&last), "measured HR {last}");
        assert!(capture.peaks[&MeasurementChannel::HeartRate] >= 8);
    }

    #[test]
    fn disabled_ecg_outputs_zero_and_reports_once() {
        let capture = Rc::new(RefCell::new(Capture::default()));
        let mut cfg = quiet_config(&Pathology::SinusRhythm);
        cfg.state.ecg_enabled = false;
        let mut sim = MonitorSim::with_seed(cfg, 3).unwrap();
        sim.add_observer(Box::new(SharedObserver(capture.clone())));

        for _ in 0..100 {
            let sample = sim.tick(TICK_SECONDS).unwrap();
            assert_eq!(sample.ecg, 0.0);
        }
        let capture = capture.borrow();
        // Exactly one zero report, not one per tick.
        assert_eq!(
            capture.measurements[&MeasurementChannel::HeartRate],
            vec![0]
        );
    }

    #[test]
    fn forced_config_switch_takes_effect_immediately() {
        let mut sim =
            MonitorSim::with_seed(quiet_config(&Pathology::SinusRhythm), 4).unwrap();
        let mut next = quiet_config(&Pathology::Asystole);
        next.touch();
        sim.apply_config(next, true);

        for _ in 0..140 {
            let sample = sim.tick(TICK_SECONDS).unwrap();
            assert_eq!(sample.ecg, 0.0);
        }
    }
}
