//! End-to-end scenarios driven through the full engine: smooth vital
//! transitions, pathology defaults, apnea and defibrillation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use vitalsim_core::measure::{
    CapnoExtractor, ExtractorParams, RateRounding, WindowedExtractor,
};
use vitalsim_core::sim::{EcgGenerator, TICK_SECONDS};
use vitalsim_core::{
    MeasurementChannel, MonitorSim, Pathology, SimConfig, VitalsObserver,
};

#[derive(Default)]
struct Capture {
    measurements: HashMap<MeasurementChannel, Vec<i32>>,
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
}

fn quiet_config(pathology: &Pathology) -> SimConfig {
    let mut cfg = SimConfig::from_pathology(pathology);
    cfg.vitals.ecg_noise = 0.0;
    cfg.vitals.spo2_noise = 0.0;
    cfg.vitals.cap_noise = 0.0;
    cfg
}

/// A heart-rate change glides along the logistic curve: roughly halfway
/// after half the change duration, settled (within beat jitter) afterwards.
#[test]
fn heart_rate_transition_follows_the_logistic_curve() {
    let mut cfg = quiet_config(&Pathology::SinusRhythm);
    cfg.state.change_duration_secs = 20.0;
    let mut ecg = EcgGenerator::new(cfg.clone(), 7).unwrap();

    // Settle at 60 bpm first.
    for _ in 0..100 {
        ecg.tick(TICK_SECONDS);
    }
    assert!((ecg.randomized_heart_rate() - 60.0).abs() < 4.0);

    let mut next = cfg.clone();
    next.vitals.hr = 120.0;
    next.touch();
    ecg.apply_config(next, true);

    // Halfway through the 20 s change: near the logistic midpoint. The
    // beat-boundary update cadence and per-beat jitter leave a few bpm of
    // slack around 90.
    for _ in 0..500 {
        ecg.tick(TICK_SECONDS);
    }
    let mid = ecg.randomized_heart_rate();
    assert!((78.0..=102.0).contains(&mid), "midpoint rate was {mid}");

    // Well past the change duration: settled at the target.
    for _ in 0..1000 {
        ecg.tick(TICK_SECONDS);
    }
    let settled = ecg.randomized_heart_rate();
    assert!((settled - 120.0).abs() < 5.0, "settled rate was {settled}");
}

/// Ventricular fibrillation forces the secondary channels flat: no
/// saturation, no breathing, no pressure.
#[test]
fn vfib_defaults_flatten_secondary_channels() {
    let cfg = SimConfig::from_pathology(&Pathology::VentricularFibrillation);
    assert_eq!(cfg.vitals.spo2, 0.0);
    assert_eq!(cfg.vitals.rr, 0.0);
    assert_eq!(cfg.vitals.etco2, 0.0);
    assert_eq!(cfg.vitals.nibp_sys, 0.0);
    assert_eq!(cfg.vitals.nibp_dia, 0.0);

    // With the noise layers silenced the capnogram is exactly flat.
    let mut quiet = cfg;
    quiet.vitals.ecg_noise = 0.0;
    quiet.vitals.spo2_noise = 0.0;
    quiet.vitals.cap_noise = 0.0;
    let mut sim = MonitorSim::with_seed(quiet, 8).unwrap();
    for _ in 0..140 {
        let sample = sim.tick(TICK_SECONDS).unwrap();
        assert_eq!(sample.capno, 0.0);
    }
}

/// SpO2 cannot be read without valid pressure: the VFib NIBP of 0/0 fails
/// the gate and the saturation reports zero even though the pleth pulses.
#[test]
fn vfib_spo2_reads_zero_through_the_nibp_gate() {
    let capture = Rc::new(RefCell::new(Capture::default()));
    let mut cfg = SimConfig::from_pathology(&Pathology::VentricularFibrillation);
    cfg.vitals.ecg_noise = 0.0;
    cfg.vitals.spo2_noise = 0.0;
    cfg.vitals.cap_noise = 0.0;
    let mut sim = MonitorSim::with_seed(cfg, 9).unwrap();
    sim.add_observer(Box::new(SharedObserver(capture.clone())));

    for _ in 0..450 {
        // > two SpO2 windows
        sim.tick(TICK_SECONDS).unwrap();
    }
    let capture = capture.borrow();
    let spo2 = &capture.measurements[&MeasurementChannel::Spo2];
    assert!(!spo2.is_empty());
    assert!(spo2.iter().all(|&v| v == 0), "spo2 readings {spo2:?}");
}

/// Apnea: zero respiratory rate keeps the capnogram flat and, after the
/// idle timeout, both derived respiratory vitals report zero rather than a
/// stale average.
#[test]
fn apnea_reports_zero_resp_rate_and_etco2() {
    let capture = Rc::new(RefCell::new(Capture::default()));
    let mut cfg = quiet_config(&Pathology::SinusRhythm);
    cfg.vitals.rr = 0.0;
    let mut sim = MonitorSim::with_seed(cfg, 10).unwrap();
    sim.add_observer(Box::new(SharedObserver(capture.clone())));

    for _ in 0..850 {
        // one full 16 s capno window
        sim.tick(TICK_SECONDS).unwrap();
    }
    let capture = capture.borrow();
    assert_eq!(capture.measurements[&MeasurementChannel::RespRate], vec![0]);
    assert_eq!(capture.measurements[&MeasurementChannel::Etco2], vec![0]);
}

/// A deferred (non-forced) configuration change must take effect even when
/// every trace is flat: asystole has no beat boundary and apnea no breath
/// boundary, so recovery cannot wait for one.
#[test]
fn deferred_recovery_from_cardiac_arrest() {
    let mut arrest = quiet_config(&Pathology::Asystole);
    arrest.state.change_duration_secs = 2.0;
    let mut sim = MonitorSim::with_seed(arrest, 13).unwrap();
    for _ in 0..50 {
        sim.tick(TICK_SECONDS).unwrap();
    }

    let mut recovery = quiet_config(&Pathology::SinusRhythm);
    recovery.state.change_duration_secs = 2.0;
    recovery.touch();
    sim.apply_config(recovery, false);

    let mut max_ecg = f64::MIN;
    let mut max_capno = f64::MIN;
    for _ in 0..1500 {
        // 30 s
        let s = sim.tick(TICK_SECONDS).unwrap();
        max_ecg = max_ecg.max(s.ecg);
        max_capno = max_capno.max(s.capno);
    }
    assert!(max_ecg > 1.0, "rhythm never returned; max ecg {max_ecg}");
    assert!(
        max_capno > 20.0,
        "breathing never returned; max co2 {max_capno}"
    );
}

/// A delivered shock overrides the ECG for exactly two ticks: a positive
/// rise then a negative recovery, after which the underlying rhythm
/// resumes.
#[test]
fn shock_artifact_spans_two_ticks_then_rhythm_resumes() {
    let mut sim = MonitorSim::with_seed(quiet_config(&Pathology::Asystole), 11).unwrap();
    for _ in 0..10 {
        assert_eq!(sim.tick(TICK_SECONDS).unwrap().ecg, 0.0);
    }

    sim.request_shock();
    let rise = sim.tick(TICK_SECONDS).unwrap().ecg;
    let recovery = sim.tick(TICK_SECONDS).unwrap().ecg;
    assert!(rise > 1.0, "rise was {rise}");
    assert!(recovery < -0.1, "recovery was {recovery}");
    assert_eq!(sim.tick(TICK_SECONDS).unwrap().ecg, 0.0);
}

/// The rate rounding policies really differ: the same 9-peak window reads
/// 34 rounded and 33 truncated.
#[test]
fn rounding_policies_diverge_on_fractional_rates() {
    let signal = {
        // 9 sharp pulses across an 800-sample window, 33.75 peaks/min.
        let mut out = Vec::with_capacity(800);
        for _ in 0..9 {
            out.extend_from_slice(&[0.0, 1.0, 2.0, 1.0, 0.0]);
            out.extend(std::iter::repeat(0.0).take(800 / 9 - 5));
        }
        out.resize(800, 0.0);
        out
    };

    let run = |rounding: RateRounding| {
        let mut params = ExtractorParams::capno();
        params.rounding = rounding;
        let mut ex = WindowedExtractor::new(params).unwrap();
        let mut rate = None;
        for &v in &signal {
            if let (_, Some(summary)) = ex.push(v, TICK_SECONDS) {
                rate = Some(summary.rate);
            }
        }
        rate.unwrap()
    };

    assert_eq!(run(RateRounding::Nearest), 34);
    assert_eq!(run(RateRounding::Truncate), 33);
}

/// Sinus capnography measured end to end: the derived respiratory rate and
/// EtCO2 land near the configured targets.
#[test]
fn sinus_capnography_measures_back_its_targets() {
    let mut ex = CapnoExtractor::new().unwrap();
    let cfg = quiet_config(&Pathology::SinusRhythm);
    let mut sim = MonitorSim::with_seed(cfg.clone(), 12).unwrap();

    let mut reading = None;
    for _ in 0..1700 {
        // two capno windows, history averaging engaged
        let sample = sim.tick(TICK_SECONDS).unwrap();
        if let (_, Some(r)) = ex.push(sample.capno, TICK_SECONDS) {
            reading = Some(r);
        }
    }
    let reading = reading.unwrap();
    // RR 12 with ±7.5 % breath jitter; EtCO2 38 likewise.
    assert!(
        (9..=15).contains(&reading.resp_rate),
        "resp rate {}",
        reading.resp_rate
    );
    assert!(
        (32..=44).contains(&reading.etco2),
        "etco2 {}",
        reading.etco2
    );
}
