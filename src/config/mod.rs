//! Configuration snapshot types.
//!
//! A [`SimConfig`] is an immutable snapshot: every change builds a new value
//! (plain `clone()` plus edits, never a serialization round-trip) and hands
//! it to the engine wholesale. Generators detect replacement through the
//! monotonically increasing `revision`, not by deep comparison.

pub mod loader;
pub mod pathology;
pub mod vitals;

pub use loader::ScenarioProfile;
pub use pathology::{Pathology, VitalChannel};
pub use vitals::{EcgWaveTable, VitalSigns, WaveShape};

use serde::{Deserialize, Serialize};

/// External pacer state.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PacerState {
    pub enabled: bool,
    /// Pacing frequency, pulses per minute.
    pub frequency_ppm: f64,
    /// Delivered energy, milliamps.
    pub energy_ma: f64,
    /// Energy at or above which the patient is captured.
    pub capture_threshold_ma: f64,
}

impl Default for PacerState {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency_ppm: 70.0,
            energy_ma: 0.0,
            capture_threshold_ma: 40.0,
        }
    }
}

/// Defibrillator state. Shock delivery itself is requested through
/// [`crate::engine::MonitorSim::request_shock`]; this only carries the
/// charged energy for the host's own bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct DefiState {
    pub charged_energy_joules: f64,
}

/// Selectable inspiration:expiration ratio for the capnography shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum RespiratoryRatio {
    /// Roughly 1:2.
    #[default]
    Normal,
    /// Roughly 1:1.
    HyperVentilation,
    /// Roughly 1:4.
    HypoVentilation,
}

impl RespiratoryRatio {
    /// Fraction of the breath period spent on inspiration.
    pub fn inspiratory_fraction(&self) -> f64 {
        match self {
            RespiratoryRatio::Normal => 1.0 / 3.0,
            RespiratoryRatio::HyperVentilation => 1.0 / 2.0,
            RespiratoryRatio::HypoVentilation => 1.0 / 5.0,
        }
    }
}

/// Device/session state: which channels run and what the accessories do.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimState {
    pub ecg_enabled: bool,
    pub spo2_enabled: bool,
    pub capno_enabled: bool,
    pub nibp_enabled: bool,

    pub cpr_active: bool,
    pub has_copd: bool,

    pub pacer: PacerState,
    pub defi: DefiState,
    pub resp_ratio: RespiratoryRatio,

    /// Seconds a parameter change takes to settle (logistic ramp width).
    pub change_duration_secs: f64,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            ecg_enabled: true,
            spo2_enabled: true,
            capno_enabled: true,
            nibp_enabled: true,
            cpr_active: false,
            has_copd: false,
            pacer: PacerState::default(),
            defi: DefiState::default(),
            resp_ratio: RespiratoryRatio::default(),
            change_duration_secs: 10.0,
        }
    }
}

/// Aggregate configuration snapshot handed to the engine per change.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SimConfig {
    pub vitals: VitalSigns,
    pub state: SimState,
    /// Snapshot revision, bumped by [`SimConfig::touch`]. Generators compare
    /// revisions to detect replacement.
    #[serde(default)]
    pub revision: u64,
}

impl SimConfig {
    /// Snapshot with a pathology's default vitals.
    pub fn from_pathology(pathology: &Pathology) -> Self {
        Self {
            vitals: VitalSigns::from_pathology(pathology),
            state: SimState::default(),
            revision: 0,
        }
    }

    /// Mark this snapshot as a new revision. Call after editing a clone.
    pub fn touch(&mut self) -> &mut Self {
        self.revision += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_bumps_revision() {
        let mut cfg = SimConfig::default();
        let r0 = cfg.revision;
        cfg.touch();
        assert_eq!(cfg.revision, r0 + 1);
    }

    #[test]
    fn clone_is_independent() {
        let cfg = SimConfig::default();
        let mut copy = cfg.clone();
        copy.vitals.hr = 150.0;
        copy.touch();
        assert_eq!(cfg.vitals.hr, 60.0);
        assert_ne!(cfg.revision, copy.revision);
    }

    #[test]
    fn inspiratory_fractions_match_ratios() {
        assert!((RespiratoryRatio::Normal.inspiratory_fraction() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(RespiratoryRatio::HyperVentilation.inspiratory_fraction(), 0.5);
        assert_eq!(RespiratoryRatio::HypoVentilation.inspiratory_fraction(), 0.2);
    }
}
