//! Scenario-profile loading.
//!
//! Hosts describe named scenarios in TOML (a pathology plus optional vitals
//! and session-state overrides). Profiles are validated against the
//! pathology's per-channel bounds before they become a [`SimConfig`]
//! snapshot. There is no hot reload: the core is driven by whole-snapshot
//! replacement, so watching files is the host's business.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::pathology::{Pathology, VitalChannel};
use super::vitals::VitalSigns;
use super::{SimConfig, SimState};
use crate::error::SimError;

/// A named, loadable scenario.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pathology: Pathology,
    /// Full vitals override; defaults to the pathology's own defaults.
    #[serde(default)]
    pub vitals: Option<VitalSigns>,
    /// Session-state override; defaults to [`SimState::default`].
    #[serde(default)]
    pub state: Option<SimState>,
}

impl ScenarioProfile {
    /// Parse a profile from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, SimError> {
        let profile: ScenarioProfile = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load and validate a profile file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load every `.toml` profile in a directory, skipping (and logging)
    /// files that fail validation.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<Self>, SimError> {
        let mut profiles = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "toml") != Some(true) {
                continue;
            }
            match Self::load_file(&path) {
                Ok(profile) => profiles.push(profile),
                Err(err) => warn!(path = %path.display(), %err, "skipping invalid scenario profile"),
            }
        }
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    /// Built-in profiles, one per predefined pathology.
    pub fn builtin() -> Vec<Self> {
        [
            Pathology::SinusRhythm,
            Pathology::Asystole,
            Pathology::JunctionalRhythm,
            Pathology::VentricularTachycardia,
            Pathology::VentricularFibrillation,
            Pathology::AtrialFibrillation,
            Pathology::AVBlock3,
            Pathology::STElevation,
        ]
        .into_iter()
        .map(|p| ScenarioProfile {
            name: p.label().to_string(),
            description: String::new(),
            vitals: None,
            state: None,
            pathology: p,
        })
        .collect()
    }

    /// Effective vitals after applying the override.
    pub fn effective_vitals(&self) -> VitalSigns {
        self.vitals
            .clone()
            .unwrap_or_else(|| VitalSigns::from_pathology(&self.pathology))
    }

    /// Check every channel value against the pathology bounds.
    pub fn validate(&self) -> Result<(), SimError> {
        let vitals = self.effective_vitals();
        let checks: [(VitalChannel, &'static str, f64); 6] = [
            (VitalChannel::HeartRate, "hr", vitals.hr),
            (VitalChannel::Spo2, "spo2", vitals.spo2),
            (VitalChannel::RespRate, "rr", vitals.rr),
            (VitalChannel::Etco2, "etco2", vitals.etco2),
            (VitalChannel::NibpSystolic, "nibp_sys", vitals.nibp_sys),
            (VitalChannel::NibpDiastolic, "nibp_dia", vitals.nibp_dia),
        ];
        for (channel, field, value) in checks {
            let bounds = self.pathology.bounds(channel);
            if !bounds.contains(&value) {
                return Err(SimError::ProfileOutOfBounds {
                    profile: self.name.clone(),
                    field,
                    value,
                    min: *bounds.start(),
                    max: *bounds.end(),
                });
            }
        }
        Ok(())
    }

    /// Turn the profile into a fresh configuration snapshot.
    pub fn into_config(self) -> SimConfig {
        let vitals = self.effective_vitals();
        SimConfig {
            vitals,
            state: self.state.unwrap_or_default(),
            revision: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
name = "training-sinus"
description = "default sinus rhythm"
pathology = "SinusRhythm"
"#;

    #[test]
    fn minimal_profile_uses_pathology_defaults() {
        let profile = ScenarioProfile::from_toml_str(MINIMAL).unwrap();
        let cfg = profile.into_config();
        assert_eq!(cfg.vitals.hr, 60.0);
        assert!(cfg.state.ecg_enabled);
    }

    #[test]
    fn out_of_bounds_vitals_are_rejected() {
        let text = r#"
name = "bad"
pathology = "Asystole"

[vitals]
pathology = "Asystole"
hr = 50.0
ecg_offset = 0.0
st_offset = 0.0
ecg_noise = 0.02
spo2 = 0.0
spo2_noise = 0.5
rr = 0.0
etco2 = 0.0
cap_noise = 0.3
nibp_sys = 0.0
nibp_dia = 0.0

[vitals.ecg_waves]
qrs_duration_offset = 0.0
p = { amplitude = 0.0, start = 0.0, duration = 0.0 }
q = { amplitude = 0.0, start = 0.0, duration = 0.0 }
qrs = { amplitude = 0.0, start = 0.0, duration = 0.0 }
s = { amplitude = 0.0, start = 0.0, duration = 0.0 }
t = { amplitude = 0.0, start = 0.0, duration = 0.0 }
u = { amplitude = 0.0, start = 0.0, duration = 0.0 }
"#;
        let err = ScenarioProfile::from_toml_str(text).unwrap_err();
        match err {
            SimError::ProfileOutOfBounds { field, value, .. } => {
                assert_eq!(field, "hr");
                assert_eq!(value, 50.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_dir_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.toml"), MINIMAL).unwrap();
        let mut broken = std::fs::File::create(dir.path().join("broken.toml")).unwrap();
        writeln!(broken, "not = [valid").unwrap();

        let profiles = ScenarioProfile::load_dir(dir.path()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "training-sinus");
    }

    #[test]
    fn builtin_profiles_all_validate() {
        for profile in ScenarioProfile::builtin() {
            profile.validate().unwrap();
        }
    }
}
