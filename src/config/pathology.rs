//! Pathology identifiers and their per-channel legal bounds.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::vitals::VitalSigns;

/// Rhythm/pathology selector.
///
/// `Custom` carries a full embedded parameter set so user-defined rhythms
/// survive as a single value without any side table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Pathology {
    SinusRhythm,
    Asystole,
    JunctionalRhythm,
    VentricularTachycardia,
    VentricularFibrillation,
    AtrialFibrillation,
    AVBlock3,
    STElevation,
    Custom(Box<VitalSigns>),
}

impl Default for Pathology {
    fn default() -> Self {
        Pathology::SinusRhythm
    }
}

/// Measurement channels a bound can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum VitalChannel {
    HeartRate,
    Spo2,
    RespRate,
    Etco2,
    NibpSystolic,
    NibpDiastolic,
}

impl Pathology {
    /// Legal value range for a channel under this pathology.
    ///
    /// Hosts validate user edits and scenario files against these before
    /// building a [`super::SimConfig`].
    pub fn bounds(&self, channel: VitalChannel) -> RangeInclusive<f64> {
        use VitalChannel::*;

        // Pathology-specific narrowing over the monitor-wide ranges.
        match (self, channel) {
            (Pathology::Asystole, HeartRate) => 0.0..=0.0,
            (Pathology::VentricularTachycardia, HeartRate) => 100.0..=300.0,
            (Pathology::JunctionalRhythm, HeartRate) => 20.0..=80.0,
            (_, HeartRate) => 0.0..=300.0,
            (_, Spo2) => 0.0..=100.0,
            (_, RespRate) => 0.0..=80.0,
            (_, Etco2) => 0.0..=150.0,
            (_, NibpSystolic) => 0.0..=300.0,
            (_, NibpDiastolic) => 0.0..=260.0,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Pathology::SinusRhythm => "sinus",
            Pathology::Asystole => "asystole",
            Pathology::JunctionalRhythm => "junctional",
            Pathology::VentricularTachycardia => "vtach",
            Pathology::VentricularFibrillation => "vfib",
            Pathology::AtrialFibrillation => "afib",
            Pathology::AVBlock3 => "av-block-3",
            Pathology::STElevation => "st-elevation",
            Pathology::Custom(_) => "custom",
        }
    }
}
