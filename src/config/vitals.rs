//! Target physiology: vital-sign values and ECG wave descriptors.

use serde::{Deserialize, Serialize};

use super::pathology::Pathology;

/// Shape of a single ECG wave component (P, Q, QRS, S, T or U).
///
/// `start` is the wave's center offset in seconds relative to the R peak:
/// negative for waves preceding the QRS complex, positive for waves after
/// it. A `duration` of zero means the wave is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct WaveShape {
    /// Peak amplitude in millivolts. Negative waves (Q, S) carry a positive
    /// amplitude here; the synthesizer applies the sign.
    pub amplitude: f64,
    /// Center offset from the R peak in seconds, signed.
    pub start: f64,
    /// Wave width in seconds. Zero suppresses the wave.
    pub duration: f64,
}

impl WaveShape {
    /// Suppressed wave: zero everywhere.
    pub const SUPPRESSED: WaveShape = WaveShape {
        amplitude: 0.0,
        start: 0.0,
        duration: 0.0,
    };

    pub const fn new(amplitude: f64, start: f64, duration: f64) -> Self {
        Self {
            amplitude,
            start,
            duration,
        }
    }
}

/// Full P/Q/QRS/S/T/U wave table for one rhythm.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EcgWaveTable {
    pub p: WaveShape,
    pub q: WaveShape,
    pub qrs: WaveShape,
    pub s: WaveShape,
    pub t: WaveShape,
    pub u: WaveShape,
    /// Extra width added to the QRS duration, e.g. for ventricular rhythms.
    pub qrs_duration_offset: f64,
}

impl Default for EcgWaveTable {
    /// Textbook sinus morphology at moderate rates.
    fn default() -> Self {
        Self {
            p: WaveShape::new(0.25, -0.16, 0.09),
            q: WaveShape::new(0.025, -0.166, 0.066),
            qrs: WaveShape::new(1.6, 0.0, 0.11),
            s: WaveShape::new(0.25, 0.09, 0.066),
            t: WaveShape::new(0.35, 0.245, 0.142),
            u: WaveShape::new(0.035, 0.433, 0.0476),
            qrs_duration_offset: 0.0,
        }
    }
}

/// Target vital signs driving all three generators.
///
/// This is a plain value type: configuration changes hand the generators a
/// whole new `VitalSigns` (inside a new [`super::SimConfig`]); nothing here
/// is ever mutated in place by the core.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VitalSigns {
    /// Rhythm this parameter set was derived from.
    pub pathology: Pathology,

    /// Target heart rate in bpm. Zero is asystole, a first-class state.
    pub hr: f64,
    /// ECG wave morphology.
    pub ecg_waves: EcgWaveTable,
    /// Global baseline offset added to the ECG trace, millivolts.
    pub ecg_offset: f64,
    /// ST-segment raise between the S and T waves, millivolts.
    pub st_offset: f64,
    /// Uniform noise amplitude on the ECG trace.
    pub ecg_noise: f64,

    /// Target SpO2 in percent.
    pub spo2: f64,
    /// Uniform noise amplitude on the pleth trace.
    pub spo2_noise: f64,

    /// Target respiratory rate in breaths per minute. Zero means no breath.
    pub rr: f64,
    /// Target end-tidal CO2 in mmHg.
    pub etco2: f64,
    /// Uniform noise amplitude on the capnography trace.
    pub cap_noise: f64,

    /// NIBP systolic target, mmHg.
    pub nibp_sys: f64,
    /// NIBP diastolic target, mmHg.
    pub nibp_dia: f64,
}

impl Default for VitalSigns {
    fn default() -> Self {
        VitalSigns::from_pathology(&Pathology::SinusRhythm)
    }
}

impl VitalSigns {
    /// Default parameter set for a pathology.
    pub fn from_pathology(pathology: &Pathology) -> Self {
        let sinus = Self {
            pathology: Pathology::SinusRhythm,
            hr: 60.0,
            ecg_waves: EcgWaveTable::default(),
            ecg_offset: 0.0,
            st_offset: 0.0,
            ecg_noise: 0.01,
            spo2: 97.0,
            spo2_noise: 0.2,
            rr: 12.0,
            etco2: 38.0,
            cap_noise: 0.15,
            nibp_sys: 120.0,
            nibp_dia: 80.0,
        };

        match pathology {
            Pathology::SinusRhythm => sinus,
            Pathology::Asystole => Self {
                pathology: Pathology::Asystole,
                hr: 0.0,
                ecg_waves: EcgWaveTable {
                    p: WaveShape::SUPPRESSED,
                    q: WaveShape::SUPPRESSED,
                    qrs: WaveShape::SUPPRESSED,
                    s: WaveShape::SUPPRESSED,
                    t: WaveShape::SUPPRESSED,
                    u: WaveShape::SUPPRESSED,
                    qrs_duration_offset: 0.0,
                },
                ecg_noise: 0.02,
                spo2: 0.0,
                spo2_noise: 0.5,
                rr: 0.0,
                etco2: 0.0,
                cap_noise: 0.3,
                nibp_sys: 0.0,
                nibp_dia: 0.0,
                ..sinus
            },
            Pathology::JunctionalRhythm => Self {
                pathology: Pathology::JunctionalRhythm,
                hr: 45.0,
                ecg_waves: EcgWaveTable {
                    p: WaveShape::SUPPRESSED,
                    ..EcgWaveTable::default()
                },
                spo2: 94.0,
                nibp_sys: 100.0,
                nibp_dia: 65.0,
                ..sinus
            },
            Pathology::VentricularTachycardia => Self {
                pathology: Pathology::VentricularTachycardia,
                hr: 180.0,
                ecg_waves: EcgWaveTable {
                    p: WaveShape::SUPPRESSED,
                    q: WaveShape::SUPPRESSED,
                    qrs: WaveShape::new(1.2, 0.0, 0.14),
                    s: WaveShape::new(0.4, 0.11, 0.09),
                    t: WaveShape::new(0.5, 0.2, 0.16),
                    u: WaveShape::SUPPRESSED,
                    qrs_duration_offset: 0.06,
                },
                spo2: 85.0,
                spo2_noise: 0.8,
                rr: 18.0,
                etco2: 30.0,
                nibp_sys: 80.0,
                nibp_dia: 50.0,
                ..sinus
            },
            Pathology::VentricularFibrillation => Self {
                pathology: Pathology::VentricularFibrillation,
                hr: 180.0,
                ecg_waves: EcgWaveTable {
                    p: WaveShape::SUPPRESSED,
                    q: WaveShape::SUPPRESSED,
                    qrs: WaveShape::new(0.6, 0.0, 0.16),
                    s: WaveShape::SUPPRESSED,
                    t: WaveShape::new(0.4, 0.18, 0.18),
                    u: WaveShape::SUPPRESSED,
                    qrs_duration_offset: 0.04,
                },
                ecg_noise: 0.08,
                spo2: 0.0,
                spo2_noise: 2.0,
                rr: 0.0,
                etco2: 0.0,
                cap_noise: 1.0,
                nibp_sys: 0.0,
                nibp_dia: 0.0,
                ..sinus
            },
            Pathology::AtrialFibrillation => Self {
                pathology: Pathology::AtrialFibrillation,
                hr: 110.0,
                ecg_waves: EcgWaveTable {
                    p: WaveShape::SUPPRESSED,
                    ..EcgWaveTable::default()
                },
                ecg_noise: 0.04,
                spo2: 95.0,
                nibp_sys: 110.0,
                nibp_dia: 75.0,
                ..sinus
            },
            Pathology::AVBlock3 => Self {
                pathology: Pathology::AVBlock3,
                hr: 70.0,
                spo2: 92.0,
                nibp_sys: 105.0,
                nibp_dia: 70.0,
                ..sinus
            },
            Pathology::STElevation => Self {
                pathology: Pathology::STElevation,
                hr: 85.0,
                st_offset: 0.25,
                spo2: 94.0,
                rr: 16.0,
                nibp_sys: 135.0,
                nibp_dia: 85.0,
                ..sinus
            },
            Pathology::Custom(vitals) => {
                let mut v = (**vitals).clone();
                v.pathology = pathology.clone();
                v
            }
        }
    }
}
