//! Measurement extraction from the synthesized waveforms.
//!
//! The generators in [`crate::sim`] know the configured targets, but the
//! displayed vitals are deliberately derived the way a monitor would derive
//! them: by detecting peaks in the waveform and counting them over fixed
//! windows. A configuration change therefore shows up in the numbers with
//! the same lag a real monitor would exhibit.

pub mod extractor;
pub mod peaks;

pub use extractor::{
    CapnoExtractor, CapnoReading, EcgExtractor, ExtractorParams, RateRounding, Spo2Extractor,
    Spo2Reading, WindowSummary, WindowedExtractor,
};
pub use peaks::{GradientPeakDetector, PeakStep};

/// Which derived vital a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementChannel {
    /// Heart rate from the ECG trace, bpm.
    HeartRate,
    /// Pulse rate from the pleth trace, bpm.
    PulseRate,
    /// Oxygen saturation, percent.
    Spo2,
    /// Respiratory rate from the capnogram, breaths/min.
    RespRate,
    /// End-tidal CO2, mmHg.
    Etco2,
}

impl MeasurementChannel {
    /// Display label, matching bedside-monitor conventions.
    pub fn label(&self) -> &'static str {
        match self {
            MeasurementChannel::HeartRate => "HR",
            MeasurementChannel::PulseRate => "PR",
            MeasurementChannel::Spo2 => "SpO2",
            MeasurementChannel::RespRate => "RR",
            MeasurementChannel::Etco2 => "EtCO2",
        }
    }
}

/// Sink for derived vitals and beat/breath events.
///
/// Implementations are called synchronously from [`crate::MonitorSim::tick`];
/// they must return quickly.
pub trait VitalsObserver {
    /// A measurement window closed and produced a value.
    fn on_measurement(&mut self, channel: MeasurementChannel, value: i32);

    /// A peak was accepted on the given channel (QRS complex, pleth pulse
    /// or breath). Useful for beep/flash cues.
    fn on_peak(&mut self, channel: MeasurementChannel) {
        let _ = channel;
    }
}
