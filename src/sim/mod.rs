//! Waveform generators and their shared building blocks.

pub mod capno;
pub mod cpr;
pub mod drift;
pub mod ecg;
pub mod interpolator;
pub mod pleth;

pub use capno::CapnoGenerator;
pub use cpr::CprArtifact;
pub use drift::BaselineDrift;
pub use ecg::EcgGenerator;
pub use interpolator::ParamSmoother;
pub use pleth::PlethGenerator;

use rand::Rng;

/// Nominal driver tick, 50 Hz.
pub const TICK_SECONDS: f64 = 0.02;

/// Which monitor trace a shared component (drift, CPR) feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformKind {
    /// Electrocardiogram, millivolts.
    Ecg,
    /// Plethysmograph, display units.
    Pleth,
    /// Capnogram, mmHg.
    Capno,
}

/// Uniform noise in `[-0.5, 0.5] * scale`.
pub(crate) fn uniform_noise<R: Rng>(rng: &mut R, scale: f64) -> f64 {
    if scale == 0.0 {
        return 0.0;
    }
    (rng.gen::<f64>() - 0.5) * scale
}
