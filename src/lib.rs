//! VitalSim Core: patient-monitor waveform simulation for clinical training
//!
//! This library synthesizes the continuous traces a bedside monitor would
//! display for a simulated patient and derives the displayed vitals from
//! those traces the way a monitor would. It features:
//!
//! - ECG synthesis from truncated Fourier series, with pathology rhythms,
//!   pacing, ST elevation and defibrillation artifacts
//! - Plethysmograph and capnography generators kept beat- and
//!   breath-synchronous with the ECG
//! - Logistic parameter interpolation so every vital change glides over a
//!   configurable duration instead of stepping
//! - Causal peak detection and windowed measurement extraction (HR, pulse
//!   rate, SpO2, respiratory rate, EtCO2)
//! - Deterministic, seedable randomness for reproducible sessions
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vitalsim_core::{MonitorSim, Pathology, SimConfig};
//! use vitalsim_core::sim::TICK_SECONDS;
//!
//! fn main() -> Result<(), vitalsim_core::SimError> {
//!     let config = SimConfig::from_pathology(&Pathology::SinusRhythm);
//!     let mut sim = MonitorSim::with_seed(config, 42)?;
//!
//!     // 50 Hz render loop
//!     for _ in 0..250 {
//!         let sample = sim.tick(TICK_SECONDS)?;
//!         println!("ecg {:+.3} mV  pleth {:.1}  co2 {:.1} mmHg",
//!             sample.ecg, sample.pleth, sample.capno);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod engine;
pub mod error;
pub mod measure;
pub mod sim;

// Re-export commonly used types for convenience
pub use config::{
    Pathology, RespiratoryRatio, ScenarioProfile, SimConfig, SimState, VitalChannel, VitalSigns,
};
pub use engine::{MonitorSim, TickSample};
pub use error::SimError;
pub use measure::{MeasurementChannel, VitalsObserver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
