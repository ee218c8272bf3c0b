// src/error.rs
//! Error types for the simulation core.
//!
//! The core deliberately has no recoverable-error taxonomy: degenerate
//! physiology (zero heart rate, zero respiratory rate, unreadable NIBP) is
//! modeled as ordinary state. The only errors are contract violations that
//! indicate a wiring bug in the host, plus scenario-file problems surfaced
//! by the loader.

use thiserror::Error;

/// Unified error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// A constructor or tick was handed a value that can never be valid
    /// (non-positive timestep, zero-length window, negative change duration).
    #[error("invalid parameter for {component}: {reason}")]
    InvalidParameter {
        /// Component that rejected the value.
        component: &'static str,
        /// Human-readable description of the violated precondition.
        reason: String,
    },

    /// A scenario profile failed to parse.
    #[error("scenario profile parse error: {0}")]
    ProfileParse(#[from] toml::de::Error),

    /// A scenario profile parsed but carries a value outside the legal
    /// bounds for its pathology.
    #[error("scenario profile '{profile}': {field} = {value} outside {min}..={max}")]
    ProfileOutOfBounds {
        /// Profile name as given in the file.
        profile: String,
        /// Offending field.
        field: &'static str,
        /// Value found in the file.
        value: f64,
        /// Lower legal bound.
        min: f64,
        /// Upper legal bound.
        max: f64,
    },

    /// Filesystem error while reading a scenario profile.
    #[error("scenario profile io error: {0}")]
    ProfileIo(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn invalid(component: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            component,
            reason: reason.into(),
        }
    }
}
