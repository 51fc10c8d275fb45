//! Error taxonomy for the numerical core.
//!
//! Every variant is fatal for the run that produced it: nothing is retried
//! and no partial output is written. File plumbing (`io`, the binaries) uses
//! `anyhow` and wraps these with context.

use thiserror::Error;

/// Result alias used by the numerical modules.
pub type Result<T> = std::result::Result<T, DenoiseError>;

/// Errors raised by interpolation, detrending, filtering and regression.
#[derive(Debug, Error)]
pub enum DenoiseError {
    /// Malformed or missing scalar parameter (TR ≤ 0, unknown suffix, ...).
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// Not enough samples for the requested operation.
    #[error("Insufficient data for {what}: required {required}, actual {actual}")]
    InsufficientData {
        /// Which quantity is too small
        what: &'static str,
        /// Minimum required count
        required: usize,
        /// Count actually available
        actual: usize,
    },

    /// Every frame is seen; interpolation is a no-op.
    #[error("No censored frames: no interpolation is necessary for this dataset")]
    NothingToInterpolate,

    /// Timepoint (or unit) counts disagree between inputs.
    #[error("Dimension mismatch for {what}: expected {expected}, actual {actual}")]
    DimensionMismatch {
        /// Which inputs disagree
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Length found
        actual: usize,
    },

    /// Rank-deficient design or non-finite intermediate.
    #[error("Numerical instability: {message}")]
    NumericalInstability {
        /// Description of the instability
        message: String,
    },

    /// Band edges violate `0 < highpass < lowpass <= nyquist`.
    #[error(
        "Invalid filter band: highpass {highpass} Hz, lowpass {lowpass} Hz, nyquist {nyquist} Hz \
         (require 0 < highpass < lowpass <= nyquist)"
    )]
    InvalidFilterBand {
        highpass: f64,
        lowpass: f64,
        nyquist: f64,
    },
}

impl DenoiseError {
    /// Create a Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an InsufficientData error.
    pub fn insufficient_data(what: &'static str, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            what,
            required,
            actual,
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Create a NumericalInstability error.
    pub fn numerical_instability(message: impl Into<String>) -> Self {
        Self::NumericalInstability {
            message: message.into(),
        }
    }
}
