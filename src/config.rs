//! Run configuration.
//!
//! [`SamplingGrid`] holds the interpolation parameters and [`DenoiseConfig`]
//! the detrend / filter / regression parameters. Both are plain structs with
//! `pub` fields, so struct-update syntax works, and both deserialize from
//! JSON for the `--config` flag of the binaries.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DenoiseError, Result};
use crate::pipeline::ProcessOrder;

/// Sampling parameters of the Lomb–Scargle interpolation.
///
/// ```
/// use boldclean::SamplingGrid;
///
/// let grid = SamplingGrid {
///     oversampling_frequency: 4.0,
///     ..SamplingGrid::new(2.0)
/// };
/// assert_eq!(grid.voxel_batch_size, 3000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingGrid {
    /// Repetition time in seconds.  Must be `> 0`.
    pub tr: f64,

    /// Oversampling factor of the frequency grid.
    ///
    /// A value of at least 4 is recommended.
    ///
    /// Default: `8.0`.
    pub oversampling_frequency: f64,

    /// Highest frequency fitted, as a fraction of the Nyquist frequency
    /// of the seen samples.
    ///
    /// Default: `1.0` (up to Nyquist).
    pub highpass_fraction: f64,

    /// Number of spatial units reconstructed at once.
    ///
    /// Bounds the size of the `[frequencies × batch]` coefficient and
    /// `[batch × frames]` reconstruction intermediates; has no effect on
    /// the result.
    ///
    /// Default: `3000`.
    pub voxel_batch_size: usize,
}

impl SamplingGrid {
    /// Default grid for the given repetition time.
    pub fn new(tr: f64) -> Self {
        Self {
            tr,
            ..Self::default()
        }
    }

    /// Check every parameter against its documented range.
    pub fn validate(&self) -> Result<()> {
        validate_tr(self.tr)?;
        if !(self.oversampling_frequency >= 1.0) || !self.oversampling_frequency.is_finite() {
            return Err(DenoiseError::configuration(format!(
                "oversampling frequency must be >= 1, got {}",
                self.oversampling_frequency
            )));
        }
        if !(self.highpass_fraction > 0.0) || !self.highpass_fraction.is_finite() {
            return Err(DenoiseError::configuration(format!(
                "highpass fraction must be > 0, got {}",
                self.highpass_fraction
            )));
        }
        if self.voxel_batch_size == 0 {
            return Err(DenoiseError::configuration("voxel batch size must be > 0"));
        }
        Ok(())
    }
}

impl Default for SamplingGrid {
    /// `tr = 0` is a placeholder: set it before use, [`SamplingGrid::validate`]
    /// rejects it.
    fn default() -> Self {
        Self {
            tr: 0.0,
            oversampling_frequency: 8.0,
            highpass_fraction: 1.0,
            voxel_batch_size: 3000,
        }
    }
}

/// Configuration of the detrend → filter/regress pipeline.
///
/// ```
/// use boldclean::{DenoiseConfig, ProcessOrder};
///
/// let cfg = DenoiseConfig {
///     process_order: "DMT-REG-TMP".parse::<ProcessOrder>().unwrap(),
///     ..DenoiseConfig::new(2.0)
/// };
/// assert_eq!(cfg.filter_order, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Repetition time in seconds.
    pub tr: f64,

    /// Upper band edge in Hz (the filter's lowpass cutoff).
    ///
    /// A value equal to the Nyquist frequency designs a highpass-only
    /// filter.
    ///
    /// Default: `0.08` Hz.
    pub lowpass: f64,

    /// Lower band edge in Hz (the filter's highpass cutoff).
    ///
    /// Default: `0.01` Hz.
    pub highpass: f64,

    /// Butterworth prototype order.  The bandpass has twice this many poles.
    ///
    /// Default: `2`.
    pub filter_order: usize,

    /// Polynomial order of the detrend.
    ///
    /// Default: `1` (linear).
    pub detrend_order: usize,

    /// Stage sequence.
    ///
    /// Default: `DMT-TMP-REG`.
    pub process_order: ProcessOrder,
}

impl DenoiseConfig {
    /// Default configuration for the given repetition time.
    pub fn new(tr: f64) -> Self {
        Self {
            tr,
            ..Self::default()
        }
    }

    /// Sampling frequency in Hz (`1 / TR`).
    pub fn sampling_frequency(&self) -> f64 {
        1.0 / self.tr
    }

    /// Check TR and the filter band.
    pub fn validate(&self) -> Result<()> {
        validate_tr(self.tr)?;
        if self.filter_order == 0 {
            return Err(DenoiseError::configuration("filter order must be >= 1"));
        }
        if self.process_order.contains(crate::pipeline::Stage::Filter) {
            crate::filter::check_band(self.sampling_frequency(), self.lowpass, self.highpass)?;
        }
        Ok(())
    }

    /// Read a JSON configuration file.  Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        read_json(path)
    }
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            tr: 0.0,
            lowpass: 0.08,
            highpass: 0.01,
            filter_order: 2,
            detrend_order: 1,
            process_order: ProcessOrder::default(),
        }
    }
}

impl SamplingGrid {
    /// Read a JSON configuration file.  Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        read_json(path)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    use anyhow::Context;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

pub(crate) fn validate_tr(tr: f64) -> Result<()> {
    if tr > 0.0 && tr.is_finite() {
        Ok(())
    } else {
        Err(DenoiseError::configuration(format!(
            "repetition time must be > 0 s, got {tr}"
        )))
    }
}
