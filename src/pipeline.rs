//! Detrend → {filter, regress} denoising pipeline.
//!
//! ```text
//!  data [units, T]        confounds [regressors, T]
//!        │                         │
//!        ├── dvars_pre             │
//!        ▼                         ▼
//!   Detrend (demean + polynomial, both inputs)
//!        │                         │
//!   Filter ◄── applied to confounds too when Regress is still to come
//!   Regress ◄── residualise data against the current confounds
//!        │
//!        ├── dvars_post
//!        ▼
//!     cleaned
//! ```
//!
//! The stage sequence is a [`ProcessOrder`]; the pipeline interprets it in
//! order rather than branching on fixed positions.
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::DenoiseConfig;
use crate::error::{DenoiseError, Result};
use crate::filter;
use crate::normalize::demean_detrend;
use crate::qc::compute_dvars;
use crate::regress::regress_confounds;

/// One processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Demean and remove a polynomial trend (`DMT`).
    Detrend,
    /// Zero-phase Butterworth band filter (`TMP`).
    Filter,
    /// Nuisance regression (`REG`).
    Regress,
}

impl Stage {
    /// Short token used in processing-order strings.
    pub fn token(self) -> &'static str {
        match self {
            Stage::Detrend => "DMT",
            Stage::Filter => "TMP",
            Stage::Regress => "REG",
        }
    }
}

impl FromStr for Stage {
    type Err = DenoiseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dmt" | "detrend" => Ok(Stage::Detrend),
            "tmp" | "filter" => Ok(Stage::Filter),
            "reg" | "regress" => Ok(Stage::Regress),
            other => Err(DenoiseError::configuration(format!(
                "unknown processing stage '{other}' (expected DMT, TMP or REG)"
            ))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Ordered stage list: `Detrend` first, every stage at most once.
///
/// ```
/// use boldclean::{ProcessOrder, Stage};
///
/// let order: ProcessOrder = "dmt-reg-tmp".parse().unwrap();
/// assert_eq!(order.stages(), &[Stage::Detrend, Stage::Regress, Stage::Filter]);
/// assert_eq!(order.to_string(), "DMT-REG-TMP");
/// assert!("TMP-DMT".parse::<ProcessOrder>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessOrder(Vec<Stage>);

impl ProcessOrder {
    /// Build from an explicit stage list.
    ///
    /// # Errors
    ///
    /// [`DenoiseError::Configuration`] if the list is empty, does not start
    /// with [`Stage::Detrend`], or repeats a stage.
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.first() != Some(&Stage::Detrend) {
            return Err(DenoiseError::configuration(
                "processing order must start with DMT (detrend)",
            ));
        }
        for (i, s) in stages.iter().enumerate() {
            if stages[..i].contains(s) {
                return Err(DenoiseError::configuration(format!(
                    "processing stage {s} appears more than once"
                )));
            }
        }
        Ok(Self(stages))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.0
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.0.contains(&stage)
    }

    /// Whether `stage` occurs after position `pos`.
    fn pending_after(&self, pos: usize, stage: Stage) -> bool {
        self.0[pos + 1..].contains(&stage)
    }
}

impl Default for ProcessOrder {
    /// `DMT-TMP-REG`.
    fn default() -> Self {
        Self(vec![Stage::Detrend, Stage::Filter, Stage::Regress])
    }
}

impl FromStr for ProcessOrder {
    type Err = DenoiseError;

    fn from_str(s: &str) -> Result<Self> {
        let stages = s
            .split(|c: char| c == '-' || c == ',' || c.is_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(Stage::from_str)
            .collect::<Result<Vec<_>>>()?;
        Self::new(stages)
    }
}

impl fmt::Display for ProcessOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.0.iter().map(|s| s.token()).collect();
        f.write_str(&tokens.join("-"))
    }
}

impl TryFrom<String> for ProcessOrder {
    type Error = DenoiseError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ProcessOrder> for String {
    fn from(order: ProcessOrder) -> Self {
        order.to_string()
    }
}

/// Result of [`DenoisePipeline::run`].
#[derive(Debug, Clone)]
pub struct DenoiseOutput {
    /// Cleaned series, `[units, T]`.
    pub cleaned: Array2<f64>,
    /// DVARS of the input series.
    pub dvars_pre: Array1<f64>,
    /// DVARS of the cleaned series.
    pub dvars_post: Array1<f64>,
}

/// A validated pipeline configuration.
#[derive(Debug, Clone)]
pub struct DenoisePipeline {
    cfg: DenoiseConfig,
}

impl DenoisePipeline {
    /// # Errors
    ///
    /// Whatever [`DenoiseConfig::validate`] reports.
    pub fn new(cfg: DenoiseConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &DenoiseConfig {
        &self.cfg
    }

    /// Clean `data` ([units, T]) against `confounds` ([regressors, T]).
    ///
    /// # Errors
    ///
    /// * [`DenoiseError::DimensionMismatch`] if the timepoint counts differ.
    /// * Any error of the individual stages.
    pub fn run(&self, data: &Array2<f64>, confounds: &Array2<f64>) -> Result<DenoiseOutput> {
        let n_t = data.ncols();
        if confounds.ncols() != n_t {
            return Err(DenoiseError::dimension_mismatch(
                "timepoints in confounds vs data",
                n_t,
                confounds.ncols(),
            ));
        }
        let cfg = &self.cfg;
        tracing::info!(
            n_units = data.nrows(),
            n_regressors = confounds.nrows(),
            n_t,
            order = %cfg.process_order,
            "denoising"
        );

        let dvars_pre = compute_dvars(data);

        let mut cur = data.clone();
        let mut conf = confounds.clone();
        for (pos, &stage) in cfg.process_order.stages().iter().enumerate() {
            tracing::debug!(stage = %stage, "running stage");
            match stage {
                Stage::Detrend => {
                    cur = demean_detrend(&cur, cfg.tr, cfg.detrend_order)?;
                    conf = demean_detrend(&conf, cfg.tr, cfg.detrend_order)?;
                }
                Stage::Filter => {
                    let coeffs = filter::design_bandpass(
                        cfg.filter_order,
                        cfg.sampling_frequency(),
                        cfg.lowpass,
                        cfg.highpass,
                    )?;
                    cur = filter::apply_filtfilt(&cur, &coeffs)?;
                    if cfg.process_order.pending_after(pos, Stage::Regress) {
                        conf = filter::apply_filtfilt(&conf, &coeffs)?;
                    }
                }
                Stage::Regress => {
                    cur = regress_confounds(&cur, &conf)?;
                }
            }
        }

        let dvars_post = compute_dvars(&cur);
        Ok(DenoiseOutput {
            cleaned: cur,
            dvars_pre,
            dvars_post,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_token_styles() {
        let a: ProcessOrder = "DMT-TMP-REG".parse().unwrap();
        let b: ProcessOrder = "detrend-filter-regress".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, ProcessOrder::default());
        let c: ProcessOrder = "DMT-REG".parse().unwrap();
        assert!(!c.contains(Stage::Filter));
    }

    #[test]
    fn rejects_bad_orders() {
        assert!("".parse::<ProcessOrder>().is_err());
        assert!("REG-DMT".parse::<ProcessOrder>().is_err());
        assert!("DMT-REG-REG".parse::<ProcessOrder>().is_err());
        assert!("DMT-FOO".parse::<ProcessOrder>().is_err());
    }

    #[test]
    fn pending_regress_is_detected() {
        let order: ProcessOrder = "DMT-TMP-REG".parse().unwrap();
        assert!(order.pending_after(1, Stage::Regress));
        let order: ProcessOrder = "DMT-REG-TMP".parse().unwrap();
        assert!(!order.pending_after(2, Stage::Regress));
    }

    #[test]
    fn serde_uses_string_form() {
        let order: ProcessOrder = "DMT-REG-TMP".parse().unwrap();
        let json = serde_json::to_string(&order).unwrap();
        assert_eq!(json, "\"DMT-REG-TMP\"");
        assert!(serde_json::from_str::<ProcessOrder>("\"TMP\"").is_err());
    }
}
