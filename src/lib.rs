//! # boldclean: fMRI temporal reconstruction and denoising in pure Rust
//!
//! `boldclean` cleans functional-MRI time series for connectivity analysis:
//! censored (motion-corrupted) frames are reconstructed by least-squares
//! spectral interpolation, then the series is detrended, band-limited and
//! residualised against nuisance regressors.  Volumes, surfaces and
//! grayordinates all go through the same `[units, timepoints]` code path.
//!
//! _No Python, no BLAS, no C libraries: pure Rust + [ndarray](https://crates.io/crates/ndarray)._
//!
//! ## Pipeline overview
//!
//! ```text
//! sub-01_bold.nii.gz.safetensors     confounds.tsv      tmask.txt
//!   │                                  │                  │
//!   ├─ io::SeriesImage::load()         │                  │
//!   ├─ confounds::drop_nonsteady() ◄───┘                  │
//!   ├─ interpolate (Lomb–Scargle)  ◄──────────────────────┘
//!   │     censored frames only, batched over units
//!   ├─ normalize (DMT)              demean + polynomial detrend
//!   ├─ filter (TMP)                 Butterworth bandpass, filtfilt
//!   ├─ regress (REG)                OLS residuals vs confounds + intercept
//!   │     TMP and REG in either order (ProcessOrder)
//!   └─ qc                           DVARS before / after
//!        │
//!        └─→ cleaned [units, T] f64  +  dvars_pre, dvars_post
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use boldclean::{denoise, interpolate, DenoiseConfig, SamplingGrid, TemporalMask};
//! use boldclean::io::SeriesImage;
//! use boldclean::confounds::read_confound_matrix;
//! use std::path::Path;
//!
//! let img   = SeriesImage::load(Path::new("sub-01_bold.nii.gz.safetensors"), None).unwrap();
//! let mask  = TemporalMask::load(Path::new("tmask.txt")).unwrap();
//! let conf  = read_confound_matrix(Path::new("confounds.txt")).unwrap(); // [R, T]
//!
//! let filled = interpolate(&img.data, &mask, &SamplingGrid::new(2.0)).unwrap();
//! let out    = denoise(&filled, &conf, &DenoiseConfig::new(2.0)).unwrap();
//! println!("post-clean DVARS: {:?}", out.dvars_post);
//! ```
//!
//! ## Running individual steps
//!
//! ```
//! use boldclean::filter::butter_bandpass;
//! use boldclean::normalize::demean_detrend;
//! use boldclean::regress::regress_confounds;
//! use ndarray::Array2;
//!
//! let data = Array2::from_shape_fn((4, 120), |(u, t)| (u + t) as f64 * 0.1);
//! let conf = Array2::from_shape_fn((1, 120), |(_, t)| (t as f64 * 0.3).sin());
//!
//! let dd  = demean_detrend(&data, 2.0, 1).unwrap();
//! let bp  = butter_bandpass(&dd, 0.5, 0.08, 0.01, 2).unwrap();
//! let res = regress_confounds(&bp, &conf).unwrap();
//! assert_eq!(res.dim(), (4, 120));
//! ```

pub mod config;
pub mod confounds;
pub mod error;
pub mod filter;
pub mod interpolate;
pub mod io;
pub mod linalg;
pub mod normalize;
pub mod pipeline;
pub mod qc;
pub mod regress;
pub mod tmask;

use ndarray::Array2;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{DenoiseConfig, SamplingGrid};

// confounds
pub use confounds::{drop_nonsteady, read_confound_matrix, select_acompcor, ConfoundTable};

// error
pub use error::{DenoiseError, Result};

// filter
pub use filter::{butter_bandpass, design_bandpass, FilterCoeffs};

// interpolate
pub use interpolate::{interpolate, SpectralInterpolator};

// io
pub use io::{Hemisphere, SeriesFormat, SeriesImage, StWriter};

// normalize
pub use normalize::demean_detrend;

// pipeline
pub use pipeline::{DenoiseOutput, DenoisePipeline, ProcessOrder, Stage};

// qc
pub use qc::compute_dvars;

// regress
pub use regress::regress_confounds;

// tmask
pub use tmask::TemporalMask;

/// Run the **detrend / filter / regress pipeline** on one series.
///
/// Equivalent to `DenoisePipeline::new(cfg.clone())?.run(data, confounds)`.
///
/// # Pipeline steps
///
/// 1. DVARS of the input.
/// 2. Demean and polynomial detrend of data and confounds
///    ([`DenoiseConfig::detrend_order`]).
/// 3. The remaining stages of [`DenoiseConfig::process_order`]:
///    * `TMP`: Butterworth bandpass between [`DenoiseConfig::highpass`] and
///      [`DenoiseConfig::lowpass`]; the confounds are filtered too when
///      regression follows.
///    * `REG`: OLS residuals against the confounds and an intercept.
/// 4. DVARS of the output.
///
/// # Arguments
///
/// * `data`      – series, shape `[units, T]`.
/// * `confounds` – nuisance regressors, shape `[regressors, T]`.  May have
///   zero rows.
/// * `cfg`       – see [`DenoiseConfig`].
///
/// # Errors
///
/// * [`DenoiseError::Configuration`] / [`DenoiseError::InvalidFilterBand`]
///   for an invalid configuration.
/// * [`DenoiseError::DimensionMismatch`] if the timepoint counts differ.
/// * [`DenoiseError::InsufficientData`] if the series is too short to
///   detrend or filter.
/// * [`DenoiseError::NumericalInstability`] for non-finite or
///   rank-deficient confounds.
///
/// # Examples
///
/// ```
/// use boldclean::{denoise, DenoiseConfig};
/// use ndarray::Array2;
///
/// let data = Array2::from_shape_fn((3, 100), |(u, t)| ((u * 7 + t) % 5) as f64);
/// let conf = Array2::<f64>::zeros((0, 100));
///
/// let out = denoise(&data, &conf, &DenoiseConfig::new(2.0)).unwrap();
/// assert_eq!(out.cleaned.dim(), (3, 100));
/// assert_eq!(out.dvars_pre[0], 0.0);
/// ```
pub fn denoise(
    data: &Array2<f64>,
    confounds: &Array2<f64>,
    cfg: &DenoiseConfig,
) -> Result<DenoiseOutput> {
    DenoisePipeline::new(cfg.clone())?.run(data, confounds)
}
