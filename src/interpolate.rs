//! Least-squares spectral interpolation of censored frames.
//!
//! Each spatial unit's seen samples are projected onto a Lomb–Scargle basis
//! (sines and cosines on an oversampled frequency grid, phase-shifted so the
//! two are orthogonal over the unevenly spaced seen timestamps).  The
//! spectrum is then resynthesised on the full, evenly spaced frame grid and
//! written into the censored frames only.  Interpolating over censored
//! epochs this way keeps them from ringing through a subsequent temporal
//! filter (Power et al., 2014).
//!
//! ```text
//!   t_i      = (i + 1) · TR                    all frames
//!   Δf       = 1 / (timespan · ofreq)
//!   f_k      = Δf · (k + 1)                    up to hifrac · n_seen / (2 · timespan)
//!   τ_k      = atan2(Σ sin 2ω_k t, Σ cos 2ω_k t) / 2ω_k
//!   c_k      = Σ x_j cos ω_k(t_j − τ_k) / Σ cos² ω_k(t_j − τ_k)
//!   s_k      = Σ x_j sin ω_k(t_j − τ_k) / Σ sin² ω_k(t_j − τ_k)
//!   recon(t) = Σ_k c_k cos ω_k t + s_k sin ω_k t
//! ```
//!
//! The reconstruction is then rescaled so that its standard deviation over
//! the seen frames equals that of the data (oversampling inflates it).
use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::config::SamplingGrid;
use crate::error::{DenoiseError, Result};
use crate::tmask::TemporalMask;

/// Basis terms whose energy over the seen samples is below this (per
/// sample) are dropped.
const BASIS_FLOOR: f64 = 1e-12;

/// Precomputed Lomb–Scargle basis for one temporal mask and sampling grid.
///
/// The basis depends only on the mask and the grid, so one interpolator
/// can reconstruct any number of arrays with the same frame layout.
#[derive(Debug, Clone)]
pub struct SpectralInterpolator {
    seen: Vec<usize>,
    censored: Vec<usize>,
    n_frames: usize,
    batch_size: usize,
    /// ω_k, rad/s.
    angular: Array1<f64>,
    /// cos ω_k(t_j − τ_k) over seen frames, [F, S].
    cos_seen: Array2<f64>,
    /// sin ω_k(t_j − τ_k) over seen frames, [F, S].
    sin_seen: Array2<f64>,
    /// Σ_j cos² per frequency, [F].
    cos_norm: Array1<f64>,
    /// Σ_j sin² per frequency, [F].
    sin_norm: Array1<f64>,
    /// cos ω_k t_i over all frames, [F, N].
    cos_all: Array2<f64>,
    /// sin ω_k t_i over all frames, [F, N].
    sin_all: Array2<f64>,
}

impl SpectralInterpolator {
    /// Build the basis.
    ///
    /// # Errors
    ///
    /// * [`DenoiseError::Configuration`] for an invalid grid.
    /// * [`DenoiseError::InsufficientData`] when only one frame is seen.
    /// * [`DenoiseError::NothingToInterpolate`] when no frame is censored.
    pub fn new(mask: &TemporalMask, grid: &SamplingGrid) -> Result<Self> {
        grid.validate()?;
        let tr = grid.tr;
        let n_frames = mask.len();
        let seen = mask.seen_indices();
        let censored = mask.censored_indices();

        let t_all: Array1<f64> = (0..n_frames).map(|i| (i + 1) as f64 * tr).collect();
        let t_seen: Array1<f64> = seen.iter().map(|&i| t_all[i]).collect();

        let t_min = t_seen.iter().copied().fold(f64::INFINITY, f64::min);
        let t_max = t_seen.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let timespan = t_max - t_min;
        if timespan == 0.0 {
            return Err(DenoiseError::insufficient_data(
                "retained volumes (only one volume retained)",
                2,
                seen.len(),
            ));
        }
        if censored.is_empty() {
            return Err(DenoiseError::NothingToInterpolate);
        }

        let angular = angular_frequencies(
            timespan,
            seen.len(),
            grid.oversampling_frequency,
            grid.highpass_fraction,
        );
        let n_freq = angular.len();
        let n_seen = seen.len();

        let mut cos_seen = Array2::<f64>::zeros((n_freq, n_seen));
        let mut sin_seen = Array2::<f64>::zeros((n_freq, n_seen));
        for (k, &w) in angular.iter().enumerate() {
            let tau = phase_offset(w, &t_seen);
            for (j, &t) in t_seen.iter().enumerate() {
                let phase = w * t - w * tau;
                cos_seen[[k, j]] = phase.cos();
                sin_seen[[k, j]] = phase.sin();
            }
        }
        let cos_norm = cos_seen.mapv(|v| v * v).sum_axis(Axis(1));
        let sin_norm = sin_seen.mapv(|v| v * v).sum_axis(Axis(1));

        let cos_all = Array2::from_shape_fn((n_freq, n_frames), |(k, i)| (angular[k] * t_all[i]).cos());
        let sin_all = Array2::from_shape_fn((n_freq, n_frames), |(k, i)| (angular[k] * t_all[i]).sin());

        tracing::debug!(
            n_frames,
            n_seen,
            n_freq,
            timespan,
            "built Lomb-Scargle basis"
        );

        Ok(Self {
            seen,
            censored,
            n_frames,
            batch_size: grid.voxel_batch_size,
            angular,
            cos_seen,
            sin_seen,
            cos_norm,
            sin_norm,
            cos_all,
            sin_all,
        })
    }

    /// Number of frequencies in the grid.
    pub fn n_frequencies(&self) -> usize {
        self.angular.len()
    }

    /// Angular frequencies of the grid, rad/s.
    pub fn angular_frequencies(&self) -> &Array1<f64> {
        &self.angular
    }

    /// Replace the censored frames of `data` ([units, frames]).
    ///
    /// Seen frames are copied unchanged.
    pub fn reconstruct(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_frames {
            return Err(DenoiseError::dimension_mismatch(
                "frames in data vs temporal mask",
                self.n_frames,
                data.ncols(),
            ));
        }
        let n_units = data.nrows();
        let n_batches = n_units.div_ceil(self.batch_size);
        let mut out = data.clone();

        for (b, batch) in data.axis_chunks_iter(Axis(0), self.batch_size).enumerate() {
            tracing::debug!("voxel batch {} out of {}", b + 1, n_batches);
            let recon = self.reconstruct_batch(batch);
            let start = b * self.batch_size;
            for (u, row) in recon.outer_iter().enumerate() {
                for &i in &self.censored {
                    out[[start + u, i]] = row[i];
                }
            }
        }
        Ok(out)
    }

    /// Full-grid reconstruction for one batch, [units, frames].
    fn reconstruct_batch(&self, batch: ArrayView2<'_, f64>) -> Array2<f64> {
        let seen_data = batch.select(Axis(1), &self.seen); // [B, S]

        // Projection coefficients, [F, B].
        let mut c = self.cos_seen.dot(&seen_data.t());
        let mut s = self.sin_seen.dot(&seen_data.t());
        let floor = BASIS_FLOOR * self.seen.len() as f64;
        for (coef, norm) in [(&mut c, &self.cos_norm), (&mut s, &self.sin_norm)] {
            for (mut row, &d) in coef.outer_iter_mut().zip(norm.iter()) {
                if d > floor {
                    row /= d;
                } else {
                    // The term vanishes on every seen sample (e.g. a sine at
                    // exactly the Nyquist frequency); it carries no signal.
                    row.fill(0.0);
                }
            }
        }

        let mut recon = c.t().dot(&self.cos_all) + s.t().dot(&self.sin_all); // [B, N]

        for (mut row, orig) in recon.outer_iter_mut().zip(seen_data.outer_iter()) {
            let recon_seen: Vec<f64> = self.seen.iter().map(|&i| row[i]).collect();
            let std_recon = sample_std(&recon_seen);
            let std_orig = sample_std(&orig.to_vec());
            let factor = std_recon / std_orig;
            if factor.is_finite() && factor > 0.0 {
                row /= factor;
            }
        }
        recon
    }
}

/// Interpolate the censored frames of `data` ([units, frames]).
///
/// Convenience wrapper around [`SpectralInterpolator`].
pub fn interpolate(
    data: &Array2<f64>,
    mask: &TemporalMask,
    grid: &SamplingGrid,
) -> Result<Array2<f64>> {
    if mask.len() != data.ncols() {
        return Err(DenoiseError::dimension_mismatch(
            "frames in data vs temporal mask",
            data.ncols(),
            mask.len(),
        ));
    }
    SpectralInterpolator::new(mask, grid)?.reconstruct(data)
}

/// Angular frequency grid `2π · Δf · (k + 1)`.
///
/// Same length as `numpy.arange(Δf, stop, Δf)` with
/// `stop = hifrac · n_seen / (2 · timespan) + Δf`.
fn angular_frequencies(timespan: f64, n_seen: usize, ofreq: f64, hifrac: f64) -> Array1<f64> {
    let step = 1.0 / (timespan * ofreq);
    let start = step;
    let stop = hifrac * n_seen as f64 / (2.0 * timespan) + step;
    let n = ((stop - start) / step).ceil().max(0.0) as usize;
    (0..n).map(|k| 2.0 * PI * (start + k as f64 * step)).collect()
}

/// Lomb–Scargle time offset τ for angular frequency `w`.
fn phase_offset(w: f64, t_seen: &Array1<f64>) -> f64 {
    let (sum_sin, sum_cos) = t_seen
        .iter()
        .fold((0.0, 0.0), |(ss, cc), &t| (ss + (2.0 * w * t).sin(), cc + (2.0 * w * t).cos()));
    sum_sin.atan2(sum_cos) / (2.0 * w)
}

/// Standard deviation with `ddof = 1`.
fn sample_std(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|&v| (v - mean) * (v - mean)).sum();
    (ss / (n - 1) as f64).sqrt()
}
