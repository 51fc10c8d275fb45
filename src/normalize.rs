//! Demeaning and polynomial detrending.
//!
//! `demean_detrend`, per unit (row):
//!   data[u, :] -= mean(data[u, :])
//!   data[u, :] -= polyval(polyfit(x, data[u, :], order), x)
//!   with x = linspace(0, (T − 1)·TR, T)
//!
//! The fit is a least-squares projection onto an orthonormal basis of the
//! Vandermonde columns, shared by all units.  The time axis is rescaled to
//! `[0, 1]` before building the basis; the residual of a polynomial fit does
//! not depend on an affine change of abscissa.
use ndarray::{Array2, Axis};

use crate::config::validate_tr;
use crate::error::{DenoiseError, Result};
use crate::linalg;

/// Remove each unit's mean and polynomial trend of degree `order`.
///
/// Demeaning is unconditional and idempotent.  Applying this to confounds
/// as well as data puts both on the same temporal basis before regression.
///
/// # Errors
///
/// * [`DenoiseError::Configuration`] if `tr <= 0`.
/// * [`DenoiseError::InsufficientData`] if there are no more timepoints than
///   polynomial coefficients.
pub fn demean_detrend(data: &Array2<f64>, tr: f64, order: usize) -> Result<Array2<f64>> {
    validate_tr(tr)?;
    let n_t = data.ncols();
    if n_t <= order {
        return Err(DenoiseError::insufficient_data(
            "timepoints for polynomial detrend",
            order + 1,
            n_t,
        ));
    }

    let mut out = data.clone();
    demean_inplace(&mut out);

    let basis = polynomial_basis(n_t, tr, order)?;
    Ok(linalg::project_out(&out, &basis))
}

/// Subtract each row's mean in place.
pub fn demean_inplace(data: &mut Array2<f64>) {
    for mut row in data.axis_iter_mut(Axis(0)) {
        let m = row.mean().unwrap_or(0.0);
        row.mapv_inplace(|v| v - m);
    }
}

/// Orthonormal basis ([T, order + 1]) of polynomials up to `order` on the
/// uniform grid `0, TR, …, (T − 1)·TR`.
pub fn polynomial_basis(n_t: usize, tr: f64, order: usize) -> Result<Array2<f64>> {
    let t_max = (n_t.saturating_sub(1)) as f64 * tr;
    let scale = if t_max > 0.0 { t_max } else { 1.0 };
    let vander = Array2::from_shape_fn((n_t, order + 1), |(i, p)| {
        let x = i as f64 * tr / scale;
        x.powi(p as i32)
    });
    linalg::orthonormal_columns(vander.view()).ok_or_else(|| {
        DenoiseError::numerical_instability(format!(
            "polynomial basis of order {order} is singular for {n_t} timepoints"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_mean_and_linear_trend() {
        let data = Array2::from_shape_fn((4, 120), |(u, t)| {
            10.0 + u as f64 * 3.0 + 0.05 * t as f64 + (t as f64 * 0.4).sin()
        });
        let out = demean_detrend(&data, 2.0, 1).unwrap();
        for row in out.outer_iter() {
            approx::assert_abs_diff_eq!(row.mean().unwrap(), 0.0, epsilon = 1e-10);
            // Slope against time is zero after detrending.
            let slope: f64 = row.iter().enumerate().map(|(t, &v)| (t as f64 - 59.5) * v).sum();
            approx::assert_abs_diff_eq!(slope, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn pure_polynomial_becomes_zero() {
        let data = Array2::from_shape_fn((2, 50), |(u, t)| {
            let x = t as f64 * 0.8;
            1.0 + u as f64 - 0.3 * x + 0.01 * x * x
        });
        let out = demean_detrend(&data, 0.8, 2).unwrap();
        for &v in out.iter() {
            approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn order_zero_only_demeans() {
        let data = Array2::from_shape_fn((1, 10), |(_, t)| t as f64);
        let out = demean_detrend(&data, 1.0, 0).unwrap();
        approx::assert_abs_diff_eq!(out[[0, 0]], -4.5, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(out[[0, 9]], 4.5, epsilon = 1e-12);
    }

    #[test]
    fn rejects_short_series_and_bad_tr() {
        let data = Array2::<f64>::zeros((1, 2));
        assert!(matches!(
            demean_detrend(&data, 2.0, 2),
            Err(DenoiseError::InsufficientData { .. })
        ));
        assert!(matches!(
            demean_detrend(&data, 0.0, 1),
            Err(DenoiseError::Configuration { .. })
        ));
    }
}
