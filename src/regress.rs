//! Nuisance regression.
//!
//! `regress_confounds`: ordinary least squares of every unit on the
//! confound design plus an intercept (as `sklearn.linear_model.LinearRegression`
//! with `fit_intercept=True`), returning residuals:
//!   X        = [1, confoundᵀ]                 [T, R + 1]
//!   residual = data − X (XᵀX)⁻¹ Xᵀ dataᵀ
use ndarray::Array2;

use crate::error::{DenoiseError, Result};
use crate::linalg;

/// Residualise `data` ([units, T]) against `confound` ([regressors, T]).
///
/// Residuals are orthogonal to each regressor and to the constant.
/// A confound matrix with zero regressors removes only the unit means.
///
/// # Errors
///
/// * [`DenoiseError::DimensionMismatch`] if the timepoint counts differ.
/// * [`DenoiseError::NumericalInstability`] for non-finite confound values
///   or a rank-deficient design.
pub fn regress_confounds(data: &Array2<f64>, confound: &Array2<f64>) -> Result<Array2<f64>> {
    let n_t = data.ncols();
    if confound.ncols() != n_t {
        return Err(DenoiseError::dimension_mismatch(
            "timepoints in confounds vs data",
            n_t,
            confound.ncols(),
        ));
    }
    if let Some(pos) = confound.iter().position(|v| !v.is_finite()) {
        let (r, t) = (pos / n_t.max(1), pos % n_t.max(1));
        return Err(DenoiseError::numerical_instability(format!(
            "confound matrix has a non-finite value at regressor {r}, timepoint {t}"
        )));
    }

    let design = design_matrix(confound);
    let q = linalg::orthonormal_columns(design.view()).ok_or_else(|| {
        DenoiseError::numerical_instability(format!(
            "confound design is rank-deficient ({} regressors + intercept, {} timepoints)",
            confound.nrows(),
            n_t
        ))
    })?;

    tracing::debug!(
        n_units = data.nrows(),
        n_regressors = confound.nrows(),
        n_t,
        "regressing confounds"
    );
    Ok(linalg::project_out(data, &q))
}

/// `[1, confoundᵀ]`, shape [T, R + 1].
fn design_matrix(confound: &Array2<f64>) -> Array2<f64> {
    let (n_reg, n_t) = confound.dim();
    Array2::from_shape_fn((n_t, n_reg + 1), |(t, j)| {
        if j == 0 {
            1.0
        } else {
            confound[[j - 1, t]]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_has_intercept_first() {
        let conf = Array2::from_shape_fn((2, 5), |(r, t)| (r * 10 + t) as f64);
        let x = design_matrix(&conf);
        assert_eq!(x.dim(), (5, 3));
        assert_eq!(x[[3, 0]], 1.0);
        assert_eq!(x[[3, 1]], 3.0);
        assert_eq!(x[[3, 2]], 13.0);
    }

    #[test]
    fn zero_regressors_demeans() {
        let data = Array2::from_shape_fn((1, 4), |(_, t)| t as f64);
        let conf = Array2::<f64>::zeros((0, 4));
        let out = regress_confounds(&data, &conf).unwrap();
        approx::assert_abs_diff_eq!(out[[0, 0]], -1.5, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(out[[0, 3]], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_confound_is_rejected() {
        let data = Array2::<f64>::zeros((1, 4));
        let mut conf = Array2::<f64>::ones((1, 4));
        conf[[0, 2]] = f64::NAN;
        let err = regress_confounds(&data, &conf).unwrap_err();
        assert!(err.to_string().contains("timepoint 2"));
    }
}
