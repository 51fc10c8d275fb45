//! Zero-phase IIR filtering.
//!
//! Matches `scipy.signal.filtfilt(b, a, x)` with its defaults:
//!   • odd extension of `3 · max(len a, len b)` samples on each side
//!   • steady-state initial conditions (`lfilter_zi`) scaled by the first
//!     sample of each pass
//!   • forward pass, reverse, forward pass, reverse, strip padding
//!
//! Zero phase comes from running the filter twice in opposite directions,
//! so the effective magnitude response is `|H|²`.
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{DenoiseError, Result};
use crate::filter::design::{design_bandpass, FilterCoeffs};
use crate::linalg;

/// Band-limit every unit of `data` ([units, T]) with a zero-phase
/// Butterworth filter.
///
/// * `fs`       – sampling frequency in Hz (`1 / TR`).
/// * `lowpass`  – upper band edge in Hz.
/// * `highpass` – lower band edge in Hz.
/// * `order`    – Butterworth prototype order.
///
/// The unit means are not restored; feed demeaned data.
///
/// # Errors
///
/// * [`DenoiseError::InvalidFilterBand`] unless `0 < highpass < lowpass <= fs / 2`.
/// * [`DenoiseError::InsufficientData`] if `T` does not exceed the edge
///   padding length.
pub fn butter_bandpass(
    data: &Array2<f64>,
    fs: f64,
    lowpass: f64,
    highpass: f64,
    order: usize,
) -> Result<Array2<f64>> {
    let coeffs = design_bandpass(order, fs, lowpass, highpass)?;
    apply_filtfilt(data, &coeffs)
}

/// Apply `filtfilt` with the given coefficients to each row of `data`.
pub fn apply_filtfilt(data: &Array2<f64>, coeffs: &FilterCoeffs) -> Result<Array2<f64>> {
    let zi = lfilter_zi(coeffs)?;
    let mut out = Array2::<f64>::zeros(data.raw_dim());
    for (row, mut dst) in data.outer_iter().zip(out.outer_iter_mut()) {
        let filtered = filtfilt_with_zi(row, coeffs, &zi)?;
        dst.assign(&ArrayView1::from(&filtered));
    }
    Ok(out)
}

/// Zero-phase filter a single 1-D signal.
pub fn filtfilt(x: &[f64], coeffs: &FilterCoeffs) -> Result<Vec<f64>> {
    let zi = lfilter_zi(coeffs)?;
    filtfilt_with_zi(ArrayView1::from(x), coeffs, &zi)
}

/// Direct-form II transposed IIR filter with initial state `zi`
/// (length `max(len a, len b) − 1`).
///
/// Coefficients are normalised by `a[0]`.
///
/// # Errors
///
/// [`DenoiseError::NumericalInstability`] if `a[0]` is missing, zero or
/// non-finite, or `b` is empty.
pub fn lfilter(coeffs: &FilterCoeffs, x: &[f64], zi: &[f64]) -> Result<Vec<f64>> {
    let (b, a) = normalised(coeffs)?;
    let n = b.len();
    let mut z = zi.to_vec();
    z.resize(n - 1, 0.0);

    let mut y = Vec::with_capacity(x.len());
    for &xn in x {
        let yn = b[0] * xn + z.first().copied().unwrap_or(0.0);
        for i in 0..n.saturating_sub(2) {
            z[i] = b[i + 1] * xn + z[i + 1] - a[i + 1] * yn;
        }
        if n >= 2 {
            z[n - 2] = b[n - 1] * xn - a[n - 1] * yn;
        }
        y.push(yn);
    }
    Ok(y)
}

/// Steady-state initial conditions of [`lfilter`] for a unit step input.
///
/// Solves `(I − Cᵀ) zi = b[1:] − a[1:]·b[0]`, `C` the companion matrix of
/// `a` (as `scipy.signal.lfilter_zi`).
pub fn lfilter_zi(coeffs: &FilterCoeffs) -> Result<Vec<f64>> {
    let (b, a) = normalised(coeffs)?;
    let m = b.len() - 1;
    if m == 0 {
        return Ok(vec![]);
    }
    let mut lhs = Array2::<f64>::eye(m);
    for i in 0..m {
        lhs[[i, 0]] += a[i + 1];
        if i + 1 < m {
            lhs[[i, i + 1]] -= 1.0;
        }
    }
    let rhs: Array1<f64> = (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();
    linalg::solve(lhs, rhs)
        .map(|zi| zi.to_vec())
        .ok_or_else(|| DenoiseError::numerical_instability("filter has a pole at z = 1"))
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn filtfilt_with_zi(x: ArrayView1<'_, f64>, coeffs: &FilterCoeffs, zi: &[f64]) -> Result<Vec<f64>> {
    let n_x = x.len();
    let pad = 3 * coeffs.a.len().max(coeffs.b.len());
    if n_x <= pad {
        return Err(DenoiseError::insufficient_data(
            "timepoints for zero-phase filtering (must exceed edge padding)",
            pad + 1,
            n_x,
        ));
    }
    let x: Vec<f64> = x.to_vec();
    let ext = odd_ext(&x, pad);

    let z0: Vec<f64> = zi.iter().map(|&z| z * ext[0]).collect();
    let mut y = lfilter(coeffs, &ext, &z0)?;

    y.reverse();
    let z0: Vec<f64> = zi.iter().map(|&z| z * y[0]).collect();
    let mut y = lfilter(coeffs, &y, &z0)?;
    y.reverse();

    Ok(y[pad..pad + n_x].to_vec())
}

/// Odd extension by `n` samples on each side (`n < x.len()`).
///
/// Left:  `2·x[0] − x[i]`      for i = n, …, 1
/// Right: `2·x[-1] − x[-1-i]`  for i = 1, …, n
fn odd_ext(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let first = x[0];
    let last = x[len - 1];
    let mut out = Vec::with_capacity(len + 2 * n);
    out.extend((1..=n).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=n).map(|i| 2.0 * last - x[len - 1 - i]));
    out
}

/// `(b, a)` divided by `a[0]` and zero-padded to a common length.
fn normalised(coeffs: &FilterCoeffs) -> Result<(Vec<f64>, Vec<f64>)> {
    let a0 = match coeffs.a.first() {
        Some(&a0) if a0 != 0.0 && a0.is_finite() => a0,
        _ => {
            return Err(DenoiseError::numerical_instability(
                "filter denominator must start with a finite non-zero a[0]",
            ))
        }
    };
    if coeffs.b.is_empty() {
        return Err(DenoiseError::numerical_instability("filter numerator is empty"));
    }
    let n = coeffs.a.len().max(coeffs.b.len());
    let mut b: Vec<f64> = coeffs.b.iter().map(|&v| v / a0).collect();
    let mut a: Vec<f64> = coeffs.a.iter().map(|&v| v / a0).collect();
    b.resize(n, 0.0);
    a.resize(n, 0.0);
    Ok((b, a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::butter_highpass;

    #[test]
    fn odd_ext_reflects_through_endpoints() {
        let x = [1.0, 2.0, 4.0, 7.0, 11.0];
        let e = odd_ext(&x, 2);
        // left: 2·1 − 4, 2·1 − 2 ; right: 2·11 − 7, 2·11 − 4
        assert_eq!(e, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 11.0, 15.0, 18.0]);
    }

    #[test]
    fn lfilter_zi_matches_scipy_highpass() {
        // scipy.signal.lfilter_zi(*scipy.signal.butter(2, 0.2, 'high'))
        let zi = lfilter_zi(&butter_highpass(2, 0.2)).unwrap();
        approx::assert_abs_diff_eq!(zi[0], -0.6389455251590224, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(zi[1], 0.6389455251590224, epsilon = 1e-12);
    }

    #[test]
    fn steady_state_start_has_no_transient() {
        // A step with zi scaled by the first sample stays at the steady-state
        // output from the first sample on.
        let f = butter_highpass(2, 0.2);
        let zi = lfilter_zi(&f).unwrap();
        let y = lfilter(&f, &[1.0; 40], &zi).unwrap();
        for v in y {
            approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn too_short_series_is_rejected() {
        let f = butter_highpass(2, 0.2);
        // pad = 3 · 3 = 9 samples.
        assert!(filtfilt(&[0.0; 9], &f).is_err());
        assert_eq!(filtfilt(&[0.0; 10], &f).unwrap().len(), 10);
    }

    #[test]
    fn degenerate_denominator_is_rejected() {
        let x = vec![0.5; 30];
        let data = Array2::from_shape_vec((1, 30), x.clone()).unwrap();
        for a in [vec![], vec![0.0, 0.5], vec![f64::NAN, 1.0]] {
            let f = FilterCoeffs { b: vec![1.0, 1.0], a };
            assert!(matches!(lfilter_zi(&f), Err(DenoiseError::NumericalInstability { .. })));
            assert!(matches!(lfilter(&f, &x, &[]), Err(DenoiseError::NumericalInstability { .. })));
            assert!(matches!(filtfilt(&x, &f), Err(DenoiseError::NumericalInstability { .. })));
            assert!(matches!(
                apply_filtfilt(&data, &f),
                Err(DenoiseError::NumericalInstability { .. })
            ));
        }
        let f = FilterCoeffs { b: vec![], a: vec![1.0] };
        assert!(lfilter(&f, &x, &[]).is_err());
    }
}
