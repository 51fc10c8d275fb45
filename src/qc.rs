//! DVARS-style quality-control trace.
//!
//! `dvars[t] = sqrt( Σ_u (x[u, t] − x[u, t−1])² / n_units )`, with
//! `dvars[0] = 0` (the first frame has no predecessor).
use ndarray::{Array1, Array2};

/// Root-mean-square (over units) of the first temporal difference, one value
/// per frame.
pub fn compute_dvars(data: &Array2<f64>) -> Array1<f64> {
    let (n_units, n_t) = data.dim();
    let mut out = Array1::<f64>::zeros(n_t);
    if n_units == 0 {
        return out;
    }
    for t in 1..n_t {
        let ss: f64 = data
            .column(t)
            .iter()
            .zip(data.column(t - 1).iter())
            .map(|(&a, &b)| (a - b) * (a - b))
            .sum();
        out[t] = (ss / n_units as f64).sqrt();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn first_frame_is_zero_and_values_are_rms() {
        let data = array![[0.0, 1.0, 1.0], [0.0, 3.0, 0.0]];
        let d = compute_dvars(&data);
        assert_eq!(d.len(), 3);
        assert_eq!(d[0], 0.0);
        approx::assert_abs_diff_eq!(d[1], (10.0_f64 / 2.0).sqrt(), epsilon = 1e-12);
        approx::assert_abs_diff_eq!(d[2], (9.0_f64 / 2.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn constant_series_has_zero_dvars() {
        let data = Array2::from_elem((5, 20), 3.5);
        assert!(compute_dvars(&data).iter().all(|&v| v == 0.0));
    }
}
