mod common;
use boldclean::normalize::{demean_detrend, demean_inplace, polynomial_basis};
use common::{max_abs_diff, noise};
use ndarray::Array2;

fn noisy_trend() -> Array2<f64> {
    let n_t = 150;
    let vals = noise(4 * n_t, 7);
    Array2::from_shape_fn((4, n_t), |(u, t)| {
        100.0 * (u + 1) as f64 + 0.2 * t as f64 + vals[u * n_t + t]
    })
}

#[test]
fn detrend_is_idempotent() {
    let once = demean_detrend(&noisy_trend(), 0.8, 2).unwrap();
    let twice = demean_detrend(&once, 0.8, 2).unwrap();
    let err = max_abs_diff(&once, &twice);
    assert!(err < 1e-10, "second pass changed data by {err:.2e}");
}

#[test]
fn detrend_postconditions() {
    let out = demean_detrend(&noisy_trend(), 0.8, 1).unwrap();
    assert_eq!(out.dim(), (4, 150));
    for row in out.outer_iter() {
        approx::assert_abs_diff_eq!(row.mean().unwrap(), 0.0, epsilon = 1e-9);
        // Noise is in [-0.5, 0.5); the 0.2/frame trend and offsets are gone.
        assert!(row.iter().all(|v| v.abs() < 1.0));
    }
}

#[test]
fn detrend_does_not_depend_on_tr() {
    let a = demean_detrend(&noisy_trend(), 0.8, 2).unwrap();
    let b = demean_detrend(&noisy_trend(), 2.5, 2).unwrap();
    assert!(max_abs_diff(&a, &b) < 1e-9);
}

#[test]
fn demean_inplace_zeroes_row_means() {
    let mut data = noisy_trend();
    demean_inplace(&mut data);
    for row in data.outer_iter() {
        approx::assert_abs_diff_eq!(row.mean().unwrap(), 0.0, epsilon = 1e-9);
    }
}

#[test]
fn polynomial_basis_is_orthonormal() {
    let q = polynomial_basis(40, 2.0, 3).unwrap();
    assert_eq!(q.dim(), (40, 4));
    let gram = q.t().dot(&q);
    for i in 0..4 {
        for j in 0..4 {
            let want = if i == j { 1.0 } else { 0.0 };
            approx::assert_abs_diff_eq!(gram[[i, j]], want, epsilon = 1e-10);
        }
    }
}
