//! Small dense linear algebra: orthonormal column bases, least-squares
//! residuals and square solves.
//!
//! Designs here are tall and thin (timepoints × a handful of regressors), so
//! modified Gram–Schmidt with a reorthogonalisation pass is accurate enough
//! and keeps the crate free of BLAS/LAPACK.
use ndarray::{Array1, Array2, ArrayView2};

/// A column whose norm drops below this fraction of its original norm after
/// orthogonalisation is treated as linearly dependent.
pub const RANK_TOL: f64 = 1e-8;

/// Orthonormal basis `Q` ([n, p]) spanning the columns of `design` ([n, p]).
///
/// Returns `None` when the design is rank-deficient: more columns than rows,
/// an all-zero or non-finite column, or a column (numerically) inside the
/// span of the preceding ones.
pub fn orthonormal_columns(design: ArrayView2<'_, f64>) -> Option<Array2<f64>> {
    let (n, p) = design.dim();
    if p > n {
        return None;
    }
    let mut q = Array2::<f64>::zeros((n, p));
    for j in 0..p {
        let mut v = design.column(j).to_owned();
        let norm0 = v.dot(&v).sqrt();
        if !(norm0 > 0.0) || !norm0.is_finite() {
            return None;
        }
        // Two passes ("twice is enough") restore orthogonality lost to
        // cancellation in the first.
        for _ in 0..2 {
            for k in 0..j {
                let qk = q.column(k);
                let r = qk.dot(&v);
                v.scaled_add(-r, &qk);
            }
        }
        let norm = v.dot(&v).sqrt();
        if norm <= RANK_TOL * norm0 {
            return None;
        }
        q.column_mut(j).assign(&(v / norm));
    }
    Some(q)
}

/// Remove from every row of `data` ([units, n]) its projection onto the
/// orthonormal columns of `q` ([n, p]).
///
/// This is the least-squares residual `y − X β̂` for every unit at once.
pub fn project_out(data: &Array2<f64>, q: &Array2<f64>) -> Array2<f64> {
    let coef = data.dot(q); // [units, p]
    data - &coef.dot(&q.t())
}

/// Solve the square system `a · x = b` by Gaussian elimination with partial
/// pivoting.  Returns `None` for a singular matrix.
pub fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    if a.dim() != (n, n) {
        return None;
    }
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < f64::EPSILON {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }
        for row in col + 1..n {
            let f = a[[row, col]] / a[[col, col]];
            if f == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= f * a[[col, k]];
            }
            b[row] -= f * b[col];
        }
    }
    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}
