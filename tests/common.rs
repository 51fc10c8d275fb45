/// Shared helpers: synthetic series and comparisons.
use ndarray::{Array2, ArrayView1};
use std::f64::consts::PI;

#[allow(unused)]
/// `[units, n]` sinusoids `amp[u] · sin(2π f t)` sampled at `t = (i + 1) · tr`.
pub fn sinusoids(amps: &[f64], freq: f64, tr: f64, n: usize) -> Array2<f64> {
    Array2::from_shape_fn((amps.len(), n), |(u, i)| {
        let t = (i + 1) as f64 * tr;
        amps[u] * (2.0 * PI * freq * t).sin()
    })
}

#[allow(unused)]
/// 0/1 flags with frames `start..end` censored.
pub fn gap_flags(n: usize, start: usize, end: usize) -> Vec<f64> {
    (0..n)
        .map(|i| if (start..end).contains(&i) { 0.0 } else { 1.0 })
        .collect()
}

#[allow(unused)]
/// Deterministic pseudo-random values in `[-0.5, 0.5)` (64-bit LCG).
pub fn noise(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        })
        .collect()
}

#[allow(unused)]
/// Maximum absolute difference between two arrays.
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[allow(unused)]
/// Root-mean-square of a slice of a row.
pub fn rms(a: ArrayView1<'_, f64>) -> f64 {
    (a.iter().map(|v| v * v).sum::<f64>() / a.len() as f64).sqrt()
}

#[allow(unused)]
/// Sample standard deviation (`ddof = 1`).
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}
