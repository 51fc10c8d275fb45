//! Digital Butterworth design matching `scipy.signal.butter(output='ba')`.
//!
//! For order N and normalised cutoffs Wn (fractions of Nyquist):
//!   • analog prototype poles  p_m = −exp(iπm / 2N),  m = −N+1, −N+3, …, N−1
//!   • prewarp                 ω = 4·tan(π·Wn / 2)          (fs = 2 convention)
//!   • band transform          lowpass → bandpass / highpass in the s-plane
//!   • bilinear transform      z = (4 + s) / (4 − s)
//!   • zeros/poles/gain        → polynomial coefficients b, a  (a[0] = 1)
use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use crate::error::{DenoiseError, Result};

type C64 = Complex<f64>;

/// Transfer-function coefficients `b` (numerator) and `a` (denominator).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoeffs {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

/// Check `0 < highpass < lowpass <= nyquist` for sampling rate `fs`.
pub fn check_band(fs: f64, lowpass: f64, highpass: f64) -> Result<()> {
    let nyquist = 0.5 * fs;
    let ok = highpass > 0.0 && highpass < lowpass && lowpass <= nyquist && nyquist.is_finite();
    if ok {
        Ok(())
    } else {
        Err(DenoiseError::InvalidFilterBand {
            highpass,
            lowpass,
            nyquist,
        })
    }
}

/// Design the band filter used by the pipeline.
///
/// `lowpass` and `highpass` are in Hz; the cutoffs passed to the design are
/// `highpass / nyquist` (low edge) and `lowpass / nyquist` (high edge).  A
/// `lowpass` equal to the Nyquist frequency yields a highpass at `highpass`.
pub fn design_bandpass(order: usize, fs: f64, lowpass: f64, highpass: f64) -> Result<FilterCoeffs> {
    check_band(fs, lowpass, highpass)?;
    if order == 0 {
        return Err(DenoiseError::configuration("filter order must be >= 1"));
    }
    let nyquist = 0.5 * fs;
    let low = highpass / nyquist;
    let high = lowpass / nyquist;
    if (1.0 - high).abs() <= 1e-12 {
        tracing::debug!(order, low, "lowpass at Nyquist, designing highpass only");
        Ok(butter_highpass(order, low))
    } else {
        Ok(butter_bandpass(order, low, high))
    }
}

/// Butterworth bandpass of prototype order `n` between normalised cutoffs
/// `low < high` (both in `(0, 1)`).  Returns `2n + 1` coefficients.
pub fn butter_bandpass(n: usize, low: f64, high: f64) -> FilterCoeffs {
    let wl = prewarp(low);
    let wh = prewarp(high);
    let bw = wh - wl;
    let wo2 = wl * wh;

    // Each prototype pole splits into a pair around ±i·wo.
    let mut poles = Vec::with_capacity(2 * n);
    let proto = butter_poles(n);
    for &p in &proto {
        let p_lp = p * (bw / 2.0);
        let root = (p_lp * p_lp - wo2).sqrt();
        poles.push(p_lp + root);
    }
    for &p in &proto {
        let p_lp = p * (bw / 2.0);
        let root = (p_lp * p_lp - wo2).sqrt();
        poles.push(p_lp - root);
    }
    // n zeros at s = 0; gain bw^n.
    let zeros = vec![C64::new(0.0, 0.0); n];
    let gain = bw.powi(n as i32);

    bilinear_to_coeffs(&zeros, &poles, gain)
}

/// Butterworth highpass of order `n` at normalised cutoff `wn` in `(0, 1)`.
pub fn butter_highpass(n: usize, wn: f64) -> FilterCoeffs {
    let wo = prewarp(wn);
    let proto = butter_poles(n);
    let poles: Vec<C64> = proto.iter().map(|&p| wo / p).collect();
    let zeros = vec![C64::new(0.0, 0.0); n];
    // k · Re(prod(−z) / prod(−p)) with k = 1 and no prototype zeros.
    let prod_neg_p = proto.iter().fold(C64::new(1.0, 0.0), |acc, &p| acc * (-p));
    let gain = (C64::new(1.0, 0.0) / prod_neg_p).re;

    bilinear_to_coeffs(&zeros, &poles, gain)
}

/// Analog Butterworth prototype poles (unit cutoff, left half-plane).
pub fn butter_poles(n: usize) -> Vec<C64> {
    (0..n)
        .map(|k| {
            let m = 2.0 * k as f64 - n as f64 + 1.0;
            -C64::from_polar(1.0, PI * m / (2.0 * n as f64))
        })
        .collect()
}

/// Frequency response magnitude `|H(e^{iω})|` at normalised frequency `w`
/// (fraction of Nyquist).
pub fn magnitude_response(coeffs: &FilterCoeffs, w: f64) -> f64 {
    let z_inv = C64::from_polar(1.0, -PI * w);
    let eval = |c: &[f64]| {
        c.iter()
            .rev()
            .fold(C64::new(0.0, 0.0), |acc, &v| acc * z_inv + v)
    };
    (eval(&coeffs.b) / eval(&coeffs.a)).norm()
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Analog frequency for normalised digital cutoff `wn` (fs = 2).
fn prewarp(wn: f64) -> f64 {
    4.0 * (PI * wn / 2.0).tan()
}

/// Bilinear-transform an analog filter (fs = 2) and expand to polynomials.
///
/// Zeros at infinity (pole excess) map to z = −1.
fn bilinear_to_coeffs(zeros: &[C64], poles: &[C64], gain: f64) -> FilterCoeffs {
    let fs2 = C64::new(4.0, 0.0);
    let degree = poles.len() - zeros.len();

    let mut z_d: Vec<C64> = zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    z_d.extend(std::iter::repeat(C64::new(-1.0, 0.0)).take(degree));
    let p_d: Vec<C64> = poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();

    let num = zeros.iter().fold(C64::new(1.0, 0.0), |acc, &z| acc * (fs2 - z));
    let den = poles.iter().fold(C64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
    let k_d = gain * (num / den).re;

    let b = poly(&z_d).iter().map(|c| k_d * c.re).collect();
    let a = poly(&p_d).iter().map(|c| c.re).collect();
    FilterCoeffs { b, a }
}

/// Monic polynomial with the given roots, highest power first.
fn poly(roots: &[C64]) -> Vec<C64> {
    let mut c = vec![C64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![C64::new(0.0, 0.0); c.len() + 1];
        for (i, &v) in c.iter().enumerate() {
            next[i] += v;
            next[i + 1] -= v * r;
        }
        c = next;
    }
    c
}
