mod common;
use boldclean::filter::{butter_bandpass, design_bandpass, filtfilt, magnitude_response};
use boldclean::DenoiseError;
use common::rms;
use ndarray::{s, Array2};
use std::f64::consts::PI;

// TR = 2 s → fs = 0.5 Hz, Nyquist 0.25 Hz; pipeline default band.
const FS: f64 = 0.5;
const LOW: f64 = 0.08;
const HIGH: f64 = 0.01;
const N: usize = 200;
const GUARD: usize = 20;

fn sines(freqs: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((1, N), |(_, i)| {
        let t = i as f64 / FS;
        freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum()
    })
}

// ── Coefficient tests ─────────────────────────────────────────────────────────

#[test]
fn bandpass_coeffs_match_scipy() {
    // scipy.signal.butter(2, [0.1, 0.4], btype='band')
    let f = boldclean::filter::butter_bandpass_coeffs(2, 0.1, 0.4);
    let b_ref = [0.13110643991662602, 0.0, -0.26221287983325203, 0.0, 0.13110643991662602];
    let a_ref = [1.0, -2.180657838602799, 2.0200041161835105, -1.0255108477134178, 0.27221493792500717];
    for (got, want) in f.b.iter().zip(b_ref.iter()) {
        approx::assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
    }
    for (got, want) in f.a.iter().zip(a_ref.iter()) {
        approx::assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
    }
}

#[test]
fn design_has_unit_peak_and_zero_dc() {
    let f = design_bandpass(2, FS, LOW, HIGH).unwrap();
    assert_eq!(f.b.len(), 5);
    assert!(magnitude_response(&f, 0.0) < 1e-12);
    // 0.04 Hz sits well inside the band.
    let g = magnitude_response(&f, 0.04 / (FS / 2.0));
    assert!(g > 0.9 && g <= 1.0 + 1e-12, "pass-band gain {g}");
}

// ── Application tests ─────────────────────────────────────────────────────────

#[test]
fn keeps_pass_band_and_removes_stop_band() {
    let x = sines(&[0.04, 0.2]);
    let y = butter_bandpass(&x, FS, LOW, HIGH, 2).unwrap();
    let interior = y.slice(s![0, GUARD..N - GUARD]);
    let r = rms(interior);
    // The 0.04 Hz sine alone has RMS 1/√2.
    assert!(r > 0.6, "RMS too low ({r:.3}), pass-band signal attenuated?");
    assert!(r < 0.8, "RMS too high ({r:.3}), stop-band not attenuated?");
}

#[test]
fn pass_band_sine_is_preserved() {
    let x = sines(&[0.04]);
    let y = butter_bandpass(&x, FS, LOW, HIGH, 2).unwrap();
    for i in GUARD..N - GUARD {
        let err = (y[[0, i]] - x[[0, i]]).abs();
        assert!(err < 0.1, "sample {i}: error {err:.3}");
    }
}

#[test]
fn stop_band_sine_is_attenuated() {
    let x = sines(&[0.2]);
    let y = butter_bandpass(&x, FS, LOW, HIGH, 2).unwrap();
    for i in GUARD..N - GUARD {
        assert!(y[[0, i]].abs() < 0.1, "sample {i}: {:.3}", y[[0, i]]);
    }
}

#[test]
fn constant_input_is_removed() {
    let x = Array2::from_elem((3, N), 7.5);
    let y = butter_bandpass(&x, FS, LOW, HIGH, 2).unwrap();
    assert!(y.iter().all(|v| v.abs() < 1e-10));
}

#[test]
fn rows_are_filtered_independently() {
    let mut x = sines(&[0.04]);
    x.push_row(sines(&[0.2]).row(0)).unwrap();
    let y = butter_bandpass(&x, FS, LOW, HIGH, 2).unwrap();
    let coeffs = design_bandpass(2, FS, LOW, HIGH).unwrap();
    let row1 = filtfilt(&x.row(1).to_vec(), &coeffs).unwrap();
    for (a, b) in y.row(1).iter().zip(row1.iter()) {
        approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
}

// ── Preconditions ─────────────────────────────────────────────────────────────

#[test]
fn invalid_band_is_rejected() {
    let x = sines(&[0.04]);
    for (low, high) in [(0.3, 0.01), (0.01, 0.08), (0.08, 0.0), (0.08, -0.01)] {
        assert!(
            matches!(
                butter_bandpass(&x, FS, low, high, 2),
                Err(DenoiseError::InvalidFilterBand { .. })
            ),
            "band ({high}, {low}) accepted"
        );
    }
}

#[test]
fn short_series_is_rejected() {
    // Order-2 bandpass: 5 coefficients, padding 15 samples.
    let x = Array2::<f64>::zeros((1, 15));
    assert!(matches!(
        butter_bandpass(&x, FS, LOW, HIGH, 2),
        Err(DenoiseError::InsufficientData { .. })
    ));
    let x = Array2::<f64>::zeros((1, 16));
    assert!(butter_bandpass(&x, FS, LOW, HIGH, 2).is_ok());
}
