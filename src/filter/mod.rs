//! Butterworth filter design and zero-phase application.
//!
//! - [`design`]: digital Butterworth bandpass/highpass design, matching
//!   `scipy.signal.butter(output='ba')`.
//! - [`apply`]: forward-backward filtering, matching `scipy.signal.filtfilt`
//!   with odd padding and `lfilter_zi` initial conditions.

pub mod apply;
pub mod design;

pub use apply::{apply_filtfilt, butter_bandpass, filtfilt, lfilter, lfilter_zi};
pub use design::{
    butter_bandpass as butter_bandpass_coeffs, butter_highpass, butter_poles, check_band,
    design_bandpass, magnitude_response, FilterCoeffs,
};
