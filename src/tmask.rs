//! Temporal mask: which frames are seen (retained) and which are censored.
//!
//! On disk the mask is a whitespace-separated sequence of `0`/`1` values,
//! one per frame; `1` marks a seen frame.
use std::path::Path;

use anyhow::Context;

use crate::error::{DenoiseError, Result};

/// Ordered seen/censored flags, one per frame.
///
/// Always non-empty with at least one seen frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalMask {
    seen: Vec<bool>,
}

impl TemporalMask {
    /// Build a mask from boolean flags (`true` = seen).
    pub fn new(seen: Vec<bool>) -> Result<Self> {
        if seen.is_empty() {
            return Err(DenoiseError::configuration("temporal mask is empty"));
        }
        if !seen.iter().any(|&s| s) {
            return Err(DenoiseError::insufficient_data("seen frames", 1, 0));
        }
        Ok(Self { seen })
    }

    /// Build a mask from numeric flags.  Values must be ≈0 or ≈1.
    pub fn from_flags(flags: &[f64]) -> Result<Self> {
        let seen = flags
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                if (v - 1.0).abs() < 1e-8 {
                    Ok(true)
                } else if v.abs() < 1e-8 {
                    Ok(false)
                } else {
                    Err(DenoiseError::configuration(format!(
                        "temporal mask value {v} at frame {i} is neither 0 nor 1"
                    )))
                }
            })
            .collect::<Result<Vec<bool>>>()?;
        Self::new(seen)
    }

    /// Mask of `n_frames` frames with the listed frames censored.
    pub fn from_censored(n_frames: usize, censored: &[usize]) -> Result<Self> {
        let mut seen = vec![true; n_frames];
        for &i in censored {
            if i >= n_frames {
                return Err(DenoiseError::configuration(format!(
                    "censored frame {i} out of range for {n_frames} frames"
                )));
            }
            seen[i] = false;
        }
        Self::new(seen)
    }

    /// Parse whitespace-separated flags.
    pub fn parse(text: &str) -> Result<Self> {
        let flags = text
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| {
                    DenoiseError::configuration(format!("invalid temporal mask value {tok:?}"))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Self::from_flags(&flags)
    }

    /// Read a temporal mask file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading temporal mask {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing temporal mask {}", path.display()))
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Always `false`; a mask holds at least one frame.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Whether `frame` is seen; `None` past the last frame.
    pub fn is_seen(&self, frame: usize) -> Option<bool> {
        self.seen.get(frame).copied()
    }

    /// Number of seen frames.
    pub fn n_seen(&self) -> usize {
        self.seen.iter().filter(|&&s| s).count()
    }

    /// Number of censored frames.
    pub fn n_censored(&self) -> usize {
        self.len() - self.n_seen()
    }

    /// `true` when no frame is censored.
    pub fn is_complete(&self) -> bool {
        self.seen.iter().all(|&s| s)
    }

    /// Indices of seen frames, ascending.
    pub fn seen_indices(&self) -> Vec<usize> {
        self.indices_where(true)
    }

    /// Indices of censored frames, ascending.
    pub fn censored_indices(&self) -> Vec<usize> {
        self.indices_where(false)
    }

    fn indices_where(&self, flag: bool) -> Vec<usize> {
        self.seen
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| (s == flag).then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_count() {
        let m = TemporalMask::parse("1 1 0\n0 1\t1").unwrap();
        assert_eq!(m.len(), 6);
        assert_eq!(m.n_seen(), 4);
        assert_eq!(m.n_censored(), 2);
        assert_eq!(m.seen_indices(), vec![0, 1, 4, 5]);
        assert_eq!(m.censored_indices(), vec![2, 3]);
        assert!(!m.is_complete());
    }

    #[test]
    fn float_flags_are_accepted() {
        let m = TemporalMask::parse("1.0 0.0 1.0").unwrap();
        assert_eq!(m.censored_indices(), vec![1]);
    }

    #[test]
    fn rejects_non_binary_and_degenerate_masks() {
        assert!(matches!(
            TemporalMask::parse("1 2 1"),
            Err(DenoiseError::Configuration { .. })
        ));
        assert!(matches!(
            TemporalMask::parse(""),
            Err(DenoiseError::Configuration { .. })
        ));
        assert!(matches!(
            TemporalMask::parse("0 0 0"),
            Err(DenoiseError::InsufficientData { .. })
        ));
    }

    #[test]
    fn from_censored_marks_frames() {
        let m = TemporalMask::from_censored(10, &[3, 4]).unwrap();
        assert_eq!(m.is_seen(2), Some(true));
        assert_eq!(m.is_seen(3), Some(false));
        assert_eq!(m.is_seen(10), None);
        assert!(TemporalMask::from_censored(10, &[10]).is_err());
        assert!(TemporalMask::from_censored(4, &[]).unwrap().is_complete());
    }
}
