use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("calibration has {found} bins, expected {expected}")]
    BinCountMismatch { found: usize, expected: usize },
}

/// Per-bin gain factors plus the measured calibration power.
///
/// Written by the calibration collaborator; the daemon only reads it back
/// and forwards both fields to the signal-processing subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    #[serde(rename = "cal_values")]
    pub values: Vec<f64>,
    #[serde(rename = "cal_pwr")]
    pub power: f64,
}

impl CalibrationProfile {
    /// Neutral profile: calibrated and uncalibrated spectra come out equal.
    pub fn neutral(num_bins: usize, tsys: f64, tcal: f64) -> Self {
        Self {
            values: vec![1.0; num_bins],
            power: 1.0 / (tsys + tcal),
        }
    }

    pub fn load(path: &Path, expected_bins: usize) -> Result<Self, CalibrationError> {
        let content = std::fs::read_to_string(path)?;
        let profile: CalibrationProfile = serde_json::from_str(&content)?;
        if profile.values.len() != expected_bins {
            return Err(CalibrationError::BinCountMismatch {
                found: profile.values.len(),
                expected: expected_bins,
            });
        }
        Ok(profile)
    }

    /// Startup load: a missing or mismatched file falls back to neutral.
    pub fn load_or_neutral(path: &Path, num_bins: usize, tsys: f64, tcal: f64) -> Self {
        match Self::load(path, num_bins) {
            Ok(profile) => profile,
            Err(e) => {
                if path.is_file() {
                    log::warn!("discarding persisted calibration: {}", e);
                }
                Self::neutral(num_bins, tsys, tcal)
            }
        }
    }
}
