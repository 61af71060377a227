//! Affine clock model fitted by ordinary least squares.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SVD_EPS: f64 = 1e-12;

/// Why a fit is not identifiable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("need at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("{source_len} source values vs {target_len} target values")]
    LengthMismatch { source_len: usize, target_len: usize },

    #[error("predictor has zero variance")]
    ZeroVariance,

    #[error("non-finite values in input")]
    NonFinite,
}

/// `target = slope * source + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineClockModel {
    pub intercept: f64,
    pub slope: f64,
}

impl AffineClockModel {
    pub fn identity() -> Self {
        Self {
            intercept: 0.0,
            slope: 1.0,
        }
    }

    /// OLS fit of `target` on `source`
    ///
    /// The predictor is centered before solving to keep Unix-epoch sized
    /// values well conditioned.
    pub fn fit(source: &[f64], target: &[f64]) -> Result<Self, FitError> {
        if source.len() != target.len() {
            return Err(FitError::LengthMismatch {
                source_len: source.len(),
                target_len: target.len(),
            });
        }
        let n = source.len();
        if n < 2 {
            return Err(FitError::TooFewPoints(n));
        }
        if source.iter().chain(target).any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let mean = source.iter().sum::<f64>() / n as f64;
        let spread = source.iter().map(|x| (x - mean).abs()).fold(0.0, f64::max);
        if spread <= f64::EPSILON * mean.abs().max(1.0) {
            return Err(FitError::ZeroVariance);
        }

        // Columns: centered source, 1
        let design = DMatrix::from_fn(n, 2, |row, col| if col == 0 { source[row] - mean } else { 1.0 });
        let observed = DVector::from_column_slice(target);
        let solution = design
            .svd(true, true)
            .solve(&observed, SVD_EPS)
            .map_err(|_| FitError::ZeroVariance)?;

        let slope = solution[0];
        let intercept = solution[1] - slope * mean;
        Ok(Self { intercept, slope })
    }

    pub fn predict(&self, source: f64) -> f64 {
        self.slope * source + self.intercept
    }
}
