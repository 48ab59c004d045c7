//! Correlation shrinkage toward the identity
//!
//! Shrinks the sample correlation matrix toward the identity and rescales it
//! with the original asset volatilities:
//!
//! C̃ = (1-w) C + w I
//! Σ̃ = diag(σ) C̃ diag(σ)
//!
//! Unlike Ledoit-Wolf, the intensity w is a user choice, not estimated.
//! Variances are left untouched; only the off-diagonal correlations are
//! scaled by (1-w). At w = 0 Σ̃ is the sample covariance, at w = 1 it is
//! the diagonal variance matrix.

use super::{CovarianceError, SampleMoments};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shrinkage of the correlation matrix toward the identity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct CorrelationShrinkage {
    intensity: f64,
}

impl CorrelationShrinkage {
    /// Create a shrinkage with intensity `w` in [0, 1]
    pub fn new(intensity: f64) -> Result<Self, CovarianceError> {
        if !intensity.is_finite() || !(0.0..=1.0).contains(&intensity) {
            return Err(CovarianceError::InvalidParameter(format!(
                "shrinkage intensity must be between 0 and 1, got {intensity}"
            )));
        }
        Ok(Self { intensity })
    }

    /// Shrinkage intensity w
    pub const fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Blend a correlation matrix with the identity: (1-w) C + w I
    pub fn shrink_correlation(&self, correlation: &Array2<f64>) -> Array2<f64> {
        let w = self.intensity;
        let n = correlation.nrows();
        correlation * (1.0 - w) + Array2::<f64>::eye(n) * w
    }

    /// Rescale a correlation matrix to covariance units: σ_i σ_j C(i,j)
    pub fn rescale(volatilities: &Array1<f64>, correlation: &Array2<f64>) -> Array2<f64> {
        let n = volatilities.len();
        Array2::from_shape_fn((n, n), |(i, j)| {
            volatilities[i] * correlation[[i, j]] * volatilities[j]
        })
    }

    /// Shrunk covariance Σ̃ built from sample moments
    pub fn shrunk_covariance(&self, moments: &SampleMoments) -> Array2<f64> {
        debug!(
            intensity = self.intensity,
            assets = moments.n_assets(),
            "shrinking correlation toward identity"
        );
        let shrunk = self.shrink_correlation(&moments.correlation);
        Self::rescale(&moments.volatilities, &shrunk)
    }
}
