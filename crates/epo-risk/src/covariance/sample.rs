//! Sample Covariance Estimator
//!
//! Unbiased sample covariance of asset returns:
//! Σ(i,j) = 1/(T-1) * Σ_t (r_{t,i} - μ_i) (r_{t,j} - μ_j)
//!
//! together with the derived correlation matrix
//! C(i,j) = Σ(i,j) / (σ_i σ_j)

use super::{CovarianceError, CovarianceEstimator};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sample covariance estimator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleCovarianceConfig {
    /// Minimum number of observations required (default: 2)
    /// The unbiased estimator divides by T-1, so fewer than 2 is undefined
    pub min_observations: usize,
}

impl Default for SampleCovarianceConfig {
    fn default() -> Self {
        Self {
            min_observations: 2,
        }
    }
}

/// Unbiased sample covariance estimator
#[derive(Debug, Default)]
pub struct SampleCovarianceEstimator {
    config: SampleCovarianceConfig,
}

impl SampleCovarianceEstimator {
    /// Create a new estimator with the given configuration
    pub fn new(config: SampleCovarianceConfig) -> Result<Self, CovarianceError> {
        if config.min_observations < 2 {
            return Err(CovarianceError::InvalidParameter(format!(
                "min_observations must be at least 2, got {}",
                config.min_observations
            )));
        }
        Ok(Self { config })
    }

    fn validate(&self, returns: &Array2<f64>) -> Result<(), CovarianceError> {
        let (n_obs, n_assets) = returns.dim();

        if n_assets == 0 {
            return Err(CovarianceError::EmptyUniverse);
        }

        if n_obs < self.config.min_observations {
            return Err(CovarianceError::InsufficientData {
                required: self.config.min_observations,
                actual: n_obs,
            });
        }

        if let Some(((row, column), _)) = returns.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(CovarianceError::NonFiniteInput { row, column });
        }

        Ok(())
    }
}

impl CovarianceEstimator for SampleCovarianceEstimator {
    fn estimate(&self, returns: &Array2<f64>) -> Result<Array2<f64>, CovarianceError> {
        self.validate(returns)?;

        let n_obs = returns.nrows();
        let means = returns
            .mean_axis(Axis(0))
            .ok_or(CovarianceError::InsufficientData {
                required: self.config.min_observations,
                actual: n_obs,
            })?;
        let centered = returns - &means.insert_axis(Axis(0));

        // S = X_c^T X_c / (T - 1)
        let mut cov = centered.t().dot(&centered) / (n_obs as f64 - 1.0);

        // Enforce exact symmetry
        let n = cov.nrows();
        for i in 0..n {
            for j in (i + 1)..n {
                let avg = 0.5 * (cov[[i, j]] + cov[[j, i]]);
                cov[[i, j]] = avg;
                cov[[j, i]] = avg;
            }
        }

        Ok(cov)
    }
}

/// Convert a covariance matrix into a correlation matrix.
///
/// Entries are clipped to [-1, 1]. An asset with zero variance has no
/// defined correlation; it gets 1 on the diagonal and 0 elsewhere.
pub fn correlation_from_covariance(cov: &Array2<f64>) -> Array2<f64> {
    let n = cov.nrows();
    let std_devs: Array1<f64> = cov.diag().mapv(|v| v.max(0.0).sqrt());

    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = std_devs[i] * std_devs[j];
        if denom > 0.0 {
            (cov[[i, j]] / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    })
}

/// First and second sample moments of a returns matrix
#[derive(Debug, Clone)]
pub struct SampleMoments {
    /// Sample covariance matrix Σ (N x N)
    pub covariance: Array2<f64>,
    /// Sample correlation matrix C (N x N)
    pub correlation: Array2<f64>,
    /// Diagonal of Σ
    pub variances: Array1<f64>,
    /// Square root of the variances
    pub volatilities: Array1<f64>,
}

impl SampleMoments {
    /// Estimate moments with the default sample estimator
    pub fn from_returns(returns: &Array2<f64>) -> Result<Self, CovarianceError> {
        Self::estimate_with(&SampleCovarianceEstimator::default(), returns)
    }

    /// Estimate moments with a configured estimator
    pub fn estimate_with(
        estimator: &SampleCovarianceEstimator,
        returns: &Array2<f64>,
    ) -> Result<Self, CovarianceError> {
        let covariance = estimator.estimate(returns)?;
        let correlation = correlation_from_covariance(&covariance);
        let variances = covariance.diag().to_owned();
        let volatilities = variances.mapv(|v| v.max(0.0).sqrt());

        debug!(
            observations = returns.nrows(),
            assets = returns.ncols(),
            "estimated sample moments"
        );

        Ok(Self {
            covariance,
            correlation,
            variances,
            volatilities,
        })
    }

    /// Number of assets
    pub fn n_assets(&self) -> usize {
        self.variances.len()
    }

    /// Diagonal variance matrix V = diag(diag(Σ))
    pub fn variance_diagonal(&self) -> Array2<f64> {
        Array2::from_diag(&self.variances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_sample_config_default() {
        let config = SampleCovarianceConfig::default();
        assert_eq!(config.min_observations, 2);
    }

    #[test]
    fn test_rejects_min_observations_below_two() {
        let config = SampleCovarianceConfig {
            min_observations: 1,
        };
        assert!(SampleCovarianceEstimator::new(config).is_err());
    }

    #[test]
    fn test_insufficient_data() {
        let estimator = SampleCovarianceEstimator::default();
        let returns = Array2::<f64>::zeros((1, 3));
        assert!(matches!(
            estimator.estimate(&returns),
            Err(CovarianceError::InsufficientData {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_empty_universe() {
        let estimator = SampleCovarianceEstimator::default();
        let returns = Array2::<f64>::zeros((10, 0));
        assert!(matches!(
            estimator.estimate(&returns),
            Err(CovarianceError::EmptyUniverse)
        ));
    }

    #[test]
    fn test_non_finite_input() {
        let estimator = SampleCovarianceEstimator::default();
        let returns = array![[0.01, 0.02], [f64::NAN, 0.01], [0.0, 0.0]];
        assert!(matches!(
            estimator.estimate(&returns),
            Err(CovarianceError::NonFiniteInput { row: 1, column: 0 })
        ));
    }

    #[test]
    fn test_unbiased_denominator() {
        let estimator = SampleCovarianceEstimator::default();
        let returns = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];

        let cov = estimator.estimate(&returns).unwrap();

        // Centered: [-1, 0, 1] and [-2, 0, 2]; divide by T-1 = 2
        assert_relative_eq!(cov[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[0, 1]], 2.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[1, 0]], 2.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[1, 1]], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_unit_diagonal_and_bounds() {
        let returns = array![
            [0.01, -0.02, 0.03],
            [0.02, 0.01, -0.01],
            [-0.01, 0.00, 0.02],
            [0.03, -0.01, 0.00],
        ];
        let moments = SampleMoments::from_returns(&returns).unwrap();

        for i in 0..3 {
            assert_relative_eq!(moments.correlation[[i, i]], 1.0);
            for j in 0..3 {
                let c = moments.correlation[[i, j]];
                assert!((-1.0..=1.0).contains(&c));
                assert_relative_eq!(c, moments.correlation[[j, i]], epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_perfectly_correlated_columns() {
        let returns = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let moments = SampleMoments::from_returns(&returns).unwrap();
        assert_relative_eq!(moments.correlation[[0, 1]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moments.volatilities[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_variance_asset() {
        let returns = array![[0.01, 0.5], [0.02, 0.5], [-0.01, 0.5]];
        let moments = SampleMoments::from_returns(&returns).unwrap();

        assert_eq!(moments.variances[1], 0.0);
        assert_eq!(moments.correlation[[1, 1]], 1.0);
        assert_eq!(moments.correlation[[0, 1]], 0.0);
    }

    #[test]
    fn test_variance_diagonal() {
        let returns = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let moments = SampleMoments::from_returns(&returns).unwrap();
        let v = moments.variance_diagonal();

        assert_relative_eq!(v[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(v[[1, 1]], 4.0, epsilon = 1e-12);
        assert_eq!(v[[0, 1]], 0.0);
        assert_eq!(v[[1, 0]], 0.0);
    }
}
