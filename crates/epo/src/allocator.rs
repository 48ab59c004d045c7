//! Enhanced Portfolio Optimization allocator
//!
//! 1. Sample covariance Σ and correlation C of the returns
//! 2. Shrink the correlation toward the identity: C̃ = (1-w) C + w I
//! 3. Rescale with the asset volatilities: Σ̃ = diag(σ) C̃ diag(σ)
//! 4. Allocate with Σ̃⁻¹:
//!    - simple:   x = (1/λ) Σ̃⁻¹ s
//!    - anchored: x = Σ̃⁻¹ ((1-w) γ s + w V a)
//!
//! where V = diag(Σ), a is the anchor portfolio, and γ is 1/λ (exogenous)
//! or sqrt(aᵀ Σ̃ a) / sqrt(sᵀ Σ̃⁻¹ Σ̃ Σ̃⁻¹ s) (endogenous), which gives the
//! signal portfolio the same risk as the anchor.

use crate::config::{AllocationConfig, Method};
use crate::error::EpoError;
use epo_output::AllocationExport;
use epo_risk::linalg::{invert, quadratic_form};
use epo_risk::{CorrelationShrinkage, SampleMoments};
use ndarray::{Array1, Array2};
use serde::Serialize;
use tracing::{debug, info};

/// Result of an allocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    /// Portfolio weights, in the column order of the returns matrix
    pub weights: Array1<f64>,
    /// Method used
    pub method: Method,
    /// Shrinkage intensity used
    pub shrinkage: f64,
    /// Multiplier applied to the signal: 1/λ, or γ for endogenous anchoring
    pub risk_scale: f64,
    /// Whether the weights were rescaled to sum to one
    pub normalized: bool,
}

impl Allocation {
    /// Portfolio weights
    pub const fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Consume the allocation, keeping only the weights
    pub fn into_weights(self) -> Array1<f64> {
        self.weights
    }

    /// Sum of the weights
    pub fn total_weight(&self) -> f64 {
        self.weights.sum()
    }

    /// Label the weights with asset symbols for export.
    ///
    /// # Errors
    ///
    /// Returns `Export` if `symbols` does not have one entry per weight.
    pub fn to_export(&self, name: &str, symbols: &[String]) -> Result<AllocationExport, EpoError> {
        Ok(AllocationExport::from_weights(
            name,
            self.method.name(),
            self.shrinkage,
            symbols,
            &self.weights.to_vec(),
        )?)
    }
}

/// EPO allocator
///
/// Holds a validated configuration; [`EpoAllocator::allocate`] is pure and
/// may be called concurrently.
#[derive(Debug, Clone)]
pub struct EpoAllocator {
    config: AllocationConfig,
    shrinkage: CorrelationShrinkage,
}

impl EpoAllocator {
    /// Create an allocator from a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails [`AllocationConfig::validate`].
    pub fn new(config: AllocationConfig) -> Result<Self, EpoError> {
        config.validate()?;
        let shrinkage = CorrelationShrinkage::new(config.shrinkage)?;
        Ok(Self { config, shrinkage })
    }

    /// Configuration in use
    pub const fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// Compute the allocation
    ///
    /// # Arguments
    /// * `returns` - Historical returns (T x N), rows are observations
    /// * `signal` - Expected-return view per asset (N)
    /// * `anchor` - Benchmark allocation (N), required by the anchored method
    ///
    /// # Errors
    /// * `MissingAnchor` - anchored method without an anchor
    /// * `DimensionMismatch` - signal or anchor length differs from N
    /// * `SingularMatrix` - the shrunk covariance cannot be inverted
    /// * `ArithmeticDegenerate` - zero-risk signal under endogenous anchoring,
    ///   or normalization of weights that sum to zero
    /// * `Covariance` - fewer than two observations, no assets, or non-finite returns
    pub fn allocate(
        &self,
        returns: &Array2<f64>,
        signal: &Array1<f64>,
        anchor: Option<&Array1<f64>>,
    ) -> Result<Allocation, EpoError> {
        let method = self.config.method;
        let anchor = match (method, anchor) {
            (Method::Anchored { .. }, None) => return Err(EpoError::MissingAnchor),
            (Method::Anchored { .. }, Some(a)) => Some(a),
            (Method::Simple, _) => None,
        };

        let moments = SampleMoments::from_returns(returns)?;
        let n = moments.n_assets();
        check_length("signal", n, signal.len())?;
        if let Some(a) = anchor {
            check_length("anchor", n, a.len())?;
        }

        let shrunk_cov = self.shrinkage.shrunk_covariance(&moments);
        let inv_shrunk_cov = invert(&shrunk_cov)?;

        let w = self.shrinkage.intensity();
        let (weights, risk_scale) = match (method, anchor) {
            (Method::Anchored { endogenous }, Some(a)) => {
                let gamma = if endogenous {
                    endogenous_risk_scale(signal, a, &shrunk_cov, &inv_shrunk_cov)?
                } else {
                    1.0 / self.config.risk_aversion
                };
                // V a is elementwise since V is diagonal
                let anchored_view = signal * ((1.0 - w) * gamma) + (&moments.variances * a) * w;
                (inv_shrunk_cov.dot(&anchored_view), gamma)
            }
            _ => {
                let scale = 1.0 / self.config.risk_aversion;
                (inv_shrunk_cov.dot(signal) * scale, scale)
            }
        };

        let weights = if self.config.normalize {
            normalize(weights)?
        } else {
            weights
        };

        info!(
            method = method.name(),
            assets = n,
            observations = returns.nrows(),
            shrinkage = w,
            risk_scale,
            "computed EPO allocation"
        );

        Ok(Allocation {
            weights,
            method,
            shrinkage: w,
            risk_scale,
            normalized: self.config.normalize,
        })
    }
}

/// Allocate with the classic argument list.
///
/// `method` is `"simple"` or `"anchored"`; `endogenous` only applies to
/// `"anchored"`. Returns just the weights.
///
/// # Errors
///
/// `InvalidMethod` for an unknown method name, `MissingAnchor` when anchored
/// without an anchor, then any error from [`EpoAllocator::allocate`].
#[allow(clippy::too_many_arguments)]
pub fn allocate(
    returns: &Array2<f64>,
    signal: &Array1<f64>,
    lambda: f64,
    method: &str,
    w: f64,
    anchor: Option<&Array1<f64>>,
    normalize: bool,
    endogenous: bool,
) -> Result<Array1<f64>, EpoError> {
    let method = Method::parse(method, endogenous)?;
    if method.is_anchored() && anchor.is_none() {
        return Err(EpoError::MissingAnchor);
    }

    let config = AllocationConfig {
        method,
        shrinkage: w,
        risk_aversion: lambda,
        normalize,
    };
    let allocation = EpoAllocator::new(config)?.allocate(returns, signal, anchor)?;
    Ok(allocation.into_weights())
}

const fn check_length(name: &'static str, expected: usize, actual: usize) -> Result<(), EpoError> {
    if expected != actual {
        return Err(EpoError::DimensionMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

/// γ = sqrt(aᵀ Σ̃ a) / sqrt(sᵀ Σ̃⁻¹ Σ̃ Σ̃⁻¹ s)
fn endogenous_risk_scale(
    signal: &Array1<f64>,
    anchor: &Array1<f64>,
    shrunk_cov: &Array2<f64>,
    inv_shrunk_cov: &Array2<f64>,
) -> Result<f64, EpoError> {
    let anchor_variance = quadratic_form(anchor, shrunk_cov)?;
    let signal_portfolio = inv_shrunk_cov.dot(signal);
    let signal_variance = quadratic_form(&signal_portfolio, shrunk_cov)?;

    if !(signal_variance.is_finite() && signal_variance > 0.0) {
        return Err(EpoError::ArithmeticDegenerate(format!(
            "signal portfolio variance is {signal_variance}, cannot scale to the anchor"
        )));
    }
    if anchor_variance < 0.0 || !anchor_variance.is_finite() {
        return Err(EpoError::ArithmeticDegenerate(format!(
            "anchor variance is {anchor_variance}"
        )));
    }

    let gamma = anchor_variance.sqrt() / signal_variance.sqrt();
    debug!(anchor_variance, signal_variance, gamma, "endogenous risk scale");
    Ok(gamma)
}

/// Rescale weights to sum to one.
fn normalize(weights: Array1<f64>) -> Result<Array1<f64>, EpoError> {
    let total = weights.sum();
    let gross = weights.iter().map(|v| v.abs()).sum::<f64>();

    if !total.is_finite() || total.abs() <= f64::EPSILON * gross {
        return Err(EpoError::ArithmeticDegenerate(format!(
            "cannot normalize weights summing to {total}"
        )));
    }

    Ok(weights / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn returns() -> Array2<f64> {
        array![
            [0.012, -0.004, 0.007],
            [-0.008, 0.011, 0.002],
            [0.015, 0.003, -0.006],
            [-0.002, -0.009, 0.010],
            [0.006, 0.007, -0.003],
            [0.009, -0.001, 0.004],
            [-0.011, 0.005, 0.001],
            [0.004, 0.012, -0.008],
        ]
    }

    #[test]
    fn test_new_validates_config() {
        let config = AllocationConfig {
            shrinkage: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            EpoAllocator::new(config),
            Err(EpoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_simple_normalized_sums_to_one() {
        let allocator = EpoAllocator::new(AllocationConfig {
            shrinkage: 0.3,
            risk_aversion: 5.0,
            ..Default::default()
        })
        .unwrap();
        let signal = array![0.01, 0.02, 0.015];

        let allocation = allocator.allocate(&returns(), &signal, None).unwrap();

        assert!(allocation.normalized);
        assert_relative_eq!(allocation.total_weight(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(allocation.risk_scale, 0.2);
    }

    #[test]
    fn test_simple_ignores_anchor() {
        let allocator = EpoAllocator::new(AllocationConfig::default()).unwrap();
        let signal = array![0.01, 0.02, 0.015];
        let wrong_length_anchor = array![1.0];

        let with = allocator
            .allocate(&returns(), &signal, Some(&wrong_length_anchor))
            .unwrap();
        let without = allocator.allocate(&returns(), &signal, None).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_anchored_requires_anchor() {
        let allocator = EpoAllocator::new(AllocationConfig {
            method: Method::Anchored { endogenous: true },
            ..Default::default()
        })
        .unwrap();
        let signal = array![0.01, 0.02, 0.015];

        assert!(matches!(
            allocator.allocate(&returns(), &signal, None),
            Err(EpoError::MissingAnchor)
        ));
    }

    #[test]
    fn test_signal_length_mismatch() {
        let allocator = EpoAllocator::new(AllocationConfig::default()).unwrap();
        let signal = array![0.01, 0.02];

        assert!(matches!(
            allocator.allocate(&returns(), &signal, None),
            Err(EpoError::DimensionMismatch {
                name: "signal",
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_anchor_length_mismatch() {
        let allocator = EpoAllocator::new(AllocationConfig {
            method: Method::Anchored { endogenous: false },
            ..Default::default()
        })
        .unwrap();
        let signal = array![0.01, 0.02, 0.015];
        let anchor = array![0.5, 0.5];

        assert!(matches!(
            allocator.allocate(&returns(), &signal, Some(&anchor)),
            Err(EpoError::DimensionMismatch { name: "anchor", .. })
        ));
    }

    #[test]
    fn test_exogenous_risk_scale_is_inverse_lambda() {
        let allocator = EpoAllocator::new(AllocationConfig {
            method: Method::Anchored { endogenous: false },
            shrinkage: 0.5,
            risk_aversion: 4.0,
            normalize: false,
        })
        .unwrap();
        let signal = array![0.01, 0.02, 0.015];
        let anchor = array![0.2, 0.3, 0.5];

        let allocation = allocator
            .allocate(&returns(), &signal, Some(&anchor))
            .unwrap();
        assert_relative_eq!(allocation.risk_scale, 0.25);
        assert!(!allocation.normalized);
    }

    #[test]
    fn test_zero_signal_cannot_normalize() {
        let allocator = EpoAllocator::new(AllocationConfig::default()).unwrap();
        let signal = Array1::zeros(3);

        assert!(matches!(
            allocator.allocate(&returns(), &signal, None),
            Err(EpoError::ArithmeticDegenerate(_))
        ));
    }

    #[test]
    fn test_zero_signal_endogenous() {
        let allocator = EpoAllocator::new(AllocationConfig {
            method: Method::Anchored { endogenous: true },
            shrinkage: 0.5,
            ..Default::default()
        })
        .unwrap();
        let signal = Array1::zeros(3);
        let anchor = array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];

        assert!(matches!(
            allocator.allocate(&returns(), &signal, Some(&anchor)),
            Err(EpoError::ArithmeticDegenerate(_))
        ));
    }

    #[test]
    fn test_to_export() {
        let allocator = EpoAllocator::new(AllocationConfig {
            shrinkage: 0.25,
            ..Default::default()
        })
        .unwrap();
        let signal = array![0.01, 0.02, 0.015];
        let allocation = allocator.allocate(&returns(), &signal, None).unwrap();
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let export = allocation.to_export("test", &symbols).unwrap();
        assert_eq!(export.method, "simple");
        assert_eq!(export.shrinkage, 0.25);
        assert_eq!(export.holdings.len(), 3);
        assert_eq!(export.holdings[1].symbol, "B");
        assert_relative_eq!(export.total_weight(), 1.0, epsilon = 1e-12);

        assert!(matches!(
            allocation.to_export("test", &symbols[..2]),
            Err(EpoError::Export(_))
        ));
    }

    #[test]
    fn test_normalize() {
        let w = normalize(array![1.0, 3.0]).unwrap();
        assert_relative_eq!(w[0], 0.25);
        assert_relative_eq!(w[1], 0.75);

        // Long-short weights keep their signs
        let w = normalize(array![2.0, -1.0]).unwrap();
        assert_relative_eq!(w[0], 2.0);
        assert_relative_eq!(w[1], -1.0);

        assert!(normalize(array![1.0, -1.0]).is_err());
        assert!(normalize(array![0.0, 0.0]).is_err());
    }
}
