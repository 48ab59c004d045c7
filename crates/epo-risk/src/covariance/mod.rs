//! Asset covariance estimation
//!
//! Provides the sample estimator used by the allocator and the shrinkage of
//! its correlation structure toward the identity.

pub mod sample;
pub mod shrinkage;

pub use sample::{
    SampleCovarianceConfig, SampleCovarianceEstimator, SampleMoments, correlation_from_covariance,
};
pub use shrinkage::CorrelationShrinkage;

use ndarray::Array2;
use thiserror::Error;

/// Errors that can occur during covariance estimation
#[derive(Debug, Error)]
pub enum CovarianceError {
    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Returns matrix has no asset columns
    #[error("Returns matrix has no asset columns")]
    EmptyUniverse,

    /// A return observation is NaN or infinite
    #[error("Non-finite return at observation {row}, asset {column}")]
    NonFiniteInput {
        /// Observation (row) index
        row: usize,
        /// Asset (column) index
        column: usize,
    },

    /// Matrix cannot be inverted
    #[error("Matrix is singular and cannot be inverted")]
    Singular,

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Trait for covariance matrix estimators
pub trait CovarianceEstimator {
    /// Estimate the covariance matrix from asset returns
    ///
    /// # Arguments
    /// * `returns` - Matrix where each row is an observation and each column is an asset
    ///
    /// # Returns
    /// * Estimated covariance matrix (N x N where N is number of assets)
    fn estimate(&self, returns: &Array2<f64>) -> Result<Array2<f64>, CovarianceError>;
}
