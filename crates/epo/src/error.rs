//! Allocation errors.

use epo_data::DataError;
use epo_output::ExportError;
use epo_risk::CovarianceError;
use thiserror::Error;

/// Errors raised while computing an allocation
#[derive(Debug, Error)]
pub enum EpoError {
    /// Method name is not `simple` or `anchored`
    #[error("Method '{0}' not accepted, try `simple` or `anchored` instead")]
    InvalidMethod(String),

    /// The anchored method was requested without an anchor
    #[error("The `anchored` method requires an anchor allocation")]
    MissingAnchor,

    /// Signal or anchor length does not match the number of assets
    #[error("Dimension mismatch: {name} has length {actual}, expected {expected}")]
    DimensionMismatch {
        /// Which input is mismatched
        name: &'static str,
        /// Number of assets
        expected: usize,
        /// Length of the input
        actual: usize,
    },

    /// Shrunk covariance matrix is not invertible
    #[error("Shrunk covariance matrix is singular")]
    SingularMatrix,

    /// Division by zero in the allocation formulas
    #[error("Degenerate arithmetic: {0}")]
    ArithmeticDegenerate(String),

    /// Parameter outside its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Covariance estimation error
    #[error("Covariance error: {0}")]
    Covariance(CovarianceError),

    /// Input coercion error
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Export error
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

impl From<CovarianceError> for EpoError {
    fn from(err: CovarianceError) -> Self {
        match err {
            CovarianceError::Singular => Self::SingularMatrix,
            CovarianceError::InvalidParameter(msg) => Self::InvalidParameter(msg),
            other => Self::Covariance(other),
        }
    }
}
