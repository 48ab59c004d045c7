//! Dense linear algebra helpers
//!
//! Routines over `ndarray` arrays used by the allocator: inversion of the
//! shrunk covariance and quadratic forms.

use crate::covariance::CovarianceError;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

/// Invert a square matrix
///
/// The matrix is first equilibrated as `S A S` with `S = diag(1/sqrt|a_ii|)`,
/// which turns a covariance into its correlation matrix, then factored by
/// LU with partial pivoting. A pivot of the equilibrated matrix at or below
/// `max|b_ij| · ε · n` means the matrix is singular. Rescaling an asset's
/// returns leaves the decision unchanged.
///
/// # Arguments
/// * `matrix` - Square matrix to invert
///
/// # Returns
/// * The inverse, or `CovarianceError::Singular` when a pivot vanishes
pub fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>, CovarianceError> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(CovarianceError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(CovarianceError::Singular);
    }

    // Zero diagonal entries keep unit scale
    let scales: Vec<f64> = matrix
        .diag()
        .iter()
        .map(|&d| if d != 0.0 { 1.0 / d.abs().sqrt() } else { 1.0 })
        .collect();

    let equilibrated = DMatrix::from_fn(n, n, |i, j| matrix[[i, j]] * scales[i] * scales[j]);
    let scale = equilibrated.amax();
    if scale == 0.0 {
        return Err(CovarianceError::Singular);
    }
    let tolerance = scale * f64::EPSILON * n as f64;

    let lu = equilibrated.lu();
    if lu.u().diagonal().iter().any(|u| u.abs() <= tolerance) {
        return Err(CovarianceError::Singular);
    }
    let inverse = lu.try_inverse().ok_or(CovarianceError::Singular)?;

    // A⁻¹ = S B⁻¹ S
    Ok(Array2::from_shape_fn((n, n), |(i, j)| {
        inverse[(i, j)] * scales[i] * scales[j]
    }))
}

/// Quadratic form xᵀ M x
pub fn quadratic_form(x: &Array1<f64>, matrix: &Array2<f64>) -> Result<f64, CovarianceError> {
    if matrix.nrows() != x.len() || matrix.ncols() != x.len() {
        return Err(CovarianceError::DimensionMismatch {
            expected: matrix.ncols(),
            actual: x.len(),
        });
    }
    Ok(x.dot(&matrix.dot(x)))
}

/// Check whether a square matrix is symmetric within an absolute tolerance
pub fn is_symmetric(matrix: &Array2<f64>, tolerance: f64) -> bool {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return false;
    }
    (0..n).all(|i| ((i + 1)..n).all(|j| (matrix[[i, j]] - matrix[[j, i]]).abs() <= tolerance))
}
