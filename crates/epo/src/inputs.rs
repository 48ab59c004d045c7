//! Default signal and anchor constructions.

use crate::error::EpoError;
use epo_risk::CovarianceError;
use ndarray::{Array1, Array2, Axis};

/// Historical mean return of each asset, a naive return signal
pub fn mean_signal(returns: &Array2<f64>) -> Result<Array1<f64>, EpoError> {
    returns.mean_axis(Axis(0)).ok_or_else(|| {
        EpoError::from(CovarianceError::InsufficientData {
            required: 1,
            actual: 0,
        })
    })
}

/// Equal-weight (1/N) anchor portfolio
pub fn uniform_anchor(n_assets: usize) -> Array1<f64> {
    if n_assets == 0 {
        return Array1::zeros(0);
    }
    Array1::from_elem(n_assets, 1.0 / n_assets as f64)
}
