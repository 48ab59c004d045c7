//! Allocation summary statistics.
//!
//! Exposure and concentration figures for a set of weights, plus the
//! ex-ante volatility sqrt(wᵀ Σ w) when a covariance matrix is available.

use crate::export::{AllocationExport, ExportError, ExportFormat, Exporter, csv_to_string};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary of an allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationSummary {
    /// Portfolio name.
    pub name: String,

    /// Allocation method name.
    pub method: String,

    /// Number of assets.
    pub n_assets: usize,

    /// Sum of the weights.
    pub net_weight: f64,

    /// Sum of absolute weights.
    pub gross_exposure: f64,

    /// Number of strictly positive weights.
    pub long_positions: usize,

    /// Number of strictly negative weights.
    pub short_positions: usize,

    /// Symbol and weight of the largest absolute position.
    pub largest_position: Option<(String, f64)>,

    /// Ex-ante volatility sqrt(wᵀ Σ w), in the units of the returns.
    pub ex_ante_volatility: Option<f64>,
}

impl AllocationSummary {
    /// Summarize an allocation.
    ///
    /// # Arguments
    ///
    /// * `allocation` - Exported allocation
    /// * `covariance` - Optional covariance matrix in holding order
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the covariance is not N x N.
    pub fn from_export(
        allocation: &AllocationExport,
        covariance: Option<&Array2<f64>>,
    ) -> Result<Self, ExportError> {
        let weights = Array1::from(allocation.weights());
        let n_assets = weights.len();

        let ex_ante_volatility = match covariance {
            Some(cov) => {
                if cov.dim() != (n_assets, n_assets) {
                    return Err(ExportError::DimensionMismatch {
                        expected: n_assets,
                        actual: cov.nrows(),
                    });
                }
                // Clamp rounding noise below zero
                Some(weights.dot(&cov.dot(&weights)).max(0.0).sqrt())
            }
            None => None,
        };

        let largest_position = allocation
            .holdings
            .iter()
            .max_by(|a, b| a.weight.abs().total_cmp(&b.weight.abs()))
            .map(|h| (h.symbol.clone(), h.weight));

        Ok(Self {
            name: allocation.name.clone(),
            method: allocation.method.clone(),
            n_assets,
            net_weight: weights.sum(),
            gross_exposure: weights.mapv(f64::abs).sum(),
            long_positions: weights.iter().filter(|&&w| w > 0.0).count(),
            short_positions: weights.iter().filter(|&&w| w < 0.0).count(),
            largest_position,
            ex_ante_volatility,
        })
    }

    /// Gross exposure of the short side.
    pub fn short_exposure(&self) -> f64 {
        0.5 * (self.gross_exposure - self.net_weight)
    }

    /// Flatten into metric/value records for CSV export.
    fn to_flat_records(&self) -> Vec<SummaryFlat> {
        let mut records = vec![
            SummaryFlat::new("n_assets", self.n_assets as f64),
            SummaryFlat::new("net_weight", self.net_weight),
            SummaryFlat::new("gross_exposure", self.gross_exposure),
            SummaryFlat::new("long_positions", self.long_positions as f64),
            SummaryFlat::new("short_positions", self.short_positions as f64),
        ];
        if let Some((_, weight)) = &self.largest_position {
            records.push(SummaryFlat::new("largest_position", *weight));
        }
        if let Some(vol) = self.ex_ante_volatility {
            records.push(SummaryFlat::new("ex_ante_volatility", vol));
        }
        records
    }
}

#[derive(Debug, Serialize)]
struct SummaryFlat {
    metric: &'static str,
    value: f64,
}

impl SummaryFlat {
    const fn new(metric: &'static str, value: f64) -> Self {
        Self { metric, value }
    }
}

impl Exporter for AllocationSummary {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for record in self.to_flat_records() {
                    wtr.serialize(&record)?;
                }
                csv_to_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl fmt::Display for AllocationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Allocation Summary: {} ({})", self.name, self.method)?;
        writeln!(f, "  Assets: {}", self.n_assets)?;
        writeln!(f, "  Net Weight: {:.4}", self.net_weight)?;
        writeln!(f, "  Gross Exposure: {:.4}", self.gross_exposure)?;
        writeln!(
            f,
            "  Positions: {} long, {} short",
            self.long_positions, self.short_positions
        )?;
        if let Some((symbol, weight)) = &self.largest_position {
            writeln!(f, "  Largest Position: {} ({:.4})", symbol, weight)?;
        }
        if let Some(vol) = self.ex_ante_volatility {
            writeln!(f, "  Ex-ante Volatility: {:.4}%", vol * 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn long_short() -> AllocationExport {
        AllocationExport::from_weights(
            "ls",
            "simple",
            0.0,
            &["A".to_string(), "B".to_string(), "C".to_string()],
            &[0.5, 0.75, -0.25],
        )
        .unwrap()
    }

    #[test]
    fn test_exposures() {
        let summary = AllocationSummary::from_export(&long_short(), None).unwrap();

        assert_eq!(summary.n_assets, 3);
        assert_relative_eq!(summary.net_weight, 1.0, epsilon = 1e-12);
        assert_relative_eq!(summary.gross_exposure, 1.5, epsilon = 1e-12);
        assert_relative_eq!(summary.short_exposure(), 0.25, epsilon = 1e-12);
        assert_eq!(summary.long_positions, 2);
        assert_eq!(summary.short_positions, 1);
        assert_eq!(summary.largest_position, Some(("B".to_string(), 0.75)));
        assert!(summary.ex_ante_volatility.is_none());
    }

    #[test]
    fn test_ex_ante_volatility() {
        let export = AllocationExport::from_weights(
            "pair",
            "simple",
            0.0,
            &["A".to_string(), "B".to_string()],
            &[0.5, 0.5],
        )
        .unwrap();
        let cov = array![[0.04, 0.01], [0.01, 0.09]];

        let summary = AllocationSummary::from_export(&export, Some(&cov)).unwrap();

        // 0.25 * 0.04 + 2 * 0.25 * 0.01 + 0.25 * 0.09 = 0.0375
        assert_relative_eq!(
            summary.ex_ante_volatility.unwrap(),
            0.0375_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_covariance_dimension_mismatch() {
        let cov = Array2::<f64>::eye(2);
        assert!(matches!(
            AllocationSummary::from_export(&long_short(), Some(&cov)),
            Err(ExportError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_display() {
        let summary = AllocationSummary::from_export(&long_short(), None).unwrap();
        let text = summary.to_string();

        assert!(text.contains("Allocation Summary: ls (simple)"));
        assert!(text.contains("2 long, 1 short"));
        assert!(text.contains("Largest Position: B (0.7500)"));
        assert!(!text.contains("Volatility"));
    }

    #[test]
    fn test_summary_csv() {
        let summary = AllocationSummary::from_export(&long_short(), None).unwrap();
        let csv = summary.export_to_string(ExportFormat::Csv).unwrap();

        assert!(csv.starts_with("metric,value"));
        assert!(csv.contains("gross_exposure,1.5"));
        assert!(csv.contains("short_positions,1"));
    }

    #[test]
    fn test_empty_allocation() {
        let export =
            AllocationExport::new("empty".to_string(), None, "simple".to_string(), 0.0, vec![]);
        let summary = AllocationSummary::from_export(&export, None).unwrap();
        assert_eq!(summary.n_assets, 0);
        assert!(summary.largest_position.is_none());
    }
}
