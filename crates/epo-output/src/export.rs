//! Export functionality for EPO allocations.
//!
//! This module provides CSV and JSON export for allocation results and
//! their summaries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized CSV was not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Symbols, weights or covariance disagree on the number of assets.
    #[error("Dimension mismatch: expected {expected} assets, got {actual}")]
    DimensionMismatch {
        /// Number of symbols
        expected: usize,
        /// Length of the mismatched input
        actual: usize,
    },
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Allocation result ready for export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationExport {
    /// Portfolio name or identifier.
    pub name: String,

    /// Date of the returns window the allocation was computed on.
    pub as_of: Option<NaiveDate>,

    /// Allocation method name.
    pub method: String,

    /// Shrinkage intensity used.
    pub shrinkage: f64,

    /// One holding per asset, in input column order.
    pub holdings: Vec<Holding>,
}

impl AllocationExport {
    /// Create a new allocation export.
    pub const fn new(
        name: String,
        as_of: Option<NaiveDate>,
        method: String,
        shrinkage: f64,
        holdings: Vec<Holding>,
    ) -> Self {
        Self {
            name,
            as_of,
            method,
            shrinkage,
            holdings,
        }
    }

    /// Pair symbols with weights.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the lengths differ.
    pub fn from_weights(
        name: &str,
        method: &str,
        shrinkage: f64,
        symbols: &[String],
        weights: &[f64],
    ) -> Result<Self, ExportError> {
        if symbols.len() != weights.len() {
            return Err(ExportError::DimensionMismatch {
                expected: symbols.len(),
                actual: weights.len(),
            });
        }

        let holdings = symbols
            .iter()
            .zip(weights)
            .map(|(symbol, &weight)| Holding::new(symbol.clone(), weight))
            .collect();

        Ok(Self::new(
            name.to_string(),
            None,
            method.to_string(),
            shrinkage,
            holdings,
        ))
    }

    /// Set the as-of date.
    pub const fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Get total portfolio weight.
    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }

    /// Holding weights in order.
    pub fn weights(&self) -> Vec<f64> {
        self.holdings.iter().map(|h| h.weight).collect()
    }
}

/// A single holding in an allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    /// Asset symbol.
    pub symbol: String,

    /// Portfolio weight; negative for short positions.
    pub weight: f64,
}

impl Holding {
    /// Create a new holding.
    pub const fn new(symbol: String, weight: f64) -> Self {
        Self { symbol, weight }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Finish a CSV writer into a string.
pub(crate) fn csv_to_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

impl Exporter for AllocationExport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut output = String::new();

                // Header information as comments
                output.push_str(&format!("# Portfolio: {}\n", self.name));
                if let Some(as_of) = self.as_of {
                    output.push_str(&format!("# Date: {}\n", as_of));
                }
                output.push_str(&format!("# Method: {}\n", self.method));
                output.push_str(&format!("# Shrinkage: {}\n", self.shrinkage));
                output.push_str(&format!("# Total Weight: {}\n", self.total_weight()));

                let mut wtr = csv::Writer::from_writer(vec![]);
                for holding in &self.holdings {
                    wtr.serialize(holding)?;
                }
                output.push_str(&csv_to_string(wtr)?);
                Ok(output)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}
