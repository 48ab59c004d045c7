//! Returns table adapters.
//!
//! Every adapter produces a [`ReturnsTable`]: an observations x assets
//! matrix plus one symbol per column. Column order is preserved from the
//! source and determines the order of the resulting allocation.

use crate::error::{DataError, Result};
use ndarray::Array2;
use polars::prelude::{DataFrame, DataType};
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Historical returns with asset symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsTable {
    symbols: Vec<String>,
    returns: Array2<f64>,
}

impl ReturnsTable {
    /// Create a table from symbols and a returns matrix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInputKind` if the number of symbols does not match the
    /// number of columns.
    pub fn new(symbols: Vec<String>, returns: Array2<f64>) -> Result<Self> {
        if symbols.len() != returns.ncols() {
            return Err(DataError::InvalidInputKind(format!(
                "{} symbols for {} return columns",
                symbols.len(),
                returns.ncols()
            )));
        }
        Ok(Self { symbols, returns })
    }

    /// Wrap a bare matrix, naming columns `asset_0`, `asset_1`, ...
    pub fn from_array(returns: Array2<f64>) -> Self {
        let symbols = default_symbols(returns.ncols());
        Self { symbols, returns }
    }

    /// Build a table from row-major observations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInputKind` if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(DataError::InvalidInputKind(format!(
                    "ragged rows: row {} has {} values, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
        }

        let height = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let returns = Array2::from_shape_vec((height, width), flat)
            .map_err(|e| DataError::InvalidInputKind(e.to_string()))?;

        Ok(Self::from_array(returns))
    }

    /// Read a CSV file whose header row holds the asset symbols.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading returns CSV");
        Self::from_csv_reader(File::open(path)?)
    }

    /// Read CSV data whose header row holds the asset symbols.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed CSV, non-numeric cells, or empty cells.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let symbols: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if symbols.is_empty() {
            return Err(DataError::InvalidInputKind(
                "CSV input has no header columns".to_string(),
            ));
        }

        let mut flat = Vec::new();
        let mut height = 0;
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            for (field, symbol) in record.iter().zip(&symbols) {
                if field.is_empty() {
                    return Err(DataError::MissingValue {
                        column: symbol.clone(),
                        row,
                    });
                }
                let value = field.parse::<f64>().map_err(|_| {
                    DataError::Parse(format!(
                        "row {row}, column '{symbol}': '{field}' is not a number"
                    ))
                })?;
                flat.push(value);
            }
            height += 1;
        }

        let returns = Array2::from_shape_vec((height, symbols.len()), flat)
            .map_err(|e| DataError::InvalidInputKind(e.to_string()))?;

        debug!(
            observations = height,
            assets = symbols.len(),
            "parsed returns CSV"
        );

        Self::new(symbols, returns)
    }

    /// Convert a JSON value into a returns table.
    ///
    /// Accepted shapes:
    /// - an array of rows, each an array of numbers
    /// - an object mapping symbol to a column array (columns ordered by key)
    ///
    /// # Errors
    ///
    /// Returns `InvalidInputKind` for scalars, strings, flat arrays and other
    /// non-tabular values.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Array(rows) => Self::from_json_rows(rows),
            Value::Object(columns) => {
                let mut symbols = Vec::with_capacity(columns.len());
                let mut data = Vec::with_capacity(columns.len());
                for (symbol, column) in columns {
                    let Value::Array(cells) = column else {
                        return Err(DataError::InvalidInputKind(format!(
                            "column '{symbol}' is {}, expected an array",
                            json_kind(column)
                        )));
                    };
                    let values = cells
                        .iter()
                        .enumerate()
                        .map(|(row, cell)| json_number(cell, symbol, row))
                        .collect::<Result<Vec<f64>>>()?;
                    symbols.push(symbol.clone());
                    data.push(values);
                }

                let height = data.first().map_or(0, Vec::len);
                if let Some((symbol, column)) = symbols
                    .iter()
                    .zip(&data)
                    .find(|(_, column)| column.len() != height)
                {
                    return Err(DataError::InvalidInputKind(format!(
                        "column '{symbol}' has {} values, expected {height}",
                        column.len()
                    )));
                }

                let returns = Array2::from_shape_fn((height, data.len()), |(t, j)| data[j][t]);
                Self::new(symbols, returns)
            }
            other => Err(DataError::InvalidInputKind(format!(
                "expected a table of returns, got {}",
                json_kind(other)
            ))),
        }
    }

    fn from_json_rows(rows: &[Value]) -> Result<Self> {
        let symbols = match rows.first() {
            Some(Value::Array(first)) => default_symbols(first.len()),
            Some(other) => {
                return Err(DataError::InvalidInputKind(format!(
                    "expected a 2-D array of returns, got an array of {}",
                    json_kind(other)
                )));
            }
            None => Vec::new(),
        };

        let mut parsed = Vec::with_capacity(rows.len());
        for (row, value) in rows.iter().enumerate() {
            let Value::Array(cells) = value else {
                return Err(DataError::InvalidInputKind(format!(
                    "row {row} is {}, expected an array",
                    json_kind(value)
                )));
            };
            if cells.len() != symbols.len() {
                return Err(DataError::InvalidInputKind(format!(
                    "ragged rows: row {row} has {} values, expected {}",
                    cells.len(),
                    symbols.len()
                )));
            }
            let values = cells
                .iter()
                .zip(&symbols)
                .map(|(cell, symbol)| json_number(cell, symbol, row))
                .collect::<Result<Vec<f64>>>()?;
            parsed.push(values);
        }

        Self::from_rows(parsed)
    }

    /// Convert a polars DataFrame with numeric columns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInputKind` for non-numeric columns and `MissingValue`
    /// for nulls.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let (height, width) = (df.height(), df.width());
        let mut returns = Array2::<f64>::zeros((height, width));
        let mut symbols = Vec::with_capacity(width);

        for (j, column) in df.get_columns().iter().enumerate() {
            let name = column.name().to_string();
            let dtype = column.dtype();
            if !(dtype.is_float() || dtype.is_integer()) {
                return Err(DataError::InvalidInputKind(format!(
                    "column '{name}' has non-numeric dtype {dtype}"
                )));
            }

            let cast = column.cast(&DataType::Float64)?;
            for (row, value) in cast.f64()?.into_iter().enumerate() {
                returns[[row, j]] = value.ok_or_else(|| DataError::MissingValue {
                    column: name.clone(),
                    row,
                })?;
            }
            symbols.push(name);
        }

        Self::new(symbols, returns)
    }

    /// Asset symbols in column order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Returns matrix (observations x assets)
    pub const fn returns(&self) -> &Array2<f64> {
        &self.returns
    }

    /// Number of assets (columns)
    pub fn n_assets(&self) -> usize {
        self.returns.ncols()
    }

    /// Number of observations (rows)
    pub fn n_observations(&self) -> usize {
        self.returns.nrows()
    }

    /// Split into symbols and matrix
    pub fn into_parts(self) -> (Vec<String>, Array2<f64>) {
        (self.symbols, self.returns)
    }
}

fn default_symbols(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("asset_{i}")).collect()
}

fn json_number(cell: &Value, column: &str, row: usize) -> Result<f64> {
    match cell {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DataError::Parse(format!("row {row}, column '{column}': {n}"))),
        Value::Null => Err(DataError::MissingValue {
            column: column.to_string(),
            row,
        }),
        other => Err(DataError::InvalidInputKind(format!(
            "row {row}, column '{column}' is {}, expected a number",
            json_kind(other)
        ))),
    }
}

pub(crate) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
