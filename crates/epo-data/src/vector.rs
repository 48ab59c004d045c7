//! Signal and anchor vector adapters.

use crate::error::{DataError, Result};
use crate::returns::json_kind;
use ndarray::Array1;
use serde_json::Value;

/// Parse a comma- or whitespace-separated list of numbers.
///
/// # Errors
///
/// Returns `Parse` for an empty list or a token that is not a number.
pub fn parse_vector(input: &str) -> Result<Array1<f64>> {
    let values = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| DataError::Parse(format!("'{token}' is not a number")))
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.is_empty() {
        return Err(DataError::Parse("empty vector".to_string()));
    }

    Ok(Array1::from(values))
}

/// Flatten a JSON number or (nested) array of numbers into a vector.
///
/// # Errors
///
/// Returns `InvalidInputKind` if any leaf is not a number.
pub fn vector_from_json(value: &Value) -> Result<Array1<f64>> {
    let mut values = Vec::new();
    flatten_into(value, &mut values)?;
    Ok(Array1::from(values))
}

fn flatten_into(value: &Value, out: &mut Vec<f64>) -> Result<()> {
    match value {
        Value::Array(items) => items.iter().try_for_each(|item| flatten_into(item, out)),
        Value::Number(n) => {
            let v = n
                .as_f64()
                .ok_or_else(|| DataError::Parse(format!("{n} is not representable as f64")))?;
            out.push(v);
            Ok(())
        }
        other => Err(DataError::InvalidInputKind(format!(
            "expected numbers, got {}",
            json_kind(other)
        ))),
    }
}
