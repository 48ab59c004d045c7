//! Allocation configuration.

use crate::error::EpoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Allocation formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Mean-variance with shrunk covariance: (1/λ) Σ̃⁻¹ s
    #[default]
    Simple,

    /// Anchored to a benchmark allocation
    Anchored {
        /// Derive the risk scale γ from signal and anchor risk instead of 1/λ
        endogenous: bool,
    },
}

impl Method {
    /// Resolve a method name, exactly `simple` or `anchored`.
    ///
    /// Names are case-sensitive and not trimmed. `endogenous` only applies
    /// to `anchored`.
    pub fn parse(name: &str, endogenous: bool) -> Result<Self, EpoError> {
        match name {
            "simple" => Ok(Self::Simple),
            "anchored" => Ok(Self::Anchored { endogenous }),
            _ => Err(EpoError::InvalidMethod(name.to_string())),
        }
    }

    /// Method name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Anchored { .. } => "anchored",
        }
    }

    /// Whether the method needs an anchor
    pub const fn is_anchored(&self) -> bool {
        matches!(self, Self::Anchored { .. })
    }

    /// Whether the formula divides by the risk aversion λ
    pub const fn uses_risk_aversion(&self) -> bool {
        !matches!(self, Self::Anchored { endogenous: true })
    }
}

impl FromStr for Method {
    type Err = EpoError;

    /// `anchored` parses as endogenous, matching the default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, true)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Anchored { endogenous: true } => write!(f, "anchored (endogenous)"),
            Self::Anchored { endogenous: false } => write!(f, "anchored (exogenous)"),
        }
    }
}

/// Allocation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Allocation formula (default: simple)
    pub method: Method,

    /// Shrinkage intensity w toward the identity correlation, in [0, 1] (default: 0)
    pub shrinkage: f64,

    /// Risk aversion λ (default: 1)
    /// Ignored by the endogenous anchored method
    pub risk_aversion: f64,

    /// Rescale weights to sum to one (default: true)
    pub normalize: bool,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            method: Method::Simple,
            shrinkage: 0.0,
            risk_aversion: 1.0,
            normalize: true,
        }
    }
}

impl AllocationConfig {
    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a shrinkage outside [0, 1] or a negative or
    /// non-finite λ; `ArithmeticDegenerate` for λ = 0 when the method divides
    /// by it.
    pub fn validate(&self) -> Result<(), EpoError> {
        if !self.shrinkage.is_finite() || !(0.0..=1.0).contains(&self.shrinkage) {
            return Err(EpoError::InvalidParameter(format!(
                "shrinkage must be between 0 and 1, got {}",
                self.shrinkage
            )));
        }

        if self.method.uses_risk_aversion() {
            if self.risk_aversion == 0.0 {
                return Err(EpoError::ArithmeticDegenerate(
                    "risk aversion of zero divides the signal by zero".to_string(),
                ));
            }
            if !self.risk_aversion.is_finite() || self.risk_aversion < 0.0 {
                return Err(EpoError::InvalidParameter(format!(
                    "risk aversion must be positive, got {}",
                    self.risk_aversion
                )));
            }
        }

        Ok(())
    }

    /// Load a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EpoError> {
        let content = std::fs::read_to_string(path).map_err(epo_data::DataError::from)?;
        let config: Self = serde_json::from_str(&content).map_err(epo_data::DataError::from)?;
        Ok(config)
    }
}
