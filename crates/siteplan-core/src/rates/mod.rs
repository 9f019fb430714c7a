//! Rate model: keyword to unit cost, daily output and unit label.
//!
//! The built-in table is defined in `rates.toml` and embedded in the binary
//! at compile time. A replacement table with the same shape can be loaded
//! from disk; it is validated up front so estimation itself never fails.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The embedded rate table TOML.
static RATES_TOML: &str = include_str!("rates.toml");

/// Upper bound for every rate, labor rate and daily output in a table.
///
/// Together with [`crate::estimate::MAX_QUANTITY`] this keeps every cost
/// product finite.
pub const MAX_RATE_VALUE: f64 = 1e9;

/// One row of the rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    /// Keyword matched against task descriptions (lower case).
    pub key: String,
    /// Material cost per unit.
    pub unit_cost: f64,
    /// Units a crew completes per day.
    pub daily_output: f64,
    /// Unit label (e.g. `cy`, `tons`).
    pub unit: String,
}

/// An ordered keyword table plus a fallback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateModel {
    /// Crew cost per working day.
    pub daily_labor_rate: f64,
    /// Keyword entries. Order defines the tie-break between keywords.
    pub rates: Vec<RateEntry>,
    /// Entry used when no keyword matches.
    pub fallback: RateEntry,
}

/// Errors from loading or validating a rate table.
#[derive(Debug, Error)]
pub enum RateModelError {
    #[error("failed to read rate table {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("rate table parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("rate entry {key:?} has non-positive daily_output {value}")]
    InvalidOutput { key: String, value: f64 },

    #[error("rate entry {key:?} has negative unit_cost {value}")]
    NegativeCost { key: String, value: f64 },

    #[error("daily_labor_rate must be non-negative, got {0}")]
    NegativeLaborRate(f64),

    #[error("{field} must be finite and at most {max}, got {value}")]
    OutOfRange {
        field: String,
        value: f64,
        max: f64,
    },

    #[error("rate entry key must not be empty")]
    EmptyKey,

    #[error("duplicate rate key: {0:?}")]
    DuplicateKey(String),
}

impl RateModel {
    /// The built-in rate table.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. This is a compile-time
    /// invariant -- if the binary was built, the table is valid.
    pub fn builtin() -> Self {
        Self::parse(RATES_TOML).expect("embedded rates.toml is invalid")
    }

    /// Parse and validate a rate table from TOML text.
    pub fn parse(content: &str) -> Result<Self, RateModelError> {
        let mut model: RateModel = toml::from_str(content)?;
        for entry in model.rates.iter_mut() {
            entry.key = entry.key.trim().to_lowercase();
        }
        model.validate()?;
        Ok(model)
    }

    /// Load and validate a rate table from a file.
    pub fn load(path: &Path) -> Result<Self, RateModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| RateModelError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<(), RateModelError> {
        if self.daily_labor_rate < 0.0 || self.daily_labor_rate.is_nan() {
            return Err(RateModelError::NegativeLaborRate(self.daily_labor_rate));
        }
        check_range("daily_labor_rate", self.daily_labor_rate)?;

        let mut seen = HashSet::new();
        for entry in self.rates.iter().chain(std::iter::once(&self.fallback)) {
            if entry.key.is_empty() {
                return Err(RateModelError::EmptyKey);
            }
            if !seen.insert(entry.key.as_str()) {
                return Err(RateModelError::DuplicateKey(entry.key.clone()));
            }
            // `!(x > 0)` also rejects NaN.
            if !(entry.daily_output > 0.0) {
                return Err(RateModelError::InvalidOutput {
                    key: entry.key.clone(),
                    value: entry.daily_output,
                });
            }
            if !(entry.unit_cost >= 0.0) {
                return Err(RateModelError::NegativeCost {
                    key: entry.key.clone(),
                    value: entry.unit_cost,
                });
            }
            check_range(&format!("{}.unit_cost", entry.key), entry.unit_cost)?;
            check_range(&format!("{}.daily_output", entry.key), entry.daily_output)?;
        }
        Ok(())
    }

    /// Return the first entry whose key occurs in `description_lower`, or
    /// the fallback entry.
    pub fn classify(&self, description_lower: &str) -> &RateEntry {
        self.rates
            .iter()
            .find(|e| description_lower.contains(e.key.as_str()))
            .unwrap_or(&self.fallback)
    }

    /// Keyword list in match order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rates.iter().map(|e| e.key.as_str())
    }
}

/// Reject infinite values and values above [`MAX_RATE_VALUE`].
fn check_range(field: &str, value: f64) -> Result<(), RateModelError> {
    if value.is_finite() && value <= MAX_RATE_VALUE {
        Ok(())
    } else {
        Err(RateModelError::OutOfRange {
            field: field.to_string(),
            value,
            max: MAX_RATE_VALUE,
        })
    }
}

impl Default for RateModel {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
