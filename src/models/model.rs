//! Linear pricing model evaluation.
//!
//! A model is a base term plus one coefficient per known property name:
//!
//! ```text
//! price = base + Σ coefficient[name] * record[name]
//! ```
//!
//! The sum runs over names the record declares *and* the model knows. Unknown
//! properties are ignored, and known properties the record does not declare
//! contribute nothing (the same zero-fill the design matrix uses).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{Record, RecordSet};

/// Display/export name of the bias term.
pub const BASE_KEY: &str = "base";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingModel {
    base: f64,
    coefficients: Vec<Coefficient>,
}

impl PricingModel {
    pub fn new<I, K>(base: f64, coefficients: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let coefficients = coefficients
            .into_iter()
            .map(|(name, value)| Coefficient {
                name: name.into(),
                value,
            })
            .collect();
        Self { base, coefficients }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }

    /// Coefficients in vocabulary order (base excluded).
    pub fn coefficients(&self) -> &[Coefficient] {
        &self.coefficients
    }

    pub fn known_names(&self) -> impl Iterator<Item = &str> {
        self.coefficients.iter().map(|c| c.name.as_str())
    }

    /// Predicted price for `record`.
    pub fn predict(&self, record: &Record) -> f64 {
        record
            .properties()
            .filter_map(|(name, value)| self.coefficient(name).map(|coef| coef * value))
            .fold(self.base, |acc, term| acc + term)
    }

    /// Predictions for every record, in record order.
    pub fn predict_all(&self, records: &RecordSet) -> Vec<f64> {
        records.as_slice().par_iter().map(|r| self.predict(r)).collect()
    }
}
