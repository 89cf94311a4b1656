//! Shared domain types.
//!
//! Records are deliberately schema-free: each one declares whatever subset of
//! named numeric properties its source could extract. The regression layer
//! derives the column set from the records it is handed, not from a fixed
//! schema.

use std::path::PathBuf;

use crate::math::DEFAULT_SINGULARITY_EPSILON;

/// A labeled observation: declared numeric properties plus an observed price.
///
/// Property order is the order of declaration; re-declaring a name replaces the
/// value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    properties: Vec<(String, f64)>,
    price: f64,
}

impl Record {
    pub fn new<I, K>(name: impl Into<String>, properties: I, price: f64) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut record = Self {
            name: name.into(),
            properties: Vec::new(),
            price,
        };
        for (key, value) in properties {
            record.declare(key.into(), value);
        }
        record
    }

    /// A record with no observed price, e.g. the target of a single prediction.
    pub fn unpriced<I, K>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self::new(name, properties, 0.0)
    }

    fn declare(&mut self, key: String, value: f64) {
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((key, value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Property names in declaration order.
    pub fn declared_properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, value)` pairs in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, f64)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn property(&self, name: &str) -> Option<f64> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.property(name).is_some()
    }
}

/// Ordered collection of records. Insertion order fixes matrix row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Run configuration assembled by the CLI and passed explicitly to the pipeline.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Relative pivot threshold for the normal-equation inverse.
    pub singularity_epsilon: f64,
    /// Number of under/over-priced records to report on each side.
    pub top_n: usize,
    /// Optional path for the fitted model JSON.
    pub export_model: Option<PathBuf>,
    /// Optional path for the per-record appraisal CSV.
    pub export_appraisals: Option<PathBuf>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            singularity_epsilon: DEFAULT_SINGULARITY_EPSILON,
            top_n: 10,
            export_model: None,
            export_appraisals: None,
        }
    }
}
