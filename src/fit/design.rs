//! Design and target matrix construction.
//!
//! Column layout of the design matrix `X`:
//!
//! ```text
//! | 1.0 | vocabulary[0] | vocabulary[1] | ... |
//! ```
//!
//! A record that does not declare a vocabulary property contributes `0.0` in
//! that column. Row `i` always corresponds to the `i`-th record of the set.

use crate::domain::{Record, RecordSet};
use crate::error::EvalError;
use crate::math::Matrix;

/// Deduplicated property names in first-seen order across a record set.
///
/// Computed per solve and handed to the solver explicitly so coefficient
/// names line up with design-matrix columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureVocabulary {
    names: Vec<String>,
}

impl FeatureVocabulary {
    pub fn from_records(records: &RecordSet) -> Self {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            for name in record.declared_properties() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureVocabulary {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in iter {
            let name = name.into();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self { names }
    }
}

/// Build `X` (`n x (1 + |vocabulary|)`) and return it with the vocabulary.
pub fn build_design_matrix(records: &RecordSet) -> Result<(Matrix, FeatureVocabulary), EvalError> {
    if records.is_empty() {
        return Err(EvalError::EmptyInput);
    }

    let vocabulary = FeatureVocabulary::from_records(records);
    let mut x = Matrix::new(records.len(), 1 + vocabulary.len())?;
    for (i, record) in records.iter().enumerate() {
        fill_design_row(&mut x, i, record, &vocabulary)?;
    }
    Ok((x, vocabulary))
}

/// Build `y` (`n x 1`) holding observed prices in record order.
pub fn build_target_matrix(records: &RecordSet) -> Result<Matrix, EvalError> {
    if records.is_empty() {
        return Err(EvalError::EmptyInput);
    }

    let mut y = Matrix::new(records.len(), 1)?;
    for (i, record) in records.iter().enumerate() {
        y.set(i, 0, record.price())?;
    }
    Ok(y)
}

fn fill_design_row(
    x: &mut Matrix,
    row: usize,
    record: &Record,
    vocabulary: &FeatureVocabulary,
) -> Result<(), EvalError> {
    x.set(row, 0, 1.0)?;
    for (k, name) in vocabulary.iter().enumerate() {
        x.set(row, k + 1, record.property(name).unwrap_or(0.0))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordSet {
        RecordSet::from(vec![
            Record::new("a", [("km", 100.0), ("year", 2005.0)], 5000.0),
            Record::new("b", [("year", 2010.0), ("doors", 4.0)], 9000.0),
            Record::new("c", [("km", 50.0)], 7000.0),
        ])
    }

    #[test]
    fn vocabulary_is_first_seen_union() {
        let vocab = FeatureVocabulary::from_records(&sample());
        assert_eq!(vocab.names(), &["km", "year", "doors"]);
    }

    #[test]
    fn design_matrix_has_bias_and_zero_fill() {
        let (x, vocab) = build_design_matrix(&sample()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!((x.rows(), x.cols()), (3, 4));

        let rows: Vec<Vec<f64>> = (0..3)
            .map(|r| (0..4).map(|c| x.get(r, c).unwrap()).collect())
            .collect();
        assert_eq!(rows[0], vec![1.0, 100.0, 2005.0, 0.0]);
        assert_eq!(rows[1], vec![1.0, 0.0, 2010.0, 4.0]);
        assert_eq!(rows[2], vec![1.0, 50.0, 0.0, 0.0]);
    }

    #[test]
    fn records_without_properties_give_bias_only_design() {
        let records = RecordSet::from(vec![Record::new("bare", Vec::<(String, f64)>::new(), 3.0)]);
        let (x, vocab) = build_design_matrix(&records).unwrap();
        assert!(vocab.is_empty());
        assert_eq!((x.rows(), x.cols()), (1, 1));
        assert_eq!(x.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn target_matrix_follows_record_order() {
        let y = build_target_matrix(&sample()).unwrap();
        assert_eq!(y.column(0).unwrap(), vec![5000.0, 9000.0, 7000.0]);
    }

    #[test]
    fn empty_input_is_rejected() {
        let empty = RecordSet::new();
        assert_eq!(build_design_matrix(&empty).unwrap_err(), EvalError::EmptyInput);
        assert_eq!(build_target_matrix(&empty).unwrap_err(), EvalError::EmptyInput);
    }
}
