//! Normal-equation regression over a design matrix.
//!
//! Given `X`, `y` and the vocabulary that named the columns of `X`, we solve
//! `A = (XᵀX)⁻¹ Xᵀy` and map the result onto a [`PricingModel`]:
//! row 0 is the base term, row `1 + k` is the coefficient of `vocabulary[k]`.

use tracing::{debug, info};

use crate::domain::RecordSet;
use crate::error::EvalError;
use crate::fit::design::{FeatureVocabulary, build_design_matrix, build_target_matrix};
use crate::math::{DEFAULT_SINGULARITY_EPSILON, Matrix, MatrixError, solve_normal_equations};
use crate::models::PricingModel;

/// OLS solver with an explicit singularity threshold.
#[derive(Debug, Clone, Copy)]
pub struct RegressionSolver {
    epsilon: f64,
}

impl Default for RegressionSolver {
    fn default() -> Self {
        Self::new(DEFAULT_SINGULARITY_EPSILON)
    }
}

impl RegressionSolver {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Solve for coefficients and name them after `vocabulary`.
    ///
    /// A singular `XᵀX` is reported as [`EvalError::UnderdeterminedModel`];
    /// every other matrix failure is passed through as [`EvalError::Matrix`].
    pub fn solve(&self, x: &Matrix, y: &Matrix, vocabulary: &FeatureVocabulary) -> Result<PricingModel, EvalError> {
        let expected_cols = 1 + vocabulary.len();
        if x.cols() != expected_cols {
            return Err(MatrixError::DimensionMismatch {
                left_rows: x.rows(),
                left_cols: x.cols(),
                right_rows: expected_cols,
                right_cols: 1,
            }
            .into());
        }

        debug!(records = x.rows(), features = vocabulary.len(), "solving normal equations");
        let a = solve_normal_equations(x, y, self.epsilon).map_err(|err| match err {
            MatrixError::SingularMatrix { .. } => EvalError::UnderdeterminedModel {
                records: x.rows(),
                features: vocabulary.len(),
            },
            other => EvalError::Matrix(other),
        })?;

        let base = a.get(0, 0)?;
        let mut coefficients = Vec::with_capacity(vocabulary.len());
        for (k, name) in vocabulary.iter().enumerate() {
            coefficients.push((name.to_string(), a.get(k + 1, 0)?));
        }

        info!(records = x.rows(), features = vocabulary.len(), base, "regression solved");
        Ok(PricingModel::new(base, coefficients))
    }

    /// Build `X`, `y` and the vocabulary from `records`, then [`solve`](Self::solve).
    pub fn fit(&self, records: &RecordSet) -> Result<PricingModel, EvalError> {
        let (x, vocabulary) = build_design_matrix(records)?;
        let y = build_target_matrix(records)?;
        self.solve(&x, &y, &vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Record;

    fn linear_records() -> RecordSet {
        RecordSet::from(vec![
            Record::new("r1", [("x", 1.0)], 10.0),
            Record::new("r2", [("x", 2.0)], 20.0),
            Record::new("r3", [("x", 3.0)], 30.0),
        ])
    }

    #[test]
    fn recovers_exact_linear_relation() {
        let model = RegressionSolver::default().fit(&linear_records()).unwrap();
        assert!(model.base().abs() < 1e-9);
        assert!((model.coefficient("x").unwrap() - 10.0).abs() < 1e-9);

        let target = Record::unpriced("r4", [("x", 4.0)]);
        assert!((model.predict(&target) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn recovers_two_features_with_partial_declarations() {
        // price = 100 + 5a - 2b, with b missing (treated as 0) on some rows.
        let records = RecordSet::from(vec![
            Record::new("1", [("a", 1.0), ("b", 1.0)], 103.0),
            Record::new("2", [("a", 2.0)], 110.0),
            Record::new("3", [("b", 4.0)], 92.0),
            Record::new("4", [("a", 3.0), ("b", 2.0)], 111.0),
            Record::new("5", [("a", 0.5), ("b", 3.0)], 96.5),
        ]);
        let model = RegressionSolver::default().fit(&records).unwrap();
        assert!((model.base() - 100.0).abs() < 1e-8);
        assert!((model.coefficient("a").unwrap() - 5.0).abs() < 1e-8);
        assert!((model.coefficient("b").unwrap() + 2.0).abs() < 1e-8);
        let names: Vec<&str> = model.known_names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn rare_flag_next_to_mileage_scale_columns_is_solvable() {
        let mut spec = crate::data::SampleSpec::used_cars(200, 42);
        spec.noise_sigma = 0.0;
        let generated = crate::data::generate_records(&spec).unwrap();

        // A 0/1 "turbo" flag worth 1500, declared on only 3 records.
        let records: RecordSet = generated
            .iter()
            .enumerate()
            .map(|(i, r)| {
                if matches!(i, 5 | 77 | 150) {
                    let props = r.properties().chain([("turbo", 1.0)]);
                    Record::new(r.name(), props, r.price() + 1_500.0)
                } else {
                    r.clone()
                }
            })
            .collect();

        let model = RegressionSolver::default().fit(&records).unwrap();
        assert!((model.coefficient("turbo").unwrap() - 1_500.0).abs() < 1e-3);
        assert!((model.coefficient("km").unwrap() + 0.015).abs() < 1e-9);
        assert!((model.base() - 15_000.0).abs() < 1e-3);
    }

    #[test]
    fn too_few_records_is_underdetermined() {
        let records = RecordSet::from(vec![
            Record::new("1", [("x", 1.0), ("z", 1.0)], 5.0),
            Record::new("2", [("x", 2.0), ("z", 2.0)], 7.0),
        ]);
        assert_eq!(
            RegressionSolver::default().fit(&records).unwrap_err(),
            EvalError::UnderdeterminedModel { records: 2, features: 2 }
        );
    }

    #[test]
    fn constant_feature_is_collinear_with_bias() {
        let records = RecordSet::from(vec![
            Record::new("1", [("wheels", 4.0), ("x", 1.0)], 1.0),
            Record::new("2", [("wheels", 4.0), ("x", 2.0)], 2.0),
            Record::new("3", [("wheels", 4.0), ("x", 3.0)], 3.0),
            Record::new("4", [("wheels", 4.0), ("x", 5.0)], 5.0),
        ]);
        assert!(matches!(
            RegressionSolver::default().fit(&records),
            Err(EvalError::UnderdeterminedModel { .. })
        ));
    }

    #[test]
    fn vocabulary_mismatch_is_a_dimension_error() {
        let x = Matrix::from_row_slice(3, 2, &[1.0, 1.0, 1.0, 2.0, 1.0, 3.0]).unwrap();
        let y = Matrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]).unwrap();
        let vocab: FeatureVocabulary = ["x", "z"].into_iter().collect();
        assert!(matches!(
            RegressionSolver::default().solve(&x, &y, &vocab),
            Err(EvalError::Matrix(MatrixError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn target_row_mismatch_propagates() {
        let x = Matrix::from_row_slice(3, 2, &[1.0, 1.0, 1.0, 2.0, 1.0, 3.0]).unwrap();
        let y = Matrix::from_row_slice(2, 1, &[1.0, 2.0]).unwrap();
        let vocab: FeatureVocabulary = ["x"].into_iter().collect();
        assert!(matches!(
            RegressionSolver::default().solve(&x, &y, &vocab),
            Err(EvalError::Matrix(MatrixError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn empty_record_set_is_empty_input() {
        assert_eq!(
            RegressionSolver::default().fit(&RecordSet::new()).unwrap_err(),
            EvalError::EmptyInput
        );
    }
}
