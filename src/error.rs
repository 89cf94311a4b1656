use thiserror::Error;

use crate::math::MatrixError;

/// Failures of the evaluation pipeline (feature extraction, solve, prediction).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("nothing to evaluate: the record set is empty")]
    EmptyInput,

    /// `XᵀX` could not be inverted: too few records for the number of distinct
    /// features, or collinear features.
    #[error("underdetermined model: {records} record(s) for {features} feature(s) plus bias, or collinear features")]
    UnderdeterminedModel { records: usize, features: usize },

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error("no model available for evaluation")]
    ModelUnavailable,
}

/// Application-level error carrying the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<EvalError> for AppError {
    fn from(err: EvalError) -> Self {
        let exit_code = match err {
            EvalError::EmptyInput => 3,
            EvalError::ModelUnavailable => 2,
            EvalError::UnderdeterminedModel { .. } | EvalError::Matrix(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
