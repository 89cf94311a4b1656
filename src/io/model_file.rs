//! Read/write fitted model JSON files.
//!
//! The model file is the portable representation of a fit:
//! - the model itself (base term + named coefficients, in column order)
//! - when it was fitted and from how many records

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::PricingModel;

pub const TOOL_NAME: &str = "evaluator";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub fitted_at: DateTime<Utc>,
    pub n_records: usize,
    pub model: PricingModel,
}

impl ModelFile {
    pub fn new(model: PricingModel, n_records: usize) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            fitted_at: Utc::now(),
            n_records,
            model,
        }
    }
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, model_file: &ModelFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, model_file)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let model_file: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    Ok(model_file)
}
