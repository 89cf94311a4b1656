//! Background pipelines shared by every front-end.
//!
//! - `evaluate_task`: records -> X -> y -> solve -> model
//! - `price_task`: current model + one record -> predicted price
//!
//! Both are [`AsyncTask`]s; the caller decides how to consume progress and
//! the outcome. Cancellation is checked only between the coarse phases of the
//! evaluation pipeline, never inside matrix arithmetic.

use std::sync::Arc;

use crate::domain::{EvalConfig, Record, RecordSet};
use crate::error::EvalError;
use crate::fit::{RegressionSolver, build_design_matrix, build_target_matrix};
use crate::models::{ModelHolder, PricingModel};
use crate::task::AsyncTask;

pub const EVALUATING_TASK_NAME: &str = "Evaluating service";
pub const PRICING_TASK_NAME: &str = "Evaluate custom record";

/// Fit a pricing model for `records` in the background.
pub fn evaluate_task(records: Arc<RecordSet>, config: &EvalConfig) -> AsyncTask<PricingModel, EvalError> {
    let solver = RegressionSolver::new(config.singularity_epsilon);

    AsyncTask::new(EVALUATING_TASK_NAME, move |ctx| {
        ctx.report_progress("Creating matrix x", 0);
        let (x, vocabulary) = build_design_matrix(&records)?;
        ctx.checkpoint()?;

        ctx.report_progress("Creating matrix y", 20);
        let y = build_target_matrix(&records)?;
        ctx.checkpoint()?;

        ctx.report_progress("Processing matrix", 40);
        let model = solver.solve(&x, &y, &vocabulary)?;
        ctx.checkpoint()?;

        ctx.report_progress("Done", 100);
        Ok(model)
    })
}

/// Price a single record with whatever model `holder` carries when the task runs.
pub fn price_task(holder: ModelHolder, record: Record) -> AsyncTask<f64, EvalError> {
    AsyncTask::new(PRICING_TASK_NAME, move |_ctx| Ok(holder.predict(&record)?))
}
