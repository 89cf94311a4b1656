//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs logging
//! - parses CLI arguments into an explicit `EvalConfig`
//! - runs the evaluating/pricing tasks on worker threads
//! - prints reports and writes optional exports

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, DemoArgs, FitArgs, PriceArgs, SolveArgs};
use crate::domain::{EvalConfig, Record, RecordSet};
use crate::error::{AppError, EvalError};
use crate::math::DEFAULT_SINGULARITY_EPSILON;
use crate::models::{ModelHolder, PricingModel};
use crate::task::{TaskEvent, TaskHandle, TaskOutcome};

pub mod pipeline;

/// Environment variable holding the log filter (`tracing_subscriber` syntax).
pub const LOG_ENV: &str = "EVALUATOR_LOG";
/// Environment variable overriding the default singularity epsilon.
pub const EPSILON_ENV: &str = "EVALUATOR_EPSILON";

/// Entry point for the `evaluator` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Price(args) => handle_price(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // Logs go to stderr so stdout stays clean for reports.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = eval_config_from_args(&args.solve)?;
    let ingested = crate::io::ingest::load_records(&args.records)?;

    for err in &ingested.row_errors {
        warn!(line = err.line, name = ?err.name, message = %err.message, "row skipped");
    }
    if !ingested.row_errors.is_empty() {
        eprintln!(
            "Skipped {} of {} rows (set {LOG_ENV}=warn for details).",
            ingested.row_errors.len(),
            ingested.rows_read
        );
    }

    fit_and_report(Arc::new(ingested.records), &config)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = eval_config_from_args(&args.solve)?;
    let spec = crate::data::SampleSpec::used_cars(args.count, args.seed);
    let records = crate::data::generate_records(&spec)?;
    info!(count = records.len(), seed = args.seed, "generated synthetic records");

    fit_and_report(Arc::new(records), &config)
}

fn handle_price(args: PriceArgs) -> Result<(), AppError> {
    let model_file = crate::io::model_file::read_model_json(&args.model)?;
    let model = model_file.model;
    let record = Record::unpriced(args.name, args.properties);

    let unknown: Vec<&str> = record
        .declared_properties()
        .filter(|name| model.coefficient(name).is_none())
        .collect();
    if !unknown.is_empty() {
        eprintln!("Ignoring properties unknown to the model: {}", unknown.join(", "));
    }

    let holder = ModelHolder::with_model(model);
    let handle = pipeline::price_task(holder, record.clone()).spawn();
    let price = await_outcome(handle)?;
    println!("{}: {price:.2}", record.name());
    Ok(())
}

/// Fit on a worker, then print the model and rankings and write exports.
fn fit_and_report(records: Arc<RecordSet>, config: &EvalConfig) -> Result<(), AppError> {
    let handle = pipeline::evaluate_task(Arc::clone(&records), config).spawn();
    let model: PricingModel = await_outcome(handle)?;

    let appraisals = crate::report::appraise(&model, &records);
    let rmse = crate::report::rmse(&appraisals);
    println!(
        "{}",
        crate::report::format_model_summary(&model, records.len(), rmse)
    );

    let rankings = crate::report::rank_offers(&appraisals, config.top_n);
    println!("{}", crate::report::format_rankings(&rankings));

    if let Some(path) = &config.export_model {
        let model_file = crate::io::model_file::ModelFile::new(model.clone(), records.len());
        crate::io::model_file::write_model_json(path, &model_file)?;
        info!(path = %path.display(), "model exported");
    }
    if let Some(path) = &config.export_appraisals {
        crate::io::export::write_appraisals_csv(path, &appraisals)?;
        info!(path = %path.display(), "appraisals exported");
    }

    Ok(())
}

/// Stream progress to stderr until the task finishes, then map the outcome.
fn await_outcome<T>(handle: TaskHandle<T, EvalError>) -> Result<T, AppError> {
    while let Some(event) = handle.next_event() {
        match event {
            TaskEvent::Progress(p) => eprintln!("[{:>3}%] {}: {}", p.percent, handle.name(), p.message),
            TaskEvent::Finished(_) => break,
        }
    }

    match handle.join() {
        TaskOutcome::Completed(value) => Ok(value),
        TaskOutcome::Failed(err) => Err(err.into()),
        TaskOutcome::Aborted(reason) => Err(AppError::new(4, format!("Task aborted: {reason}"))),
        TaskOutcome::Cancelled => Err(AppError::new(5, "Task cancelled.")),
    }
}

pub fn eval_config_from_args(args: &SolveArgs) -> Result<EvalConfig, AppError> {
    Ok(EvalConfig {
        singularity_epsilon: resolve_epsilon(args.epsilon, std::env::var(EPSILON_ENV).ok().as_deref())?,
        top_n: args.top,
        export_model: args.export_model.clone(),
        export_appraisals: args.export.clone(),
    })
}

/// CLI flag wins over the environment, which wins over the default.
fn resolve_epsilon(flag: Option<f64>, env: Option<&str>) -> Result<f64, AppError> {
    let epsilon = match (flag, env) {
        (Some(value), _) => value,
        (None, Some(raw)) => raw
            .trim()
            .parse::<f64>()
            .map_err(|e| AppError::new(2, format!("Invalid {EPSILON_ENV} '{raw}': {e}")))?,
        (None, None) => DEFAULT_SINGULARITY_EPSILON,
    };
    if !(epsilon.is_finite() && epsilon >= 0.0) {
        return Err(AppError::new(2, format!("Epsilon must be a finite value >= 0, got {epsilon}.")));
    }
    Ok(epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_precedence() {
        assert_eq!(resolve_epsilon(Some(1e-6), Some("1e-3")).unwrap(), 1e-6);
        assert_eq!(resolve_epsilon(None, Some(" 1e-3 ")).unwrap(), 1e-3);
        assert_eq!(resolve_epsilon(None, None).unwrap(), DEFAULT_SINGULARITY_EPSILON);
    }

    #[test]
    fn epsilon_validation() {
        assert_eq!(resolve_epsilon(None, Some("tiny")).unwrap_err().exit_code(), 2);
        assert!(resolve_epsilon(Some(-1.0), None).is_err());
        assert!(resolve_epsilon(Some(f64::NAN), None).is_err());
    }

    #[test]
    fn outcome_mapping_preserves_exit_codes() {
        let empty = pipeline::evaluate_task(Arc::new(RecordSet::new()), &EvalConfig::default()).spawn();
        assert_eq!(await_outcome(empty).unwrap_err().exit_code(), 3);

        let single = Arc::new(RecordSet::from(vec![Record::new("a", [("x", 1.0)], 1.0)]));
        let underdetermined = pipeline::evaluate_task(single, &EvalConfig::default()).spawn();
        assert_eq!(await_outcome(underdetermined).unwrap_err().exit_code(), 4);
    }
}
