//! Command-line parsing for the record price evaluator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the regression/task code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "evaluator", version, about = "Linear price evaluator for heterogeneous records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a pricing model to a CSV of records and rank under/over-priced ones.
    Fit(FitArgs),
    /// Price a single record with a previously exported model.
    Price(PriceArgs),
    /// Fit a synthetic record set (no input file needed).
    Demo(DemoArgs),
}

/// Options shared by commands that fit a model.
#[derive(Debug, Parser, Clone)]
pub struct SolveArgs {
    /// Relative singularity threshold for the matrix inverse
    /// (falls back to EVALUATOR_EPSILON, then the built-in default).
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Show top-N under- and over-priced records.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export the fitted model to JSON.
    #[arg(long = "export-model", value_name = "JSON")]
    pub export_model: Option<PathBuf>,

    /// Export per-record appraisals to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Records CSV: `name`, `price`, then one column per property.
    #[arg(long, value_name = "CSV")]
    pub records: PathBuf,

    #[command(flatten)]
    pub solve: SolveArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct PriceArgs {
    /// Model JSON produced by `evaluator fit --export-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Property of the record to price, as NAME=VALUE (repeatable).
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, f64)>,

    /// Label for the priced record.
    #[arg(long, default_value = "custom")]
    pub name: String,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Number of synthetic records to generate.
    #[arg(short = 'n', long, default_value_t = 200)]
    pub count: usize,

    /// Random seed for record generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[command(flatten)]
    pub solve: SolveArgs,
}

fn parse_property(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty property name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for '{name}': {e}"))?;
    if !value.is_finite() {
        return Err(format!("value for '{name}' must be finite"));
    }
    // Property names are stored lowercased, matching CSV ingest.
    Ok((name.to_ascii_lowercase(), value))
}
