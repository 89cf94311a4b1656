//! `price-evaluator` library crate.
//!
//! Fits a linear pricing model to records that each declare their own subset
//! of named numeric properties, and prices new records with it. Long-running
//! work is wrapped in single-shot background tasks with progress reporting.
//!
//! The binary (`evaluator`) is a thin wrapper around this library so that
//! core logic is testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod task;
