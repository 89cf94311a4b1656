//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observed records and record collections (`Record`, `RecordSet`)
//! - the explicit run configuration passed to the pipeline (`EvalConfig`)

pub mod types;

pub use types::*;
