//! Record sources that live inside the crate.
//!
//! Real record sets come from outside (CSV ingest, scrapers); `sample` builds
//! reproducible synthetic ones for demos and tests.

pub mod sample;

pub use sample::*;
