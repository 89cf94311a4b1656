//! Regression orchestration.
//!
//! Responsibilities:
//!
//! - derive the feature vocabulary from a record set
//! - build the design (`X`) and target (`y`) matrices
//! - solve the normal equations and name the coefficients

pub mod design;
pub mod solver;

pub use design::*;
pub use solver::*;
