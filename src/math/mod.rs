//! Numeric core: dense matrices and the normal-equation least squares solve.

pub mod matrix;
pub mod ols;

pub use matrix::*;
pub use ols::*;
