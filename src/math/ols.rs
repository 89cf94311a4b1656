//! Ordinary least squares via the normal equations.
//!
//! We solve
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! as `β = (XᵀX)⁻¹ Xᵀy`.
//!
//! Implementation choices:
//! - The parameter dimension is one column per distinct property name plus the
//!   intercept, so `XᵀX` is small and an explicit inverse is cheap.
//! - The inverse is the Gauss-Jordan routine in [`crate::math::matrix`], which
//!   reports rank deficiency instead of returning garbage coefficients.
//! - Everything runs on the calling thread; there is no internal parallelism.

use crate::math::matrix::{Matrix, MatrixError};

/// Solve `(XᵀX)⁻¹ Xᵀy` and return the coefficient column vector.
///
/// `x` is `n x p`, `y` is `n x 1`; the result is `p x 1`.
pub fn solve_normal_equations(x: &Matrix, y: &Matrix, epsilon: f64) -> Result<Matrix, MatrixError> {
    let xt = x.transpose();
    let xtx = xt.multiply(x)?;
    let xty = xt.multiply(y)?;
    xtx.invert_with_epsilon(epsilon)?.multiply(&xty)
}
