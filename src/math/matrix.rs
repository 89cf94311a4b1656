//! Dense matrix with bounds-checked access and the handful of operations the
//! normal-equation solver needs: transpose, multiply and invert.
//!
//! Storage is a `nalgebra::DMatrix<f64>`. The wrapper exists to give every
//! operation a checked, `Result`-returning contract (nalgebra panics on shape
//! errors) and to own the inversion routine, whose singularity threshold has
//! to be explicit and tunable.

use nalgebra::DMatrix;
use thiserror::Error;
use tracing::debug;

/// Relative pivot threshold used by [`Matrix::invert`].
///
/// The matrix is equilibrated first (every row, then every column, scaled so
/// its largest magnitude is 1). During Gauss-Jordan elimination of the
/// equilibrated matrix a pivot is accepted only if
/// `|pivot| > epsilon * max|b_ij|`. Equilibrating keeps the test independent of
/// column units, so a mileage column next to a 0/1 flag is not mistaken for
/// rank deficiency.
pub const DEFAULT_SINGULARITY_EPSILON: f64 = 1e-12;

/// Matrix-layer failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatrixError {
    #[error("invalid matrix shape {rows}x{cols}: both dimensions must be >= 1")]
    InvalidShape { rows: usize, cols: usize },

    #[error("{rows}x{cols} matrix needs {expected} values, got {actual}")]
    LengthMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },

    #[error("index ({row}, {col}) out of range for {rows}x{cols} matrix")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("dimension mismatch: cannot multiply {left_rows}x{left_cols} by {right_rows}x{right_cols}")]
    DimensionMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("matrix is not square ({rows}x{cols})")]
    NotSquare { rows: usize, cols: usize },

    /// No acceptable pivot was found while eliminating `column`.
    #[error("matrix is singular (no pivot above threshold in column {column})")]
    SingularMatrix { column: usize },
}

/// A `rows x cols` grid of `f64`, zero-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: DMatrix<f64>,
}

impl Matrix {
    /// Allocate a zero-filled matrix.
    pub fn new(rows: usize, cols: usize) -> Result<Self, MatrixError> {
        if rows == 0 || cols == 0 {
            return Err(MatrixError::InvalidShape { rows, cols });
        }
        Ok(Self {
            data: DMatrix::zeros(rows, cols),
        })
    }

    /// Build a matrix from row-major values.
    pub fn from_row_slice(rows: usize, cols: usize, values: &[f64]) -> Result<Self, MatrixError> {
        if rows == 0 || cols == 0 {
            return Err(MatrixError::InvalidShape { rows, cols });
        }
        if values.len() != rows * cols {
            return Err(MatrixError::LengthMismatch {
                rows,
                cols,
                expected: rows * cols,
                actual: values.len(),
            });
        }
        Ok(Self {
            data: DMatrix::from_row_slice(rows, cols, values),
        })
    }

    /// `n x n` identity.
    pub fn identity(n: usize) -> Result<Self, MatrixError> {
        if n == 0 {
            return Err(MatrixError::InvalidShape { rows: n, cols: n });
        }
        Ok(Self {
            data: DMatrix::identity(n, n),
        })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_square(&self) -> bool {
        self.rows() == self.cols()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64, MatrixError> {
        self.check_index(row, col)?;
        Ok(self.data[(row, col)])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), MatrixError> {
        self.check_index(row, col)?;
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Return a new `cols x rows` matrix with `result[j][i] = self[i][j]`.
    pub fn transpose(&self) -> Matrix {
        Matrix {
            data: self.data.transpose(),
        }
    }

    /// Matrix product `self * other`.
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        if self.cols() != other.rows() {
            return Err(MatrixError::DimensionMismatch {
                left_rows: self.rows(),
                left_cols: self.cols(),
                right_rows: other.rows(),
                right_cols: other.cols(),
            });
        }
        Ok(Matrix {
            data: &self.data * &other.data,
        })
    }

    /// Inverse using [`DEFAULT_SINGULARITY_EPSILON`].
    pub fn invert(&self) -> Result<Matrix, MatrixError> {
        self.invert_with_epsilon(DEFAULT_SINGULARITY_EPSILON)
    }

    /// Gauss-Jordan inverse with partial pivoting on the equilibrated matrix.
    ///
    /// With `B = R·A·C` (`R`, `C` diagonal row and column scales), `B` is
    /// augmented with the identity and reduced column by column. For each
    /// column the row with the largest absolute value at or below the diagonal
    /// is swapped into place; if that value does not exceed
    /// `epsilon * max|b_ij|` the matrix is reported as singular. The result is
    /// unscaled as `A⁻¹ = C·B⁻¹·R`.
    pub fn invert_with_epsilon(&self, epsilon: f64) -> Result<Matrix, MatrixError> {
        if !self.is_square() {
            return Err(MatrixError::NotSquare {
                rows: self.rows(),
                cols: self.cols(),
            });
        }

        let n = self.rows();
        let mut work = self.data.clone();

        // Zero rows and columns keep scale 1 and fail at elimination.
        let row_scale: Vec<f64> = (0..n).map(|r| reciprocal_of_max(work.row(r).iter())).collect();
        for r in 0..n {
            for c in 0..n {
                work[(r, c)] *= row_scale[r];
            }
        }
        let col_scale: Vec<f64> = (0..n).map(|c| reciprocal_of_max(work.column(c).iter())).collect();
        for c in 0..n {
            for r in 0..n {
                work[(r, c)] *= col_scale[c];
            }
        }

        let scale = work.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let threshold = epsilon.abs() * scale;
        let mut inv = DMatrix::<f64>::identity(n, n);

        for col in 0..n {
            // Partial pivoting: pick the largest magnitude in this column.
            let mut pivot_row = col;
            let mut pivot_abs = work[(col, col)].abs();
            for r in (col + 1)..n {
                let candidate = work[(r, col)].abs();
                if candidate > pivot_abs {
                    pivot_row = r;
                    pivot_abs = candidate;
                }
            }

            if !pivot_abs.is_finite() || pivot_abs <= threshold {
                debug!(column = col, pivot = pivot_abs, threshold, "singular matrix");
                return Err(MatrixError::SingularMatrix { column: col });
            }

            if pivot_row != col {
                work.swap_rows(pivot_row, col);
                inv.swap_rows(pivot_row, col);
            }

            let pivot = work[(col, col)];
            for c in 0..n {
                work[(col, c)] /= pivot;
                inv[(col, c)] /= pivot;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = work[(r, col)];
                if factor == 0.0 {
                    continue;
                }
                for c in 0..n {
                    work[(r, c)] -= factor * work[(col, c)];
                    inv[(r, c)] -= factor * inv[(col, c)];
                }
            }
        }

        for r in 0..n {
            for c in 0..n {
                inv[(r, c)] *= col_scale[r] * row_scale[c];
            }
        }

        Ok(Matrix { data: inv })
    }

    /// Column `col` as a vector.
    pub fn column(&self, col: usize) -> Result<Vec<f64>, MatrixError> {
        self.check_index(0, col)?;
        Ok(self.data.column(col).iter().copied().collect())
    }

    /// Borrow the underlying nalgebra storage.
    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    fn check_index(&self, row: usize, col: usize) -> Result<(), MatrixError> {
        if row >= self.rows() || col >= self.cols() {
            return Err(MatrixError::IndexOutOfRange {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }
}

fn reciprocal_of_max<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let max = values.fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if max > 0.0 && max.is_finite() { 1.0 / max } else { 1.0 }
}

impl From<DMatrix<f64>> for Matrix {
    fn from(data: DMatrix<f64>) -> Self {
        Self { data }
    }
}
