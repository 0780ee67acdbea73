use anyhow::{anyhow, Result};
use faer::{prelude::*, solvers::PartialPivLu, Mat};

/// Pivot magnitude under which a system is treated as singular.
pub const SINGULAR_PIVOT: f64 = 1e-12;

/// Trait for solving dense linear systems (Ax = b).
///
/// Power-flow engines use it for the reduced susceptance system of each island.
/// A singular matrix must be reported as an error, never as a non-finite solution.
pub trait LinearSystemBackend: Send + Sync {
    /// Solve the linear system Ax = b
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>>;

    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;
}

fn check_shape(matrix: &[Vec<f64>], rhs: &[f64]) -> Result<usize> {
    let n = matrix.len();
    if rhs.len() != n {
        return Err(anyhow!(
            "rhs length ({}) does not match matrix dimension {}",
            rhs.len(),
            n
        ));
    }
    if matrix.iter().any(|row| row.len() != n) {
        return Err(anyhow!("matrix must be square"));
    }
    Ok(n)
}

/// Gauss-Jordan elimination with partial pivoting.
#[derive(Debug, Clone, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = check_shape(matrix, rhs)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut a = matrix.to_vec();
        let mut b = rhs.to_vec();

        for i in 0..n {
            let mut pivot = i;
            for row in i + 1..n {
                if a[row][i].abs() > a[pivot][i].abs() {
                    pivot = row;
                }
            }
            if pivot != i {
                a.swap(i, pivot);
                b.swap(i, pivot);
            }

            let diag = a[i][i];
            if diag.abs() < SINGULAR_PIVOT {
                return Err(anyhow!("singular matrix"));
            }

            for value in a[i][i..].iter_mut() {
                *value /= diag;
            }
            b[i] /= diag;

            let pivot_segment = a[i][i..].to_vec();
            for row in 0..n {
                if row == i {
                    continue;
                }
                let factor = a[row][i];
                for (target, &pivot) in a[row][i..].iter_mut().zip(pivot_segment.iter()) {
                    *target -= factor * pivot;
                }
                b[row] -= factor * b[i];
            }
        }

        Ok(b)
    }

    fn name(&self) -> &'static str {
        "gauss"
    }
}

/// LU with partial pivoting from `faer`.
///
/// faer does not fail on singular input; a non-finite solution or a residual
/// that does not close is mapped to the same "singular matrix" error as Gauss.
#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = check_shape(matrix, rhs)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let rhs_mat = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        let mut solution = Vec::with_capacity(n);
        for i in 0..n {
            let value = sol.read(i, 0);
            if !value.is_finite() {
                return Err(anyhow!("singular matrix"));
            }
            solution.push(value);
        }

        let scale = rhs.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
        for (row, b) in matrix.iter().zip(rhs) {
            let ax: f64 = row.iter().zip(&solution).map(|(a, x)| a * x).sum();
            if (ax - b).abs() > 1e-6 * scale {
                return Err(anyhow!("singular matrix"));
            }
        }
        Ok(solution)
    }

    fn name(&self) -> &'static str {
        "faer"
    }
}
