//! Dense penalized least squares for the small designs the backends build.

use crate::errors::{ForecastError, Result};

const PIVOT_EPSILON: f64 = 1e-12;

/// Minimizes `|X·β - y|² + Σ penalties[j]·β[j]²` through the normal equations.
///
/// `design` is row-major with one row per observation; every row must have
/// `penalties.len()` columns.
pub(crate) fn ridge(design: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    let columns = penalties.len();
    if design.len() != y.len() {
        return Err(ForecastError::NumericalError(format!(
            "design has {} rows but {} targets",
            design.len(),
            y.len()
        )));
    }
    if let Some(row) = design.iter().find(|row| row.len() != columns) {
        return Err(ForecastError::NumericalError(format!(
            "design row has {} columns, expected {}",
            row.len(),
            columns
        )));
    }

    let mut gram = vec![vec![0.0; columns]; columns];
    let mut rhs = vec![0.0; columns];
    for (row, target) in design.iter().zip(y) {
        for i in 0..columns {
            rhs[i] += row[i] * target;
            for j in i..columns {
                gram[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..columns {
        for j in 0..i {
            gram[i][j] = gram[j][i];
        }
        gram[i][i] += penalties[i];
    }
    solve(gram, rhs)
}

/// Gaussian elimination with partial pivoting.
pub(crate) fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&left, &right| a[left][col].abs().total_cmp(&a[right][col].abs()))
            .unwrap_or(col);
        if !a[pivot][col].is_finite() || a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(ForecastError::NumericalError(
                "singular system in least squares fit".into(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        let pivot_rhs = b[col];
        for row in col + 1..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * pivot_row[k];
            }
            b[row] -= factor * pivot_rhs;
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    if x.iter().any(|value| !value.is_finite()) {
        return Err(ForecastError::NumericalError(
            "least squares fit produced non-finite coefficients".into(),
        ));
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_with_row_swaps() {
        let a = vec![vec![0.0, 2.0], vec![3.0, 1.0]];
        let x = solve(a, vec![4.0, 5.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn singular_system_is_reported() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(matches!(
            solve(a, vec![1.0, 2.0]),
            Err(ForecastError::NumericalError(_))
        ));
    }

    #[test]
    fn unpenalized_ridge_recovers_exact_line() {
        let design: Vec<Vec<f64>> = (0..5).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..5).map(|i| 3.0 + 2.0 * i as f64).collect();
        let beta = ridge(&design, &y, &[0.0, 0.0]).unwrap();
        assert!((beta[0] - 3.0).abs() < 1e-9);
        assert!((beta[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn penalty_shrinks_coefficients() {
        let design: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..5).map(|i| 2.0 * i as f64).collect();
        let free = ridge(&design, &y, &[0.0]).unwrap();
        let shrunk = ridge(&design, &y, &[100.0]).unwrap();
        assert!(shrunk[0] < free[0]);
        assert!(shrunk[0] > 0.0);
    }
}
