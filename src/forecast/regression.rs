//! Ordinary least squares linear regression.
//!
//! Solves the normal equations on centred data, so the intercept falls out of
//! the feature and label means: b = ȳ − x̄·β.

use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

/// Errors that can occur during linear regression
#[derive(Error, Debug)]
pub enum LinearRegressionError {
    #[error("Matrix is singular and cannot be factorised")]
    SingularMatrix,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("Model has not been fitted yet")]
    NotFitted,
}

/// Linear Regression model using Ordinary Least Squares
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
}

/// Jitter tries before giving up; each try multiplies the jitter by 100.
const MAX_JITTER_STEPS: usize = 8;

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), LinearRegressionError> {
        if x.nrows() != y.len() {
            return Err(LinearRegressionError::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(LinearRegressionError::EmptyTrainingSet);
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or(LinearRegressionError::EmptyTrainingSet)?;
        let y_mean = y.mean().ok_or(LinearRegressionError::EmptyTrainingSet)?;

        let xc = x - &x_mean;
        let yc = y - y_mean;

        let xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);

        let beta = solve_with_jitter(&xtx, &xty)?;
        let intercept = y_mean - x_mean.dot(&beta);

        self.coefficients = Some(beta);
        self.intercept = Some(intercept);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, LinearRegressionError> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or(LinearRegressionError::NotFitted)?;
        let intercept = self.intercept.ok_or(LinearRegressionError::NotFitted)?;

        if x.ncols() != coefficients.len() {
            return Err(LinearRegressionError::DimensionMismatch {
                expected: coefficients.len(),
                got: x.ncols(),
            });
        }

        Ok(x.dot(coefficients) + intercept)
    }

    /// Coefficient of determination of the predictions on `(x, y)`.
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64, LinearRegressionError> {
        let predictions = self.predict(x)?;
        Ok(r_squared(y, &predictions))
    }
}

/// R² = 1 − SS_res / SS_tot. A constant target scores 0.
pub fn r_squared(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let y_mean = y_true.mean().unwrap_or(0.0);

    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();

    let ss_tot: f64 = y_true.iter().map(|&t| (t - y_mean).powi(2)).sum();

    if ss_tot < 1e-10 {
        return 0.0;
    }

    1.0 - ss_res / ss_tot
}

/// Cholesky solve of `a · x = b`, adding a growing diagonal jitter when
/// collinear columns (Close vs Adj Close) make `a` semi-definite.
fn solve_with_jitter(
    a: &Array2<f64>,
    b: &Array1<f64>,
) -> Result<Array1<f64>, LinearRegressionError> {
    let n = a.nrows();
    if n == 0 {
        return Ok(Array1::zeros(0));
    }

    let diag_mean = a.diag().mean().unwrap_or(1.0).abs().max(1.0);
    let mut jitter = 1e-12 * diag_mean;

    for _ in 0..MAX_JITTER_STEPS {
        let mut reg = a.clone();
        for i in 0..n {
            reg[[i, i]] += jitter;
        }
        if let Some(x) = cholesky_solve(&reg, b) {
            return Ok(x);
        }
        jitter *= 100.0;
    }

    Err(LinearRegressionError::SingularMatrix)
}

fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    // A = L * L^T
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T * x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_recovers_noiseless_relation() {
        // y = 3 + 2*x1 - 0.5*x2
        let x = array![
            [1.0, 4.0],
            [2.0, 1.0],
            [3.0, 7.0],
            [4.0, 2.0],
            [5.0, 9.0],
            [6.0, 3.0],
        ];
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1).mapv(|v| -0.5 * v) + 3.0;

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-6);
        assert!((coef[1] + 0.5).abs() < 1e-6);
        assert!((model.intercept.unwrap() - 3.0).abs() < 1e-6);
        assert!((model.score(&x, &y).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_columns_still_fit() {
        let x = Array2::from_shape_fn((20, 2), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 4.0 * v + 1.0);

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let x = Array2::<f64>::zeros((3, 2));
        let y = Array1::<f64>::zeros(4);
        let mut model = LinearRegression::new();
        assert!(matches!(
            model.fit(&x, &y),
            Err(LinearRegressionError::DimensionMismatch { expected: 3, got: 4 })
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(
            model.predict(&Array2::zeros((1, 1))),
            Err(LinearRegressionError::NotFitted)
        ));
    }

    #[test]
    fn test_r_squared_edge_cases() {
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(r_squared(&y, &y), 1.0);
        // predicting the mean explains nothing
        assert!(r_squared(&y, &array![2.0, 2.0, 2.0]).abs() < 1e-12);
        // worse than the mean goes negative
        assert!(r_squared(&y, &array![3.0, 2.0, 1.0]) < 0.0);
        // constant target
        assert_eq!(r_squared(&array![5.0, 5.0], &array![4.0, 6.0]), 0.0);
    }
}
