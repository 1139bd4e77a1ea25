//! Ordinary least squares with an intercept, plus JSON persistence.

use crate::{
    error::{TwinError, TwinResult},
    metrics::rmse,
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Singular values below this fraction of the largest count as zero.
const SINGULAR_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearRegression {
    pub features:      Vec<String>,
    pub coefficients:  Vec<f64>,
    pub intercept:     f64,
    pub training_rows: usize,
    pub training_rmse: f64,
}

impl LinearRegression {
    /// Fit `y ≈ intercept + x · coefficients`.
    ///
    /// Features and target are centered, the slope is the SVD least-squares
    /// solution and the intercept follows from the means. Deterministic for
    /// identical input.
    pub fn fit(features: Vec<String>, x: &[Vec<f64>], y: &[f64]) -> TwinResult<Self> {
        let n = x.len();
        let p = features.len();
        if n != y.len() {
            return Err(TwinError::insufficient(format!(
                "{n} feature rows but {} targets",
                y.len()
            )));
        }
        if n <= p {
            return Err(TwinError::insufficient(format!(
                "{n} rows cannot fit {p} coefficients plus an intercept"
            )));
        }

        let x_mean: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n as f64;

        let coefficients = if p == 0 {
            Vec::new()
        } else {
            let design = DMatrix::from_fn(n, p, |i, j| x[i][j] - x_mean[j]);
            let target = DVector::from_iterator(n, y.iter().map(|v| v - y_mean));
            least_squares(design, &target)
                .ok_or_else(|| TwinError::SingularDesign { features: features.clone() })?
        };
        let intercept = y_mean
            - coefficients.iter().zip(&x_mean).map(|(b, m)| b * m).sum::<f64>();

        let mut model = Self {
            features,
            coefficients,
            intercept,
            training_rows: n,
            training_rmse: 0.0,
        };
        let fitted = model.predict(x);
        model.training_rmse = rmse(y, &fitted);
        Ok(model)
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self.coefficients.iter().zip(row).map(|(b, v)| b * v).sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn save(&self, path: &Path) -> TwinResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> TwinResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        if model.coefficients.len() != model.features.len() {
            return Err(TwinError::insufficient(format!(
                "model file has {} coefficients for {} features",
                model.coefficients.len(),
                model.features.len()
            )));
        }
        Ok(model)
    }
}

/// Least-squares solution of `design · b ≈ target` via SVD.
/// None when the design is rank deficient.
fn least_squares(design: DMatrix<f64>, target: &DVector<f64>) -> Option<Vec<f64>> {
    let p = design.ncols();
    let svd = design.svd(true, true);
    let largest = svd.singular_values.amax();
    if largest == 0.0 {
        return None;
    }
    let eps = largest * SINGULAR_TOLERANCE;
    if svd.rank(eps) < p {
        return None;
    }
    let solution = svd.solve(target, eps).ok()?;
    Some(solution.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let i = i as f64;
                vec![i, (i * 0.7).sin() * 10.0]
            })
            .collect();
        let y = x.iter().map(|r| 3.0 + 2.0 * r[0] - 0.5 * r[1]).collect();
        (x, y)
    }

    #[test]
    fn recovers_exact_linear_relation() {
        let (x, y) = exact_data();
        let model = LinearRegression::fit(vec!["a".into(), "b".into()], &x, &y).unwrap();

        assert!((model.intercept - 3.0).abs() < 1e-9);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-9);
        assert!(model.training_rmse < 1e-9);
        assert_eq!(model.training_rows, 20);
        assert!((model.predict_row(&[1.0, 2.0]) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn fit_is_deterministic() {
        let (x, y) = exact_data();
        let a = LinearRegression::fit(vec!["a".into(), "b".into()], &x, &y).unwrap();
        let b = LinearRegression::fit(vec!["a".into(), "b".into()], &x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn constant_feature_is_singular() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 1.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let err = LinearRegression::fit(vec!["a".into(), "c".into()], &x, &y).unwrap_err();
        assert!(matches!(err, TwinError::SingularDesign { .. }), "got {err:?}");
    }

    #[test]
    fn collinear_features_are_singular() {
        let x: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let y: Vec<f64> = (0..12).map(|i| 1.0 + i as f64).collect();
        let err = LinearRegression::fit(vec!["a".into(), "twice_a".into()], &x, &y).unwrap_err();
        assert!(matches!(err, TwinError::SingularDesign { .. }), "got {err:?}");
        assert_eq!(err.kind(), crate::error::ErrorKind::Value);
    }

    #[test]
    fn intercept_only_model_predicts_the_mean() {
        let x: Vec<Vec<f64>> = vec![Vec::new(); 4];
        let model = LinearRegression::fit(Vec::new(), &x, &[1.0, 2.0, 3.0, 6.0]).unwrap();
        assert!(model.coefficients.is_empty());
        assert_eq!(model.intercept, 3.0);
    }

    #[test]
    fn too_few_rows_is_insufficient() {
        let err = LinearRegression::fit(vec!["a".into()], &[vec![1.0]], &[1.0]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Value);
    }

    #[test]
    fn save_and_load_preserve_the_model() {
        let (x, y) = exact_data();
        let model = LinearRegression::fit(vec!["a".into(), "b".into()], &x, &y).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        model.save(&path).unwrap();
        let loaded = LinearRegression::load(&path).unwrap();
        assert_eq!(loaded.features, model.features);
        for (a, b) in loaded.predict(&x).iter().zip(model.predict(&x)) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
