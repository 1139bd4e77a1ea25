//! Windowed statistics used by the monitor.

use crate::{
    config::MetricKind,
    error::TwinResult,
    frame::Frame,
};

/// Root mean squared error over pairs where both sides are finite.
/// NaN when no such pair exists.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let (sum, n) = finite_pairs(actual, predicted)
        .fold((0.0, 0usize), |(sum, n), (a, p)| (sum + (a - p).powi(2), n + 1));
    if n == 0 {
        return f64::NAN;
    }
    (sum / n as f64).sqrt()
}

/// Pearson correlation over finite pairs; 0.0 when either side is constant
/// or fewer than two pairs exist.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = finite_pairs(x, y).collect();
    if pairs.len() < 2 {
        return 0.0;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        cov += (a - mean_x) * (b - mean_y);
        var_x += (a - mean_x).powi(2);
        var_y += (b - mean_y).powi(2);
    }
    let denominator = (var_x * var_y).sqrt();
    if denominator > 1e-12 {
        cov / denominator
    } else {
        0.0
    }
}

/// Mean of the finite values; NaN when there are none.
pub fn mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

fn finite_pairs<'a>(a: &'a [f64], b: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
}

/// A window of aligned rows: frame signals plus the predictions made for
/// the same timestamps.
pub struct MonitorWindow<'a> {
    pub frame:             &'a Frame,
    pub predictions:       &'a [f64],
    pub output:            &'a str,
    pub prediction_column: &'a str,
}

impl MonitorWindow<'_> {
    fn series(&self, name: &str) -> TwinResult<&[f64]> {
        if name == self.prediction_column {
            Ok(self.predictions)
        } else {
            self.frame.require(name)
        }
    }

    pub fn evaluate(&self, metric: &MetricKind) -> TwinResult<f64> {
        let value = match metric {
            MetricKind::Rmse { actual, predicted } => rmse(
                self.series(actual.as_deref().unwrap_or(self.output))?,
                self.series(predicted.as_deref().unwrap_or(self.prediction_column))?,
            ),
            MetricKind::Corr { a, b } => pearson(
                self.series(a.as_deref().unwrap_or(self.output))?,
                self.series(b.as_deref().unwrap_or(self.prediction_column))?,
            ),
            MetricKind::Mean { signal } => mean(self.series(signal)?),
        };
        Ok(value)
    }
}
