//! Lag transform: turns a frame into a model design matrix.

use crate::{
    error::TwinResult,
    frame::Frame,
    types::{SignalName, Timestamp},
};
use std::collections::BTreeMap;

/// One design column: a source signal shifted back by `lag` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LaggedColumn {
    source: SignalName,
    lag:    usize,
}

impl LaggedColumn {
    fn name(&self) -> String {
        if self.lag == 0 {
            self.source.clone()
        } else {
            format!("{}_lag{}", self.source, self.lag)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names:      Vec<String>,
    pub timestamps: Vec<Timestamp>,
    pub rows:       Vec<Vec<f64>>,
    /// Frame row index of the first matrix row (rows lacking lag history
    /// are dropped from the front).
    pub offset:     usize,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when every feature of row `i` is a finite number.
    pub fn is_complete(&self, i: usize) -> bool {
        self.rows[i].iter().all(|v| v.is_finite())
    }
}

fn design_columns(
    inputs: &[SignalName],
    feat_lags: &BTreeMap<SignalName, Vec<usize>>,
) -> Vec<LaggedColumn> {
    let mut columns: Vec<LaggedColumn> = inputs
        .iter()
        .map(|source| LaggedColumn { source: source.clone(), lag: 0 })
        .collect();
    for (source, lags) in feat_lags {
        for &lag in lags {
            let column = LaggedColumn { source: source.clone(), lag };
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }
    columns
}

/// Names of the design columns, in matrix order.
pub fn feature_names(
    inputs: &[SignalName],
    feat_lags: &BTreeMap<SignalName, Vec<usize>>,
) -> Vec<String> {
    design_columns(inputs, feat_lags).iter().map(LaggedColumn::name).collect()
}

/// Build the design matrix: every input unshifted, then each configured
/// (feature, lag). The leading `max_lag` rows are dropped.
pub fn lag_features(
    frame: &Frame,
    inputs: &[SignalName],
    feat_lags: &BTreeMap<SignalName, Vec<usize>>,
) -> TwinResult<FeatureMatrix> {
    let columns = design_columns(inputs, feat_lags);
    let sources = columns
        .iter()
        .map(|c| frame.require(&c.source))
        .collect::<TwinResult<Vec<_>>>()?;
    let max_lag = columns.iter().map(|c| c.lag).max().unwrap_or(0);
    let offset = max_lag.min(frame.len());

    let rows: Vec<Vec<f64>> = (offset..frame.len())
        .map(|i| {
            columns
                .iter()
                .zip(&sources)
                .map(|(c, values)| values[i - c.lag])
                .collect::<Vec<f64>>()
        })
        .collect();

    Ok(FeatureMatrix {
        names: columns.iter().map(LaggedColumn::name).collect(),
        timestamps: frame.timestamps()[offset..].to_vec(),
        rows,
        offset,
    })
}
