//! Append-only result tables: predictions and monitoring rows.

use crate::{
    error::{TwinError, TwinResult},
    types::Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub dt:    Timestamp,
    pub value: f64,
}

/// Invariant: timestamps strictly increase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionLedger {
    rows: Vec<Prediction>,
}

impl PredictionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The initial ledger an untrained model reports: zero for every timestamp.
    pub fn zero_filled(timestamps: &[Timestamp]) -> TwinResult<Self> {
        let mut ledger = Self::new();
        ledger.append(timestamps.iter().map(|&dt| Prediction { dt, value: 0.0 }).collect())?;
        Ok(ledger)
    }

    pub fn rows(&self) -> &[Prediction] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Timestamp of the newest prediction; None before any prediction.
    pub fn last_dt(&self) -> Option<Timestamp> {
        self.rows.last().map(|p| p.dt)
    }

    /// Prediction recorded for `dt`, if any.
    pub fn get(&self, dt: Timestamp) -> Option<f64> {
        self.rows
            .binary_search_by_key(&dt, |p| p.dt)
            .ok()
            .map(|i| self.rows[i].value)
    }

    pub fn tail(&self, n: usize) -> &[Prediction] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }

    /// Append a batch. The whole batch is validated first; on error the
    /// ledger is unchanged.
    pub fn append(&mut self, batch: Vec<Prediction>) -> TwinResult<usize> {
        let mut last = self.last_dt();
        for p in &batch {
            if let Some(prev) = last {
                if p.dt <= prev {
                    return Err(TwinError::OutOfOrder { dt: p.dt, last: prev });
                }
            }
            last = Some(p.dt);
        }

        let added = batch.len();
        if self.rows.is_empty() {
            self.rows = batch;
        } else {
            self.rows.extend(batch);
        }
        Ok(added)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// One monitoring evaluation: measure name → value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRow {
    pub dt:     Timestamp,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitoringLedger {
    rows: Vec<MonitorRow>,
}

impl MonitoringLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[MonitorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&MonitorRow> {
        self.rows.last()
    }

    pub fn tail(&self, n: usize) -> &[MonitorRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }

    /// Values of one measure over time.
    pub fn series(&self, measure: &str) -> Vec<(Timestamp, f64)> {
        self.rows
            .iter()
            .filter_map(|row| row.values.get(measure).map(|v| (row.dt, *v)))
            .collect()
    }

    pub fn push(&mut self, row: MonitorRow) {
        self.rows.push(row);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(dt: Timestamp, value: f64) -> Prediction {
        Prediction { dt, value }
    }

    #[test]
    fn append_grows_and_tracks_last_dt() {
        let mut ledger = PredictionLedger::new();
        assert_eq!(ledger.last_dt(), None);

        ledger.append(vec![p(0, 1.0), p(5, 2.0)]).unwrap();
        ledger.append(vec![p(10, 3.0)]).unwrap();

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.last_dt(), Some(10));
        assert_eq!(ledger.get(5), Some(2.0));
        assert_eq!(ledger.get(6), None);
        assert_eq!(ledger.tail(2), &[p(5, 2.0), p(10, 3.0)]);
    }

    #[test]
    fn out_of_order_batch_is_rejected_whole() {
        let mut ledger = PredictionLedger::new();
        ledger.append(vec![p(10, 1.0)]).unwrap();

        let err = ledger.append(vec![p(15, 2.0), p(10, 3.0)]).unwrap_err();
        assert!(matches!(err, TwinError::OutOfOrder { dt: 10, last: 15 }));
        assert_eq!(ledger.len(), 1);

        assert!(ledger.append(vec![p(10, 9.0)]).is_err());
        assert_eq!(ledger.rows(), &[p(10, 1.0)]);
    }

    #[test]
    fn zero_filled_covers_every_timestamp() {
        let ledger = PredictionLedger::zero_filled(&[0, 5, 10]).unwrap();
        assert_eq!(ledger.len(), 3);
        assert!(ledger.rows().iter().all(|r| r.value == 0.0));
        assert_eq!(ledger.last_dt(), Some(10));
    }

    #[test]
    fn monitoring_series_extracts_one_measure() {
        let mut ledger = MonitoringLedger::new();
        ledger.push(MonitorRow { dt: 5, values: BTreeMap::from([("rmse".into(), 0.5)]) });
        ledger.push(MonitorRow { dt: 10, values: BTreeMap::from([("rmse".into(), 0.25)]) });

        assert_eq!(ledger.series("rmse"), vec![(5, 0.5), (10, 0.25)]);
        assert!(ledger.series("corr").is_empty());
        assert_eq!(ledger.last().map(|r| r.dt), Some(10));
    }
}
