//! Wide-form numeric view of the database: one row per distinct timestamp,
//! one column per signal. Frames are derived on demand and never stored.

use crate::{
    error::{TwinError, TwinResult},
    table::Table,
    types::{SignalName, Timestamp},
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Long-form tables carry one (sensor, value) pair per row.
pub const SENSOR_COLUMN: &str = "sensor";
pub const VALUE_COLUMN: &str = "value";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    time_var:   String,
    timestamps: Vec<Timestamp>,
    /// Missing cells are NaN.
    columns:    BTreeMap<SignalName, Vec<f64>>,
}

impl Frame {
    /// Build a frame from already-aligned columns.
    /// Timestamps must be strictly increasing and every column as long as
    /// the timestamp axis.
    pub fn new(
        time_var: impl Into<String>,
        timestamps: Vec<Timestamp>,
        columns: BTreeMap<SignalName, Vec<f64>>,
    ) -> TwinResult<Self> {
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TwinError::insufficient("frame timestamps must be strictly increasing"));
        }
        if let Some((name, _)) = columns.iter().find(|(_, c)| c.len() != timestamps.len()) {
            return Err(TwinError::insufficient(format!(
                "column '{name}' length differs from the time axis ({})",
                timestamps.len()
            )));
        }
        Ok(Self { time_var: time_var.into(), timestamps, columns })
    }

    pub fn empty(time_var: impl Into<String>) -> Self {
        Self {
            time_var:   time_var.into(),
            timestamps: Vec::new(),
            columns:    BTreeMap::new(),
        }
    }

    pub fn time_var(&self) -> &str {
        &self.time_var
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.timestamps.last().copied()
    }

    pub fn signals(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Like `column`, but a missing signal is a configuration error.
    pub fn require(&self, name: &str) -> TwinResult<&[f64]> {
        self.column(name).ok_or_else(|| TwinError::missing_column(name))
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Frame {
        self.select(&(0..n.min(self.len())).collect::<Vec<_>>())
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> Frame {
        let from = self.len().saturating_sub(n);
        self.select(&(from..self.len()).collect::<Vec<_>>())
    }

    /// Rows at the given ascending indices.
    pub fn select(&self, rows: &[usize]) -> Frame {
        Frame {
            time_var:   self.time_var.clone(),
            timestamps: rows.iter().map(|&i| self.timestamps[i]).collect(),
            columns:    self
                .columns
                .iter()
                .map(|(name, col)| (name.clone(), rows.iter().map(|&i| col[i]).collect()))
                .collect(),
        }
    }
}

/// Pivot a database table into wide form.
///
/// Tables with `sensor` and `value` columns are long form; anything else is
/// treated as wide form with one numeric column per non-time header.
/// Repeated (timestamp, signal) cells are averaged; unparsable or empty
/// cells are skipped and show up as NaN when nothing else fills the cell.
pub fn pivot(table: &Table) -> Frame {
    let mut cells: BTreeMap<Timestamp, BTreeMap<SignalName, (f64, u32)>> = BTreeMap::new();
    let mut signals: Vec<SignalName> = Vec::new();

    let mut accumulate = |dt: Timestamp, name: &str, raw: &str| {
        let Ok(value) = raw.trim().parse::<f64>() else {
            return;
        };
        let slot = cells.entry(dt).or_default().entry(name.to_string()).or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
    };

    match (table.column_index(SENSOR_COLUMN), table.column_index(VALUE_COLUMN)) {
        (Some(sensor_idx), Some(value_idx)) => {
            for record in &table.records {
                let name = &record.fields[sensor_idx];
                if !signals.contains(name) {
                    signals.push(name.clone());
                }
                accumulate(record.dt, name, &record.fields[value_idx]);
            }
        }
        _ => {
            let wide: Vec<(usize, &String)> = table
                .header
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != table.time_index)
                .collect();
            signals.extend(wide.iter().map(|(_, name)| (*name).clone()));
            for record in &table.records {
                for (idx, name) in &wide {
                    accumulate(record.dt, name, &record.fields[*idx]);
                }
            }
            // Timestamps with no parsable cell still get a row.
            for record in &table.records {
                cells.entry(record.dt).or_default();
            }
        }
    }

    let timestamps: Vec<Timestamp> = cells.keys().copied().collect();
    let columns = signals
        .into_iter()
        .map(|name| {
            let values = cells
                .values()
                .map(|row| match row.get(&name) {
                    Some((sum, count)) if *count > 0 => sum / f64::from(*count),
                    _ => f64::NAN,
                })
                .collect();
            (name, values)
        })
        .collect();

    Frame {
        time_var: table.time_var().to_string(),
        timestamps,
        columns,
    }
}
