//! The static recording replayed by the simulator.

use crate::{
    error::TwinResult,
    table::{Record, Table},
    types::Timestamp,
};
use std::path::Path;

/// An immutable, time-ordered recording.
/// Invariant: records are sorted ascending by timestamp (ties keep file order).
#[derive(Debug, Clone)]
pub struct Recording {
    table: Table,
}

impl Recording {
    pub fn load(path: &Path, time_var: &str) -> TwinResult<Self> {
        let mut table = Table::read_csv(path, time_var)?;
        table.records.sort_by_key(|r| r.dt);
        log::info!(
            "Loaded recording {}: {} rows, dt {:?}..{:?}",
            path.display(),
            table.len(),
            table.min_dt(),
            table.max_dt()
        );
        Ok(Self { table })
    }

    pub fn header(&self) -> &[String] {
        &self.table.header
    }

    pub fn records(&self) -> &[Record] {
        &self.table.records
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn min_dt(&self) -> Option<Timestamp> {
        self.table.records.first().map(|r| r.dt)
    }

    pub fn max_dt(&self) -> Option<Timestamp> {
        self.table.records.last().map(|r| r.dt)
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}
