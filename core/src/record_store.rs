//! Append-only CSV persistence for the replayed database.
//!
//! RULE: Only record_store.rs writes the database file.
//! The header is written once by truncate(); appends never write a header
//! and never rewrite earlier rows.

use crate::{
    error::TwinResult,
    table::{Record, Table},
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file with an empty table carrying `header`.
    pub fn truncate(&self, header: &[String]) -> TwinResult<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(header)?;
        writer.flush()?;
        log::debug!("Truncated {} ({} columns)", self.path.display(), header.len());
        Ok(())
    }

    /// Append whole records, without a header.
    /// The batch is encoded in memory first and written with a single call,
    /// so an encoding failure leaves the file untouched.
    pub fn append(&self, records: &[Record]) -> TwinResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut encoder = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for record in records {
            encoder.write_record(&record.fields)?;
        }
        let bytes = encoder.into_inner().map_err(|e| e.into_error())?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(records.len())
    }

    /// Read the full current contents.
    pub fn read(&self, time_var: &str) -> TwinResult<Table> {
        Table::read_csv(&self.path, time_var)
    }
}
