//! Raw tabular rows as read from (and written to) delimited files.
//!
//! A Record keeps the original text of every cell so that the database
//! mirrors the recording cell-for-cell; only the timestamp is parsed.

use crate::{
    error::{TwinError, TwinResult},
    types::Timestamp,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub dt:     Timestamp,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub header:     Vec<String>,
    pub time_index: usize,
    pub records:    Vec<Record>,
}

impl Table {
    /// Read a CSV file with a header row. The column named `time_var`
    /// must be present and parse as a timestamp on every row.
    pub fn read_csv(path: &Path, time_var: &str) -> TwinResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let time_index = header
            .iter()
            .position(|h| h == time_var)
            .ok_or_else(|| TwinError::MissingTimeColumn {
                column:      time_var.to_string(),
                source_name: path.display().to_string(),
            })?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let raw = row.get(time_index).unwrap_or_default();
            let dt = parse_timestamp(raw).ok_or_else(|| TwinError::BadTimestamp {
                value: raw.to_string(),
                line:  row.position().map(|p| p.line()).unwrap_or(0),
            })?;
            records.push(Record {
                dt,
                fields: row.iter().map(str::to_string).collect(),
            });
        }

        Ok(Self { header, time_index, records })
    }

    pub fn time_var(&self) -> &str {
        &self.header[self.time_index]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn min_dt(&self) -> Option<Timestamp> {
        self.records.iter().map(|r| r.dt).min()
    }

    pub fn max_dt(&self) -> Option<Timestamp> {
        self.records.iter().map(|r| r.dt).max()
    }
}

/// Parse a timestamp cell into seconds.
///
/// Accepts integers, decimals (truncated), RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`,
/// `YYYY-MM-DDTHH:MM:SS[.f]` and bare dates. Naive datetimes are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(secs) = raw.parse::<f64>() {
        return secs.is_finite().then(|| secs.trunc() as i64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_numeric_and_datetime_cells() {
        assert_eq!(parse_timestamp("42"), Some(42));
        assert_eq!(parse_timestamp(" 7.9 "), Some(7));
        assert_eq!(parse_timestamp("1970-01-01 00:01:40"), Some(100));
        assert_eq!(parse_timestamp("1970-01-01T00:00:05.250"), Some(5));
        assert_eq!(parse_timestamp("1970-01-02"), Some(86_400));
        assert_eq!(parse_timestamp("1970-01-01T01:00:00+01:00"), Some(0));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn read_csv_requires_time_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,sensor,value").unwrap();
        writeln!(file, "0,u1,1.0").unwrap();

        let err = Table::read_csv(file.path(), "dt").unwrap_err();
        assert!(matches!(err, TwinError::MissingTimeColumn { .. }), "got {err:?}");
    }

    #[test]
    fn read_csv_reports_bad_timestamp_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dt,sensor,value").unwrap();
        writeln!(file, "0,u1,1.0").unwrap();
        writeln!(file, "soon,u1,2.0").unwrap();

        match Table::read_csv(file.path(), "dt").unwrap_err() {
            TwinError::BadTimestamp { value, line } => {
                assert_eq!(value, "soon");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn read_csv_keeps_raw_cells() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sensor,dt,value").unwrap();
        writeln!(file, "u1,1970-01-01 00:00:10,1.50").unwrap();

        let table = Table::read_csv(file.path(), "dt").unwrap();
        assert_eq!(table.time_index, 1);
        assert_eq!(table.time_var(), "dt");
        assert_eq!(table.records[0].dt, 10);
        assert_eq!(table.records[0].fields, vec!["u1", "1970-01-01 00:00:10", "1.50"]);
    }
}
