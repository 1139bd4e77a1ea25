//! The replay engine.
//!
//! Owns a cursor over a sorted recording and appends every row whose
//! timestamp the cursor has reached to the RecordStore. Flushed rows are
//! drained from the in-memory remainder, so a row is written exactly once.

use crate::{
    clock::SimClock,
    config::SimulatorConfig,
    error::{TwinError, TwinResult},
    record_store::RecordStore,
    recording::Recording,
    table::{Record, Table},
    types::Timestamp,
};
use std::collections::VecDeque;
use std::time::Duration;

struct ReplayState {
    clock:     SimClock,
    /// Rows not yet flushed, still sorted by timestamp.
    remaining: VecDeque<Record>,
}

pub struct Simulator {
    config:   SimulatorConfig,
    time_var: String,
    store:    RecordStore,
    state:    Option<ReplayState>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig, time_var: impl Into<String>) -> Self {
        let store = RecordStore::new(config.database_path.clone());
        Self {
            config,
            time_var: time_var.into(),
            store,
            state: None,
        }
    }

    /// (Re)initialize the replay: load and sort the recording, rewind the
    /// clock to its first timestamp and truncate the database to the
    /// recording's header.
    ///
    /// `start` flushes nothing, so `read()` right after it has the header
    /// and no rows. The first `step`, even a zero-length one, flushes the
    /// rows at the start timestamp.
    pub fn start(&mut self) -> TwinResult<()> {
        let recording = Recording::load(&self.config.recording_path, &self.time_var)?;
        let start = recording.min_dt().unwrap_or(0);
        let end = recording.max_dt().unwrap_or(start);
        let table = recording.into_table();

        self.store.truncate(&table.header)?;

        let state = ReplayState {
            clock:     SimClock::new(start, end),
            remaining: table.records.into(),
        };
        log::info!(
            "Simulator started: {} rows pending, dt {start}..{end}",
            state.remaining.len()
        );
        self.state = Some(state);
        Ok(())
    }

    /// Advance the clock by `duration` and append every row that became due.
    /// Returns the number of rows appended.
    pub fn step(&mut self, duration: Duration) -> TwinResult<usize> {
        let state = self.state.as_mut().ok_or(TwinError::NotStarted)?;
        let now = state.clock.advance(duration);
        let flushed = Self::flush_through(&self.store, state, now)?;
        log::debug!(
            "step {}s -> dt={now}: flushed {flushed}, {} remaining",
            duration.as_secs(),
            state.remaining.len()
        );
        Ok(flushed)
    }

    /// `step` with the configured default tick.
    pub fn step_default(&mut self) -> TwinResult<usize> {
        self.step(Duration::from_secs(self.config.tick_secs))
    }

    /// Full current contents of the database.
    pub fn read(&self) -> TwinResult<Table> {
        if self.state.is_none() {
            return Err(TwinError::NotStarted);
        }
        self.store.read(&self.time_var)
    }

    pub fn clock(&self) -> Option<SimClock> {
        self.state.as_ref().map(|s| s.clock)
    }

    /// Rows of the recording not yet written to the database.
    pub fn remaining(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.remaining.len())
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.remaining.is_empty())
    }

    pub fn time_var(&self) -> &str {
        &self.time_var
    }

    /// Append the due prefix (dt <= `bound`) and drain it from the remainder.
    /// If the append fails the remainder is untouched, so the next step
    /// retries the same rows.
    fn flush_through(
        store: &RecordStore,
        state: &mut ReplayState,
        bound: Timestamp,
    ) -> TwinResult<usize> {
        let due = state.remaining.partition_point(|r| r.dt <= bound);
        if due == 0 {
            return Ok(0);
        }
        store.append(&state.remaining.make_contiguous()[..due])?;
        state.remaining.drain(..due);
        Ok(due)
    }
}
