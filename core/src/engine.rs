//! The poll cycle: what the dashboard timer does on every interval.
//!
//! CYCLE ORDER (fixed):
//!   1. Simulator.step   (skipped while paused)
//!   2. Simulator.read
//!   3. pivot
//!   4. Modeling.run
//!   5. Modeling.monitor
//!
//! RULES:
//!   - One cycle at a time; the engine owns both components.
//!   - A failed cycle surfaces its error; the next poll simply retries.

use crate::{
    clock::SimClock,
    config::{EngineConfig, MeasureConfig, TwinConfig},
    error::{TwinError, TwinResult},
    frame::{pivot, Frame},
    ledger::{MonitorRow, Prediction},
    modeling::{Modeling, TrainParams},
    simulator::Simulator,
    types::RunId,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Everything a dashboard needs to redraw after one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub run_id:            RunId,
    pub poll:              u64,
    pub paused:            bool,
    pub clock:             Option<SimClock>,
    pub flushed:           usize,
    pub store_rows:        usize,
    pub remaining:         usize,
    pub trained:           bool,
    pub prediction_column: String,
    /// Most recent sensor rows (wide form).
    pub sensors:           Frame,
    pub predictions:       Vec<Prediction>,
    pub monitoring:        Vec<MonitorRow>,
    pub measures:          BTreeMap<String, MeasureConfig>,
}

pub struct TwinEngine {
    pub run_id: RunId,
    config:     EngineConfig,
    simulator:  Simulator,
    modeling:   Modeling,
    paused:     bool,
    polls:      u64,
}

impl TwinEngine {
    pub fn new(run_id: RunId, config: EngineConfig, simulator: Simulator, modeling: Modeling) -> Self {
        Self { run_id, config, simulator, modeling, paused: false, polls: 0 }
    }

    /// Build a fully wired engine from configuration with a fresh run id.
    pub fn build(config: TwinConfig) -> Self {
        let run_id = format!("twin-{}", Uuid::new_v4());
        let simulator = Simulator::new(config.simulator, config.model.time_var.clone());
        let modeling = Modeling::new(config.model);
        Self::new(run_id, config.engine, simulator, modeling)
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    pub fn modeling(&self) -> &Modeling {
        &self.modeling
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    /// Start (or restart) the replay. A trained model is kept; both
    /// ledgers restart empty along with the database.
    pub fn start(&mut self) -> TwinResult<CycleReport> {
        self.simulator.start()?;
        self.modeling.clear_ledgers();
        self.polls = 0;
        log::info!("[{}] replay started", self.run_id);
        self.refresh(0)
    }

    /// Restart the replay and drop the model and ledgers.
    pub fn reset(&mut self) -> TwinResult<CycleReport> {
        self.simulator.start()?;
        self.modeling.reset();
        self.polls = 0;
        self.paused = false;
        log::info!("[{}] reset", self.run_id);
        self.refresh(0)
    }

    /// One cycle: step (unless paused), read, pivot, run, monitor.
    pub fn poll(&mut self) -> TwinResult<CycleReport> {
        let flushed = if self.paused {
            0
        } else {
            self.simulator.step(Duration::from_secs(self.config.poll_step_secs))?
        };
        self.polls += 1;
        self.refresh(flushed)
    }

    /// Run `n` cycles and return the last report.
    pub fn run_polls(&mut self, n: u64) -> TwinResult<Option<CycleReport>> {
        let mut last = None;
        for _ in 0..n {
            last = Some(self.poll()?);
        }
        Ok(last)
    }

    /// Train on everything currently in the database.
    pub fn train(&mut self, params: &TrainParams) -> TwinResult<String> {
        let frame = pivot(&self.simulator.read()?);
        if frame.is_empty() {
            return Err(TwinError::insufficient("the database has no rows yet"));
        }
        self.modeling.train(&frame, params)
    }

    pub fn save_model(&self, path: &Path) -> TwinResult<()> {
        self.modeling.save(path)
    }

    pub fn load_model(&mut self, path: &Path) -> TwinResult<()> {
        self.modeling.load(path)
    }

    /// Current state without advancing or evaluating anything.
    pub fn state(&self) -> TwinResult<CycleReport> {
        let table = self.simulator.read()?;
        Ok(self.report(&pivot(&table), table.len(), 0))
    }

    fn refresh(&mut self, flushed: usize) -> TwinResult<CycleReport> {
        let table = self.simulator.read()?;
        let frame = pivot(&table);
        self.modeling.run(&frame)?;
        self.modeling.monitor_current(&frame)?;
        Ok(self.report(&frame, table.len(), flushed))
    }

    fn report(&self, frame: &Frame, store_rows: usize, flushed: usize) -> CycleReport {
        let history = self.config.history_rows;
        CycleReport {
            run_id:            self.run_id.clone(),
            poll:              self.polls,
            paused:            self.paused,
            clock:             self.simulator.clock(),
            flushed,
            store_rows,
            remaining:         self.simulator.remaining(),
            trained:           self.modeling.is_trained(),
            prediction_column: self.modeling.prediction_column(),
            sensors:           frame.tail(history),
            predictions:       self.modeling.predictions().tail(history).to_vec(),
            monitoring:        self.modeling.monitoring().tail(history).to_vec(),
            measures:          self.modeling.measures().clone(),
        }
    }
}
