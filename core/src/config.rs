use crate::types::SignalName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_TIME_VAR: &str = "dt";
pub const DEFAULT_TICK_SECS: u64 = 5;
pub const DEFAULT_MONITOR_WINDOW: usize = 60;
/// The dashboard advanced the replay by ten minutes per poll.
pub const DEFAULT_POLL_STEP_SECS: u64 = 600;
/// The dashboard kept the last 200 rows in view.
pub const DEFAULT_HISTORY_ROWS: usize = 200;

// ── Simulator ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Static recording replayed by the simulator.
    pub recording_path: PathBuf,
    /// Append-only database the simulator materializes.
    pub database_path: PathBuf,
    /// Default step used by `Simulator::step_default`.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

// ── Modeling ───────────────────────────────────────────────────────

/// Which statistic a monitoring measure computes over the window.
/// Series names resolve against frame signals plus the prediction column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    /// Root mean squared error; defaults to output vs prediction.
    Rmse {
        #[serde(default)]
        actual: Option<SignalName>,
        #[serde(default)]
        predicted: Option<SignalName>,
    },
    /// Pearson correlation; defaults to output vs prediction.
    Corr {
        #[serde(default)]
        a: Option<SignalName>,
        #[serde(default)]
        b: Option<SignalName>,
    },
    /// Mean of a single series.
    Mean { signal: SignalName },
}

/// A monitored measure and its acceptable band.
/// The band is presentation data only; min may exceed max.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasureConfig {
    pub metric: MetricKind,
    pub min:    f64,
    pub max:    f64,
    pub color:  String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub inputs: Vec<SignalName>,
    /// Auxiliary signals shown alongside the inputs; never used as features.
    #[serde(default)]
    pub unknown: Vec<SignalName>,
    pub output: SignalName,
    #[serde(default = "default_time_var")]
    pub time_var: String,
    /// Lag transform: feature name → lag counts.
    #[serde(default, alias = "feat_lags")]
    pub features: BTreeMap<SignalName, Vec<usize>>,
    #[serde(default = "default_monitor_window")]
    pub monitor_window: usize,
    #[serde(default = "default_measures")]
    pub measures: BTreeMap<String, MeasureConfig>,
}

impl ModelConfig {
    /// Column name under which predictions are exposed.
    pub fn prediction_column(&self) -> String {
        format!("{}_prediction", self.output)
    }
}

// ── Engine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_poll_step_secs")]
    pub poll_step_secs: u64,
    /// Rows of each series included in a cycle report.
    #[serde(default = "default_history_rows")]
    pub history_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_step_secs: DEFAULT_POLL_STEP_SECS,
            history_rows:   DEFAULT_HISTORY_ROWS,
        }
    }
}

fn default_tick_secs() -> u64 { DEFAULT_TICK_SECS }
fn default_time_var() -> String { DEFAULT_TIME_VAR.to_string() }
fn default_monitor_window() -> usize { DEFAULT_MONITOR_WINDOW }
fn default_poll_step_secs() -> u64 { DEFAULT_POLL_STEP_SECS }
fn default_history_rows() -> usize { DEFAULT_HISTORY_ROWS }

fn default_measures() -> BTreeMap<String, MeasureConfig> {
    let mut measures = BTreeMap::new();
    measures.insert(
        "rmse".to_string(),
        MeasureConfig {
            metric: MetricKind::Rmse { actual: None, predicted: None },
            min:    -5.0,
            max:    5.0,
            color:  "blue".into(),
        },
    );
    measures.insert(
        "corr".to_string(),
        MeasureConfig {
            metric: MetricKind::Corr { a: None, b: None },
            min:    0.3,
            max:    1.0,
            color:  "red".into(),
        },
    );
    measures
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinConfig {
    pub simulator: SimulatorConfig,
    pub model:     ModelConfig,
    #[serde(default)]
    pub engine:    EngineConfig,
}

impl TwinConfig {
    /// Load from a JSON file.
    /// In tests, use TwinConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: TwinConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        if config.model.inputs.is_empty() {
            anyhow::bail!("{path}: model.inputs must name at least one signal");
        }
        if config.model.monitor_window == 0 {
            anyhow::bail!("{path}: model.monitor_window must be positive");
        }
        log::info!(
            "Loaded config from {path}: inputs={:?} output={} window={}",
            config.model.inputs,
            config.model.output,
            config.model.monitor_window
        );
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    /// Paths are relative and should be overridden with a scratch directory.
    pub fn default_test() -> Self {
        Self {
            simulator: SimulatorConfig {
                recording_path: PathBuf::from("database/raw_data.csv"),
                database_path:  PathBuf::from("database/database.csv"),
                tick_secs:      DEFAULT_TICK_SECS,
            },
            model: ModelConfig {
                inputs:         vec!["u1".into(), "u2".into()],
                unknown:        vec!["y2".into(), "y3".into(), "y4".into()],
                output:         "y1".into(),
                time_var:       DEFAULT_TIME_VAR.into(),
                features:       BTreeMap::new(),
                monitor_window: DEFAULT_MONITOR_WINDOW,
                measures:       default_measures(),
            },
            engine: EngineConfig::default(),
        }
    }

    /// Point both simulator files into `dir`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.simulator.recording_path = dir.join("raw_data.csv");
        self.simulator.database_path = dir.join("database.csv");
        self
    }
}
