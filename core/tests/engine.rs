//! Engine tests: the full poll cycle over a synthetic recording.

use std::collections::BTreeMap;
use std::path::Path;
use twin_core::{
    config::TwinConfig,
    engine::TwinEngine,
    error::{ErrorKind, TwinError},
    modeling::TrainParams,
    synth::{self, SynthSpec},
};

const ROWS: usize = 300;
const SIGNALS: usize = synth::SIGNALS.len();

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 300 timestamps at t = 0, 5, ..., 1495; each poll advances 50 seconds.
fn build(dir: &Path) -> TwinEngine {
    init_logging();
    let mut config = TwinConfig::default_test().with_data_dir(dir);
    config.engine.poll_step_secs = 50;
    config.engine.history_rows = 30;
    config.model.monitor_window = 20;
    config.model.features = BTreeMap::from([("u1".to_string(), vec![1])]);

    synth::generate(&config.simulator.recording_path, &SynthSpec { rows: ROWS, ..SynthSpec::default() })
        .unwrap();
    TwinEngine::build(config)
}

#[test]
fn start_leaves_database_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());

    let report = engine.start().unwrap();
    assert!(report.run_id.starts_with("twin-"));
    assert_eq!(report.poll, 0);
    assert_eq!(report.store_rows, 0);
    assert_eq!(report.remaining, ROWS * SIGNALS);
    assert!(report.predictions.is_empty());
    assert!(report.monitoring.is_empty());
    assert_eq!(report.prediction_column, "y1_prediction");
}

#[test]
fn first_poll_flushes_fifty_seconds_of_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();

    let report = engine.poll().unwrap();
    // t = 0, 5, ..., 50
    assert_eq!(report.flushed, 11 * SIGNALS);
    assert_eq!(report.store_rows, 11 * SIGNALS);
    assert_eq!(report.clock.unwrap().current, 50);
    assert_eq!(report.sensors.len(), 11);

    // Untrained: one zero per visible timestamp, no monitoring yet.
    assert!(!report.trained);
    assert_eq!(report.predictions.len(), 11);
    assert!(report.predictions.iter().all(|p| p.value == 0.0));
    assert!(report.monitoring.is_empty());
}

#[test]
fn training_produces_predictions_and_monitoring() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();
    engine.run_polls(3).unwrap();

    let message = engine.train(&TrainParams::new()).unwrap();
    assert!(message.contains("Training RMSE"));

    // Untrained polls filled a full window of zeros; none was monitored.
    let report = engine.poll().unwrap();
    assert!(report.trained);
    assert_eq!(engine.modeling().predictions().len(), 41);
    assert!(report.predictions.iter().any(|p| p.value != 0.0));
    assert!(report.monitoring.is_empty());

    // The second trained poll completes a window of 20 model predictions.
    let report = engine.poll().unwrap();
    assert_eq!(engine.modeling().predictions().len(), 51);
    assert_eq!(report.monitoring.len(), 1);
    assert_eq!(report.monitoring[0].dt, 250);
    assert!(report.monitoring[0].values.contains_key("rmse"));
    assert!(report.monitoring[0].values.contains_key("corr"));

    let rows = engine.modeling().predictions().rows();
    assert!(rows.windows(2).all(|w| w[0].dt < w[1].dt));
}

#[test]
fn report_history_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();

    let report = engine.run_polls(5).unwrap().unwrap();
    assert_eq!(report.poll, 5);
    assert_eq!(report.sensors.len(), 30);
    assert_eq!(report.predictions.len(), 30);
    assert_eq!(engine.modeling().predictions().len(), 51);
}

#[test]
fn paused_poll_does_not_advance() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();
    let before = engine.poll().unwrap();

    engine.pause();
    let paused = engine.poll().unwrap();
    assert!(paused.paused);
    assert_eq!(paused.flushed, 0);
    assert_eq!(paused.store_rows, before.store_rows);
    assert_eq!(paused.clock, before.clock);

    engine.resume();
    let resumed = engine.poll().unwrap();
    assert!(!resumed.paused);
    assert_eq!(resumed.flushed, 10 * SIGNALS);
}

#[test]
fn state_does_not_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();
    engine.run_polls(5).unwrap();
    engine.train(&TrainParams::new()).unwrap();
    engine.poll().unwrap();
    let monitored = engine.modeling().monitoring().len();

    let state = engine.state().unwrap();
    assert_eq!(state.flushed, 0);
    assert_eq!(engine.modeling().monitoring().len(), monitored);
}

#[test]
fn reset_restarts_replay_and_forgets_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();
    engine.run_polls(4).unwrap();
    engine.train(&TrainParams::new()).unwrap();
    engine.pause();

    let report = engine.reset().unwrap();
    assert!(!report.trained);
    assert!(!report.paused);
    assert_eq!(report.poll, 0);
    assert_eq!(report.store_rows, 0);
    assert!(report.predictions.is_empty());
    assert!(report.monitoring.is_empty());
}

#[test]
fn train_on_empty_database_is_value_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();

    let err = engine.train(&TrainParams::new()).unwrap_err();
    assert!(matches!(err, TwinError::InsufficientData { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Value);
    assert!(!engine.modeling().is_trained());
}

#[test]
fn poll_before_start_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    assert!(matches!(engine.poll(), Err(TwinError::NotStarted)));
}

#[test]
fn replay_runs_to_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();
    engine.run_polls(10).unwrap();
    engine.train(&TrainParams::new()).unwrap();

    let report = engine.run_polls(40).unwrap().unwrap();
    assert_eq!(report.remaining, 0);
    assert_eq!(report.store_rows, ROWS * SIGNALS);
    assert_eq!(report.clock.unwrap().current, 1495);
    assert_eq!(report.flushed, 0);
    assert_eq!(engine.modeling().predictions().last_dt(), Some(1495));
}

#[test]
fn restart_keeps_model_and_predicts_again() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = build(dir.path());
    engine.start().unwrap();
    engine.run_polls(10).unwrap();
    engine.train(&TrainParams::new()).unwrap();
    engine.run_polls(40).unwrap();
    assert_eq!(engine.modeling().predictions().last_dt(), Some(1495));

    let report = engine.start().unwrap();
    assert!(report.trained);
    assert_eq!(report.store_rows, 0);
    assert!(report.predictions.is_empty());
    assert!(report.monitoring.is_empty());

    let report = engine.run_polls(10).unwrap().unwrap();
    assert_eq!(report.clock.unwrap().current, 500);
    assert_eq!(report.store_rows, 101 * SIGNALS);
    // Row 0 lacks lag history; every later row is predicted by the model.
    assert_eq!(engine.modeling().predictions().len(), 100);
    assert_eq!(engine.modeling().predictions().last_dt(), Some(500));
    assert!(!report.monitoring.is_empty());
}

#[test]
fn model_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let mut engine = build(dir.path());
    engine.start().unwrap();
    engine.run_polls(6).unwrap();
    engine.train(&TrainParams::new()).unwrap();
    engine.save_model(&path).unwrap();

    let mut fresh = build(dir.path());
    fresh.load_model(&path).unwrap();
    assert!(fresh.modeling().is_trained());
    let loaded = fresh.modeling().model().unwrap();
    let trained = engine.modeling().model().unwrap();
    assert_eq!(loaded.features, trained.features);
    for (a, b) in loaded.coefficients.iter().zip(&trained.coefficients) {
        assert!((a - b).abs() < 1e-9);
    }
}
