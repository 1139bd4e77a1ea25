//! Incremental predictor and monitor.
//!
//! State machine: untrained → trained (train / load) → untrained (reset).
//!
//! While untrained, `run` reports a zero prediction for every visible row.
//! Once trained, `run` only predicts rows newer than the last prediction,
//! so every timestamp is predicted at most once. `monitor` appends one row
//! of windowed statistics per evaluation, computed only over predictions
//! made by a model; the untrained zero placeholders are never evaluated.

use crate::{
    config::{MeasureConfig, ModelConfig},
    error::{TwinError, TwinResult},
    features::{feature_names, lag_features},
    frame::Frame,
    ledger::{MonitorRow, MonitoringLedger, Prediction, PredictionLedger},
    metrics::MonitorWindow,
    regression::LinearRegression,
    types::Timestamp,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Opaque user-supplied training parameters; logged, not interpreted.
pub type TrainParams = BTreeMap<String, String>;

/// Batches smaller than this wait for the next poll.
pub const MIN_NEW_ROWS: usize = 2;

pub struct Modeling {
    config:      ModelConfig,
    model:       Option<LinearRegression>,
    predictions: PredictionLedger,
    monitoring:  MonitoringLedger,
    /// First ledger timestamp predicted by a model. Earlier rows are zeros.
    model_from:  Option<Timestamp>,
}

impl Modeling {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            model:       None,
            predictions: PredictionLedger::new(),
            monitoring:  MonitoringLedger::new(),
            model_from:  None,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&LinearRegression> {
        self.model.as_ref()
    }

    pub fn predictions(&self) -> &PredictionLedger {
        &self.predictions
    }

    pub fn monitoring(&self) -> &MonitoringLedger {
        &self.monitoring
    }

    /// Timestamp of the newest prediction; None before any prediction.
    pub fn last_prediction_dt(&self) -> Option<Timestamp> {
        self.predictions.last_dt()
    }

    /// Configured bands and colors, for presentation.
    pub fn measures(&self) -> &BTreeMap<String, MeasureConfig> {
        &self.config.measures
    }

    pub fn prediction_column(&self) -> String {
        self.config.prediction_column()
    }

    /// Design columns the model is fit on, in order.
    pub fn feature_names(&self) -> Vec<String> {
        feature_names(&self.config.inputs, &self.config.features)
    }

    /// Fit the regressor on `data`. Returns a status message with the
    /// training RMSE. On error the previous model (if any) is kept.
    pub fn train(&mut self, data: &Frame, params: &TrainParams) -> TwinResult<String> {
        let target = data.require(&self.config.output)?;
        let matrix = lag_features(data, &self.config.inputs, &self.config.features)?;

        let (x, y): (Vec<Vec<f64>>, Vec<f64>) = matrix
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| matrix.is_complete(*i))
            .map(|(i, row)| (row.clone(), target[matrix.offset + i]))
            .filter(|(_, y)| y.is_finite())
            .unzip();
        if x.is_empty() {
            return Err(TwinError::insufficient(format!(
                "no complete rows to train on ({} rows, {} after lag trimming)",
                data.len(),
                matrix.len()
            )));
        }

        let model = LinearRegression::fit(matrix.names, &x, &y)?;
        let message = format!(
            "Model trained on {} rows with params {:?}. Training RMSE: {:.4}",
            model.training_rows, params, model.training_rmse
        );
        log::info!("{message}");
        self.model = Some(model);
        Ok(message)
    }

    /// Predict the rows of `data` that have not been predicted yet.
    pub fn run(&mut self, data: &Frame) -> TwinResult<&PredictionLedger> {
        let Some(model) = &self.model else {
            self.predictions = PredictionLedger::zero_filled(data.timestamps())?;
            self.model_from = None;
            return Ok(&self.predictions);
        };
        if data.is_empty() {
            return Ok(&self.predictions);
        }

        let last = self.predictions.last_dt();
        // Lag the whole frame so new rows see the history already visible.
        let matrix = lag_features(data, &self.config.inputs, &self.config.features)?;
        let batch: Vec<Prediction> = matrix
            .timestamps
            .iter()
            .enumerate()
            .filter(|(_, dt)| last.map_or(true, |last| **dt > last))
            .filter(|(i, _)| matrix.is_complete(*i))
            .map(|(i, &dt)| Prediction { dt, value: model.predict_row(&matrix.rows[i]) })
            .collect();

        if batch.len() < MIN_NEW_ROWS {
            return Ok(&self.predictions);
        }
        let first = batch[0].dt;
        let added = self.predictions.append(batch)?;
        self.model_from.get_or_insert(first);
        log::debug!(
            "Predicted {added} new rows through dt={:?}",
            self.predictions.last_dt()
        );
        Ok(&self.predictions)
    }

    /// Evaluate the configured measures over the most recent window of rows
    /// present in both `data` and `predictions`, and append one monitoring
    /// row. None (and no change) while untrained or while fewer rows than
    /// the window exist. Rows before this instance's first model prediction
    /// are left out of the window.
    pub fn monitor(
        &mut self,
        data: &Frame,
        predictions: &PredictionLedger,
    ) -> TwinResult<Option<&MonitoringLedger>> {
        if !self.is_trained() {
            return Ok(None);
        }
        match self.evaluate_window(data, predictions, self.model_from)? {
            Some(row) => {
                self.monitoring.push(row);
                Ok(Some(&self.monitoring))
            }
            None => Ok(None),
        }
    }

    /// `monitor` against this instance's own prediction ledger.
    pub fn monitor_current(&mut self, data: &Frame) -> TwinResult<Option<&MonitoringLedger>> {
        let Some(from) = self.model_from.filter(|_| self.is_trained()) else {
            return Ok(None);
        };
        match self.evaluate_window(data, &self.predictions, Some(from))? {
            Some(row) => {
                self.monitoring.push(row);
                Ok(Some(&self.monitoring))
            }
            None => Ok(None),
        }
    }

    fn evaluate_window(
        &self,
        data: &Frame,
        predictions: &PredictionLedger,
        from: Option<Timestamp>,
    ) -> TwinResult<Option<MonitorRow>> {
        let window = self.config.monitor_window.max(1);
        let (rows, values): (Vec<usize>, Vec<f64>) = data
            .timestamps()
            .iter()
            .enumerate()
            .filter(|(_, dt)| from.map_or(true, |from| **dt >= from))
            .filter_map(|(i, &dt)| predictions.get(dt).map(|v| (i, v)))
            .unzip();
        if rows.len() < window {
            return Ok(None);
        }

        let start = rows.len() - window;
        let frame = data.select(&rows[start..]);
        let prediction_column = self.config.prediction_column();
        let view = MonitorWindow {
            frame:             &frame,
            predictions:       &values[start..],
            output:            &self.config.output,
            prediction_column: &prediction_column,
        };

        let mut measured = BTreeMap::new();
        for (name, measure) in &self.config.measures {
            measured.insert(name.clone(), view.evaluate(&measure.metric)?);
        }

        let dt = predictions
            .last_dt()
            .or(frame.last_timestamp())
            .unwrap_or_default();
        log::debug!("Monitoring at dt={dt}: {measured:?}");
        Ok(Some(MonitorRow { dt, values: measured }))
    }

    /// Back to untrained: drop the model and both ledgers.
    pub fn reset(&mut self) {
        self.model = None;
        self.clear_ledgers();
        log::info!("Modeling reset");
    }

    /// Drop both ledgers but keep the model, so a replay restarted from its
    /// first row is predicted again.
    pub fn clear_ledgers(&mut self) {
        self.predictions.clear();
        self.monitoring.clear();
        self.model_from = None;
    }

    /// Load a persisted regressor and become trained.
    pub fn load(&mut self, path: &Path) -> TwinResult<()> {
        let model = LinearRegression::load(path)?;
        let expected = self.feature_names();
        if model.features != expected {
            return Err(TwinError::FeatureMismatch { expected, found: model.features });
        }
        log::info!("Loaded model from {} ({} features)", path.display(), expected.len());
        self.model = Some(model);
        Ok(())
    }

    /// Persist the trained regressor.
    pub fn save(&self, path: &Path) -> TwinResult<()> {
        let model = self.model.as_ref().ok_or(TwinError::NotTrained)?;
        model.save(path)?;
        log::info!("Saved model to {}", path.display());
        Ok(())
    }
}
