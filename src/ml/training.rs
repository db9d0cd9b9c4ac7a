//! ML Model Training Pipeline
//!
//! orders + items CSV → weekly totals → feature rows → boosted trees.

use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{
    artifact::{ArtifactError, ArtifactStore},
    gbm::{BoostingError, GradientBoostedTrees},
    Hyperparameters, ModelMetadata, ModelType, TrainedModel, ValidationMetrics,
};
use crate::config::DataConfig;
use crate::data::{load_weekly_sales, DataError};
use crate::domain::WeeklySales;
use crate::forecast::{build_feature_rows, feature_names, ForecastError};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("failed to load training data: {0}")]
    Data(#[from] DataError),

    #[error("need at least one week with {lookback} weeks of history, series has {weeks} weeks")]
    InsufficientData { lookback: usize, weeks: usize },

    #[error("failed to build features: {0}")]
    Features(#[from] ForecastError),

    #[error("model fit failed: {0}")]
    Fit(BoostingError),

    #[error("trained model failed validation: {0}")]
    Validation(String),

    #[error("failed to publish model: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("training cancelled")]
    Cancelled,

    #[error("training timed out after {0:?} (stopped at the next cancellation point)")]
    TimedOut(Duration),

    #[error("training task aborted: {0}")]
    Aborted(String),
}

impl From<BoostingError> for TrainingError {
    fn from(err: BoostingError) -> Self {
        match err {
            BoostingError::Cancelled { .. } => TrainingError::Cancelled,
            other => TrainingError::Fit(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    data: DataConfig,
}

impl TrainingPipeline {
    pub fn new(data: DataConfig) -> Self {
        Self { data }
    }

    /// Load the CSV exports and fit a model on them.
    ///
    /// `cancel` is honoured once the data is loaded and between boosting
    /// rounds; CSV parsing itself runs to completion.
    pub fn run(
        &self,
        params: &Hyperparameters,
        cancel: &CancellationToken,
    ) -> Result<TrainedModel, TrainingError> {
        let sales = load_weekly_sales(&self.data)?;
        if cancel.is_cancelled() {
            return Err(TrainingError::Cancelled);
        }
        train_on_sales(&sales, params, cancel)
    }

    /// Train, publish to `store`, then read the published copy back.
    ///
    /// The returned model is the one decoded from disk, so a caller that
    /// serves it is guaranteed the artifact on disk is loadable.
    pub fn run_and_publish(
        &self,
        params: &Hyperparameters,
        cancel: &CancellationToken,
        store: &ArtifactStore,
    ) -> Result<TrainedModel, TrainingError> {
        let model = self.run(params, cancel)?;
        if cancel.is_cancelled() {
            return Err(TrainingError::Cancelled);
        }
        store.save(&model)?;
        let published = store.load()?;
        if published.metadata.model_id != model.metadata.model_id {
            return Err(TrainingError::Validation(format!(
                "published artifact holds model {}, expected {}",
                published.metadata.model_id, model.metadata.model_id
            )));
        }
        Ok(published)
    }
}

/// Fit the regressor on an already aggregated weekly series.
pub fn train_on_sales(
    sales: &WeeklySales,
    params: &Hyperparameters,
    cancel: &CancellationToken,
) -> Result<TrainedModel, TrainingError> {
    let started = Instant::now();
    let rows = build_feature_rows(sales);
    if rows.is_empty() {
        return Err(TrainingError::InsufficientData {
            lookback: crate::forecast::LOOKBACK_WEEKS,
            weeks: sales.len(),
        });
    }

    let names = feature_names();
    let x = rows
        .iter()
        .map(|r| r.features.to_vector(&names).map(|v| v.features))
        .collect::<Result<Vec<_>, _>>()?;
    let y: Vec<f64> = rows.iter().map(|r| r.target).collect();

    info!(
        rows = rows.len(),
        n_estimators = params.n_estimators,
        learning_rate = params.learning_rate,
        random_state = params.random_state,
        "training started"
    );

    let regressor = GradientBoostedTrees::fit(&x, &y, params, cancel)?;
    let predictions = regressor.predict_rows(&x).map_err(TrainingError::Fit)?;
    let metrics = ValidationMetrics::calculate(&predictions, &y)
        .map_err(|e| TrainingError::Validation(e.to_string()))?;
    if !metrics.is_finite() {
        return Err(TrainingError::Validation(format!(
            "non-finite training metrics: {metrics:?}"
        )));
    }

    let metadata = ModelMetadata {
        model_id: format!("{}_{}", ModelType::GradientBoosting, uuid::Uuid::new_v4()),
        model_type: ModelType::GradientBoosting,
        trained_at: chrono::Utc::now(),
        training_samples: rows.len(),
        validation_metrics: metrics,
        feature_names: names,
    };

    info!(
        model_id = %metadata.model_id,
        mae = metrics.mae,
        rmse = metrics.rmse,
        r2 = metrics.r2,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "training finished"
    );

    Ok(TrainedModel::new(regressor, *params, metadata))
}
