pub mod retrain;

use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::config::Config;
use crate::data::load_weekly_sales;
use crate::domain::{ForecastPoint, WeeklySales};
use crate::forecast::{ForecastError, ForecastSeed, RecursiveForecaster, LOOKBACK_WEEKS};
use crate::ml::{ActiveModel, ArtifactStore, ModelHandle, TrainedModel, TrainingPipeline};

pub use retrain::{
    ModelTrainer, PublishingTrainer, RetrainError, RetrainManager, RetrainState, RetrainStatus,
};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub forecasts: Arc<SalesForecastService>,
    pub retrain: Arc<RetrainManager>,
}

impl AppState {
    /// Load the sales history and the published model.
    ///
    /// A missing or invalid artifact is an error: the server refuses to
    /// start rather than serve without a model.
    pub async fn new(cfg: Config) -> Result<Self> {
        let data_cfg = cfg.data.clone();
        let store = ArtifactStore::from_config(&cfg.model);
        let load_store = store.clone();

        let (sales, model) = tokio::task::spawn_blocking(move || -> Result<_> {
            let sales = load_weekly_sales(&data_cfg).context("failed to load sales history")?;
            let model = load_store.load().context("failed to load model artifact")?;
            Ok((sales, model))
        })
        .await
        .context("startup loader task panicked")??;

        info!(
            weeks = sales.len(),
            last_week = ?sales.last_week(),
            model_id = %model.metadata.model_id,
            "sales history and model loaded"
        );

        let trainer = Arc::new(PublishingTrainer::new(
            TrainingPipeline::new(cfg.data.clone()),
            store,
        ));
        Ok(Self::from_parts(cfg, sales, model, trainer))
    }

    /// Assemble state from already loaded parts.
    pub fn from_parts(
        cfg: Config,
        sales: WeeklySales,
        model: TrainedModel,
        trainer: Arc<dyn ModelTrainer>,
    ) -> Self {
        let models = ModelHandle::new(model);
        let retrain = RetrainManager::new(
            trainer,
            models.clone(),
            Duration::from_secs(cfg.training.timeout_secs),
        );
        let forecasts = Arc::new(SalesForecastService::new(
            sales,
            models,
            RecursiveForecaster::new(cfg.forecast.max_weeks),
        ));
        Self {
            cfg: Arc::new(cfg),
            forecasts,
            retrain,
        }
    }
}

/// Serves forecasts from the loaded history and the active model.
pub struct SalesForecastService {
    history: WeeklySales,
    seed: Option<ForecastSeed>,
    models: ModelHandle,
    forecaster: RecursiveForecaster,
}

impl SalesForecastService {
    pub fn new(history: WeeklySales, models: ModelHandle, forecaster: RecursiveForecaster) -> Self {
        let seed = ForecastSeed::from_history(&history)
            .map_err(|e| warn!(error = %e, "sales history too short, forecasts unavailable"))
            .ok();
        Self {
            history,
            seed,
            models,
            forecaster,
        }
    }

    pub fn history(&self) -> &WeeklySales {
        &self.history
    }

    pub fn active_model(&self) -> Arc<ActiveModel> {
        self.models.current()
    }

    /// Forecast `weeks` weeks past the last observed week.
    ///
    /// Returns the model snapshot used, so callers can report which
    /// generation produced the numbers.
    pub fn forecast(
        &self,
        weeks: i64,
    ) -> Result<(Arc<ActiveModel>, Vec<ForecastPoint>), ForecastError> {
        self.forecaster.validate_horizon(weeks)?;
        let seed = match &self.seed {
            Some(seed) => seed,
            None => {
                return Err(ForecastError::InsufficientHistory {
                    required: LOOKBACK_WEEKS,
                    available: self.history.len(),
                })
            }
        };

        let snapshot = self.models.current();
        let points = self.forecaster.forecast(&snapshot.model, seed, weeks)?;
        Ok((snapshot, points))
    }
}
