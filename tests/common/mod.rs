#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::Value;
use sales_forecaster::{
    api,
    config::Config,
    controller::{AppState, ModelTrainer},
    domain::WeeklySales,
    ml::{training::train_on_sales, Hyperparameters, TrainedModel, TrainingError},
};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub fn first_week() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 1, 9).unwrap()
}

/// Trend plus a four-week cycle.
pub fn sales(weeks: usize) -> WeeklySales {
    let values: Vec<f64> = (0..weeks)
        .map(|i| 5_000.0 + 40.0 * i as f64 + 300.0 * ((i % 4) as f64))
        .collect();
    WeeklySales::from_values(first_week(), &values).unwrap()
}

pub fn params(n_estimators: usize) -> Hyperparameters {
    Hyperparameters {
        n_estimators,
        learning_rate: 0.1,
        random_state: 42,
        max_depth: 3,
        subsample: 1.0,
    }
}

pub fn trained_model(history: &WeeklySales, n_estimators: usize) -> TrainedModel {
    train_on_sales(history, &params(n_estimators), &CancellationToken::new()).unwrap()
}

/// Retrains on a fixed in-memory series.
pub struct InMemoryTrainer {
    pub history: WeeklySales,
}

impl ModelTrainer for InMemoryTrainer {
    fn train(
        &self,
        params: &Hyperparameters,
        cancel: &CancellationToken,
    ) -> Result<TrainedModel, TrainingError> {
        train_on_sales(&self.history, params, cancel)
    }
}

/// Holds the job open until it is cancelled.
pub struct StallingTrainer;

impl ModelTrainer for StallingTrainer {
    fn train(
        &self,
        _params: &Hyperparameters,
        cancel: &CancellationToken,
    ) -> Result<TrainedModel, TrainingError> {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Err(TrainingError::Cancelled)
    }
}

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// App serving a model trained on `history` with 20 rounds.
    pub fn new(history: WeeklySales, trainer: Arc<dyn ModelTrainer>) -> Self {
        let model = trained_model(&sales(40), 20);
        Self::with_model(history, model, trainer)
    }

    pub fn with_model(
        history: WeeklySales,
        model: TrainedModel,
        trainer: Arc<dyn ModelTrainer>,
    ) -> Self {
        let mut cfg = Config::default();
        cfg.training.n_estimators = 20;
        cfg.training.max_depth = 3;
        let state = AppState::from_parts(cfg.clone(), history, model, trainer);
        let router = api::router(state.clone(), &cfg);
        Self { router, state }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a request and decode the JSON response body.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Method::GET, uri, None).await
    }
}
