use axum::{extract::State, Json};
use serde::Serialize;

use super::forecast::SUCCESS;
use crate::controller::AppState;
use crate::ml::Hyperparameters;

/// Hyperparameters as reported to clients
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize, PartialEq)]
pub struct HyperparameterView {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: u64,
}

impl From<&Hyperparameters> for HyperparameterView {
    fn from(hp: &Hyperparameters) -> Self {
        Self {
            n_estimators: hp.n_estimators,
            learning_rate: hp.learning_rate,
            random_state: hp.random_state,
        }
    }
}

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
pub struct ModelConfigResponse {
    pub message: String,
    #[serde(rename = "Hyperparameters")]
    pub hyperparameters: HyperparameterView,
    pub model_version: String,
}

/// GET /config - hyperparameters of the active model
#[cfg_attr(
    feature = "swagger",
    utoipa::path(get, path = "/config", responses((status = 200, body = ModelConfigResponse)))
)]
pub async fn get_model_config(State(state): State<AppState>) -> Json<ModelConfigResponse> {
    let active = state.forecasts.active_model();
    Json(ModelConfigResponse {
        message: SUCCESS.to_string(),
        hyperparameters: HyperparameterView::from(&active.model.hyperparameters),
        model_version: active.version_tag(),
    })
}
