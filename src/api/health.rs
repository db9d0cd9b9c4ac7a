use axum::{extract::State, Json};
use serde::Serialize;

use crate::controller::AppState;

pub const HEALTHY: &str = "System is healthy.";

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Generation tag of the model currently serving forecasts
    pub model_version: String,
    pub model_id: String,
}

/// GET / - liveness plus the active model's version
#[cfg_attr(
    feature = "swagger",
    utoipa::path(get, path = "/", responses((status = 200, body = HealthResponse)))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let active = state.forecasts.active_model();
    Json(HealthResponse {
        status: HEALTHY.to_string(),
        model_version: active.version_tag(),
        model_id: active.model.metadata.model_id.clone(),
    })
}
