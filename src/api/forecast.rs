use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ApiError;
use crate::controller::AppState;
use crate::domain::ForecastPoint;

pub const SUCCESS: &str = "Success.";

#[cfg_attr(feature = "swagger", derive(utoipa::IntoParams))]
#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    /// Weeks to forecast; defaults to `forecast.default_weeks`
    pub weeks: Option<i64>,
}

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub message: String,
    pub forecast: Vec<ForecastPoint>,
}

/// GET /predict?weeks=N - recursive forecast of the next N weeks
#[cfg_attr(
    feature = "swagger",
    utoipa::path(
        get,
        path = "/predict",
        params(PredictQuery),
        responses(
            (status = 200, body = PredictResponse),
            (status = 400, description = "weeks missing a valid positive value"),
            (status = 503, description = "not enough sales history to seed a forecast"),
        )
    )
)]
pub async fn predict(
    State(state): State<AppState>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Query(query) = query?;
    let weeks = query.weeks.unwrap_or(state.cfg.forecast.default_weeks);

    let service = state.forecasts.clone();
    let (snapshot, forecast) = tokio::task::spawn_blocking(move || service.forecast(weeks))
        .await
        .map_err(|e| ApiError::InternalError(format!("forecast task failed: {e}")))??;

    debug!(weeks, generation = snapshot.generation, "forecast served");
    Ok(Json(PredictResponse {
        message: SUCCESS.to_string(),
        forecast,
    }))
}
