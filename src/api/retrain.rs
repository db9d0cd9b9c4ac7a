use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::error::ApiError;
use crate::controller::{AppState, RetrainState, RetrainStatus};
use crate::ml::Hyperparameters;

/// Optional overrides; anything left out falls back to `[training]` config.
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RetrainRequest {
    #[validate(range(min = 1, max = 10000))]
    pub n_estimators: Option<usize>,
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub learning_rate: Option<f64>,
    pub random_state: Option<u64>,
}

impl RetrainRequest {
    pub fn resolve(&self, defaults: Hyperparameters) -> Hyperparameters {
        Hyperparameters {
            n_estimators: self.n_estimators.unwrap_or(defaults.n_estimators),
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            random_state: self.random_state.unwrap_or(defaults.random_state),
            ..defaults
        }
    }
}

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
pub struct RetrainAccepted {
    pub message: String,
    pub status: RetrainState,
    pub job_id: Uuid,
}

/// POST /retrain - queue a background retrain
#[cfg_attr(
    feature = "swagger",
    utoipa::path(
        post,
        path = "/retrain",
        request_body = Option<RetrainRequest>,
        responses(
            (status = 202, body = RetrainAccepted),
            (status = 400, description = "invalid hyperparameters"),
            (status = 409, description = "a retrain is already running"),
        )
    )
)]
pub async fn start_retrain(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<RetrainAccepted>), ApiError> {
    let request = parse_request(&body)?;
    request.validate()?;

    let params = request.resolve(state.cfg.training.default_hyperparameters());
    let queued = state.retrain.submit(params)?;
    let job_id = queued
        .job_id
        .ok_or_else(|| ApiError::InternalError("queued job has no id".to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RetrainAccepted {
            message: "Retraining started in the background.".to_string(),
            status: queued.status,
            job_id,
        }),
    ))
}

/// GET /retrain/status - latest retrain job
#[cfg_attr(
    feature = "swagger",
    utoipa::path(get, path = "/retrain/status", responses((status = 200, body = RetrainStatus)))
)]
pub async fn retrain_status(State(state): State<AppState>) -> Json<RetrainStatus> {
    Json(state.retrain.status())
}

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: String,
    pub job_id: Uuid,
}

/// DELETE /retrain - cancel the running retrain
#[cfg_attr(
    feature = "swagger",
    utoipa::path(
        delete,
        path = "/retrain",
        responses(
            (status = 202, body = CancelResponse),
            (status = 404, description = "no retrain is running"),
        )
    )
)]
pub async fn cancel_retrain(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CancelResponse>), ApiError> {
    let job_id = state.retrain.cancel()?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            message: "Cancellation requested.".to_string(),
            job_id,
        }),
    ))
}

/// An empty body means "use the defaults".
fn parse_request(body: &[u8]) -> Result<RetrainRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RetrainRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid retrain body: {e}")))
}
