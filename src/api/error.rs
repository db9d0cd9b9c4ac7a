use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::controller::RetrainError;
use crate::forecast::ForecastError;

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Forecast failed: {0}")]
    ForecastFailed(String),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) | ApiError::ForecastFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::Conflict(_) => "Conflict",
            ApiError::InternalError(_) => "InternalServerError",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailable",
            ApiError::ForecastFailed(_) => "ForecastFailed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let (message, details) = match &self {
            ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                ("An internal error occurred".to_string(), None)
            }
            ApiError::ForecastFailed(inner) => {
                tracing::error!(error = %self, "forecast aborted");
                ("The forecast could not be computed".to_string(), Some(inner.clone()))
            }
            ApiError::ServiceUnavailable(inner) => {
                tracing::warn!(error = %self, "Service unavailable");
                ("Service temporarily unavailable".to_string(), Some(inner.clone()))
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                (self.to_string(), None)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<ForecastError> for ApiError {
    fn from(error: ForecastError) -> Self {
        match error {
            ForecastError::InvalidHorizon { .. } => ApiError::BadRequest(error.to_string()),
            ForecastError::InsufficientHistory { .. } => {
                ApiError::ServiceUnavailable(error.to_string())
            }
            ForecastError::UnknownFeature(_) | ForecastError::Inference { .. } => {
                ApiError::ForecastFailed(format!("{error:#}"))
            }
        }
    }
}

impl From<RetrainError> for ApiError {
    fn from(error: RetrainError) -> Self {
        match error {
            RetrainError::AlreadyRunning(_) => ApiError::Conflict(error.to_string()),
            RetrainError::NotRunning => ApiError::NotFound(error.to_string()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::InternalError(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::ValidationError("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InternalError("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_forecast_errors_map_to_status() {
        let invalid: ApiError = ForecastError::InvalidHorizon { requested: 0, max: 520 }.into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let short: ApiError = ForecastError::InsufficientHistory {
            required: 4,
            available: 1,
        }
        .into();
        assert_eq!(short.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let inference: ApiError = ForecastError::Inference {
            step: 2,
            source: anyhow::anyhow!("NaN"),
        }
        .into();
        assert_eq!(inference.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(inference.error_type(), "ForecastFailed");
    }

    #[test]
    fn test_retrain_errors_map_to_status() {
        let busy: ApiError = RetrainError::AlreadyRunning(Uuid::nil()).into();
        assert_eq!(busy.status_code(), StatusCode::CONFLICT);

        let idle: ApiError = RetrainError::NotRunning.into();
        assert_eq!(idle.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_display() {
        let error = ApiError::Conflict("job 1 is still running".to_string());
        assert_eq!(error.to_string(), "Conflict: job 1 is still running");
    }
}
