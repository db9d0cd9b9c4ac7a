use utoipa::OpenApi;

use crate::api::{
    forecast::PredictResponse,
    health::HealthResponse,
    model::{HyperparameterView, ModelConfigResponse},
    retrain::{CancelResponse, RetrainAccepted, RetrainRequest},
};
use crate::controller::{RetrainState, RetrainStatus};
use crate::domain::ForecastPoint;
use crate::ml::Hyperparameters;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::health::health_check,
        crate::api::forecast::predict,
        crate::api::model::get_model_config,
        crate::api::retrain::start_retrain,
        crate::api::retrain::retrain_status,
        crate::api::retrain::cancel_retrain,
    ),
    components(schemas(
        HealthResponse,
        PredictResponse,
        ForecastPoint,
        ModelConfigResponse,
        HyperparameterView,
        Hyperparameters,
        RetrainRequest,
        RetrainAccepted,
        RetrainStatus,
        RetrainState,
        CancelResponse,
    )),
    tags((name = "sales-forecaster", description = "Weekly sales forecast API"))
)]
pub struct ApiDoc;
