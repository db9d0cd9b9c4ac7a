#[cfg(feature = "swagger")]
pub mod openapi;
pub mod error;
pub mod forecast;
pub mod health;
pub mod model;
pub mod retrain;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::get,
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::{config::Config, controller::AppState};

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/", get(health::health_check))
        .route("/predict", get(forecast::predict))
        .route("/config", get(model::get_model_config))
        .route(
            "/retrain",
            axum::routing::post(retrain::start_retrain).delete(retrain::cancel_retrain),
        )
        .route("/retrain/status", get(retrain::retrain_status))
        .with_state(state);

    if cfg.server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(allowed_origins(&cfg.server.cors_origin))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
                .layer(timeout_layer(cfg.server.request_timeout_secs)),
        )
        .layer(TraceLayer::new_for_http())
}

/// Requests running past `secs` are answered with 408.
fn timeout_layer(secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
}

/// `*` allows any origin, otherwise a comma-separated list of exact origins.
fn allowed_origins(origins_cfg: &str) -> AllowOrigin {
    if origins_cfg.trim() == "*" {
        return AllowOrigin::from(Any);
    }
    let origins: Vec<HeaderValue> = origins_cfg
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty() && *o != "*")
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(origins)
}

#[cfg(feature = "swagger")]
pub fn with_swagger(app: Router) -> Router {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;
    app.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
}

#[cfg(feature = "metrics")]
pub fn with_metrics(app: Router) -> Router {
    use axum_prometheus::PrometheusMetricLayer;
    let (layer, handle) = PrometheusMetricLayer::pair();

    let metrics_router =
        Router::new().route("/metrics", get(move || async move { handle.render() }));

    app.layer(layer).merge(metrics_router)
}
