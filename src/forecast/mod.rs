//! Weekly sales forecasting: feature construction shared between training
//! and serving, and the recursive multi-step forecaster.

pub mod features;
pub mod recursive;

pub use features::*;
pub use recursive::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("need at least {required} weeks of history, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("weeks must be between 1 and {max}, got {requested}")]
    InvalidHorizon { requested: i64, max: usize },

    #[error("model requires unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("inference failed at step {step}: {source}")]
    Inference {
        step: usize,
        #[source]
        source: anyhow::Error,
    },
}
