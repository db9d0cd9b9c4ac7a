//! ML Model Definitions

use super::{gbm::GradientBoostedTrees, FeatureVector, Hyperparameters, ModelMetadata};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Trait for ML models
pub trait MLModel: Send + Sync {
    /// Predict a value from features
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// Feature names in the order `predict` expects them
    fn feature_names(&self) -> &[String];
}

/// Fitted sales regressor plus everything needed to reproduce and serve it.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    pub metadata: ModelMetadata,
    pub hyperparameters: Hyperparameters,
    regressor: GradientBoostedTrees,
}

impl TrainedModel {
    pub fn new(
        regressor: GradientBoostedTrees,
        hyperparameters: Hyperparameters,
        metadata: ModelMetadata,
    ) -> Self {
        Self {
            metadata,
            hyperparameters,
            regressor,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.regressor.n_trees()
    }
}

impl MLModel for TrainedModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if features.feature_names != self.metadata.feature_names {
            anyhow::bail!(
                "Feature order mismatch: model expects {:?}, got {:?}",
                self.metadata.feature_names,
                features.feature_names
            );
        }
        Ok(self.regressor.predict_row(&features.features)?)
    }

    fn feature_names(&self) -> &[String] {
        &self.metadata.feature_names
    }
}
