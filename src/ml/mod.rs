//! Machine Learning Module
//!
//! Weekly sales regression:
//! - Gradient-boosted regression trees (`gbm`)
//! - Offline training pipeline (`training`)
//! - Versioned artifact persistence (`artifact`)
//! - Atomically swappable active model (`registry`)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub mod artifact;
pub mod gbm;
pub mod models;
pub mod registry;
pub mod training;

pub use artifact::{ArtifactError, ArtifactStore, ARTIFACT_SCHEMA_VERSION};
pub use models::{MLModel, TrainedModel};
pub use registry::{ActiveModel, ModelHandle};
pub use training::{TrainingError, TrainingPipeline};

/// ML Model Type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ModelType {
    GradientBoosting,
}

/// ML Model Metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub validation_metrics: ValidationMetrics,
    /// Input order the regressor was fit on.
    pub feature_names: Vec<String>,
}

/// Hyperparameters of the boosted ensemble.
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Hyperparameters {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every tree's contribution
    pub learning_rate: f64,
    /// Seed for row subsampling
    pub random_state: u64,
    pub max_depth: u16,
    /// Fraction of rows drawn per round, in (0, 1]
    pub subsample: f64,
}

/// Validation Metrics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
}

impl ValidationMetrics {
    pub fn new(mae: f64, rmse: f64, mape: f64, r2: f64) -> Self {
        Self { mae, rmse, mape, r2 }
    }

    pub fn is_finite(&self) -> bool {
        self.mae.is_finite()
            && self.rmse.is_finite()
            && self.mape.is_finite()
            && self.r2.is_finite()
    }

    /// Compute in-sample accuracy of `predictions` against `targets`.
    pub fn calculate(predictions: &[f64], targets: &[f64]) -> Result<Self> {
        if predictions.len() != targets.len() {
            anyhow::bail!("Prediction and target count mismatch");
        }

        if predictions.is_empty() {
            anyhow::bail!("No predictions to evaluate");
        }

        let n = predictions.len() as f64;

        let mae: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / n;

        let mse: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / n;
        let rmse = mse.sqrt();

        // Zero-sales weeks are excluded from the percentage error
        let (pct_sum, pct_count) = predictions
            .iter()
            .zip(targets.iter())
            .filter(|(_, t)| t.abs() > 1e-10)
            .fold((0.0, 0usize), |(sum, count), (p, t)| {
                (sum + ((p - t) / t).abs() * 100.0, count + 1)
            });
        let mape = if pct_count == 0 { 0.0 } else { pct_sum / pct_count as f64 };

        let mean_target: f64 = targets.iter().sum::<f64>() / n;
        let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (t - p).powi(2))
            .sum();

        let r2 = if ss_tot.abs() < 1e-10 {
            0.0
        } else {
            1.0 - (ss_res / ss_tot)
        };

        Ok(Self::new(mae, rmse, mape, r2))
    }
}

/// Named model inputs in a fixed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    pub features: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>, feature_names: Vec<String>) -> Result<Self> {
        if features.len() != feature_names.len() {
            anyhow::bail!(
                "Feature count mismatch: {} features, {} names",
                features.len(),
                feature_names.len()
            );
        }
        Ok(Self {
            features,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.features[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_creation() {
        let features = vec![1.0, 2.0, 3.0];
        let names = vec!["f1".to_string(), "f2".to_string(), "f3".to_string()];

        let fv = FeatureVector::new(features, names).unwrap();
        assert_eq!(fv.len(), 3);
        assert!(!fv.is_empty());
        assert_eq!(fv.get("f2"), Some(2.0));
        assert_eq!(fv.get("missing"), None);
    }

    #[test]
    fn test_feature_vector_length_mismatch() {
        assert!(FeatureVector::new(vec![1.0], vec![]).is_err());
    }

    #[test]
    fn test_calculate_metrics() {
        let predictions = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let targets = vec![1.1, 2.1, 2.9, 4.2, 4.8];

        let metrics = ValidationMetrics::calculate(&predictions, &targets).unwrap();

        assert!(metrics.mae < 0.3);
        assert!(metrics.rmse < 0.4);
        assert!(metrics.r2 > 0.9);
        assert!(metrics.is_finite());
    }

    #[test]
    fn test_mape_ignores_zero_targets() {
        let metrics = ValidationMetrics::calculate(&[1.0, 110.0], &[0.0, 100.0]).unwrap();
        assert!((metrics.mape - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_model_type_display() {
        assert_eq!(ModelType::GradientBoosting.to_string(), "gradient_boosting");
    }
}
