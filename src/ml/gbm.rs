//! Gradient-boosted regression trees
//!
//! Squared-error boosting on top of SmartCore's CART regressor: the ensemble
//! starts from the mean target and every round fits one tree to the current
//! residuals, adding it with shrinkage `learning_rate`. With `subsample < 1`
//! each round sees a seeded random subset of rows, so `random_state` makes
//! the fit reproducible.

use rand::{rngs::StdRng, seq::index, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Hyperparameters;

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Error)]
pub enum BoostingError {
    #[error("cannot train on an empty dataset")]
    EmptyDataset,

    #[error("feature and target count mismatch: {rows} rows, {targets} targets")]
    TargetMismatch { rows: usize, targets: usize },

    #[error("expected {expected} features per row, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("invalid hyperparameter: {0}")]
    InvalidParameter(String),

    #[error("tree fit failed in round {round}: {message}")]
    Fit { round: usize, message: String },

    #[error("tree prediction failed: {0}")]
    Predict(String),

    #[error("training cancelled after {completed_rounds} rounds")]
    Cancelled { completed_rounds: usize },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_score: f64,
    learning_rate: f64,
    n_features: usize,
    trees: Vec<Tree>,
}

impl GradientBoostedTrees {
    pub fn validate(params: &Hyperparameters) -> Result<(), BoostingError> {
        if params.n_estimators == 0 {
            return Err(BoostingError::InvalidParameter("n_estimators must be at least 1".into()));
        }
        if !(params.learning_rate.is_finite() && params.learning_rate > 0.0) {
            return Err(BoostingError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                params.learning_rate
            )));
        }
        if !(params.subsample > 0.0 && params.subsample <= 1.0) {
            return Err(BoostingError::InvalidParameter(format!(
                "subsample must be in (0, 1], got {}",
                params.subsample
            )));
        }
        if params.max_depth == 0 {
            return Err(BoostingError::InvalidParameter("max_depth must be at least 1".into()));
        }
        Ok(())
    }

    /// Fit the ensemble, checking `cancel` before every round.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        params: &Hyperparameters,
        cancel: &CancellationToken,
    ) -> Result<Self, BoostingError> {
        Self::validate(params)?;
        if x.is_empty() || y.is_empty() {
            return Err(BoostingError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(BoostingError::TargetMismatch {
                rows: x.len(),
                targets: y.len(),
            });
        }

        let n_samples = x.len();
        let n_features = x[0].len();
        for row in x {
            if row.len() != n_features {
                return Err(BoostingError::FeatureCount {
                    expected: n_features,
                    actual: row.len(),
                });
            }
        }

        let x_all = to_matrix(x.iter().map(Vec::as_slice), n_features);
        let base_score = y.iter().sum::<f64>() / n_samples as f64;
        let mut current = vec![base_score; n_samples];

        let tree_params = DecisionTreeRegressorParameters::default()
            .with_max_depth(params.max_depth)
            .with_min_samples_leaf(1)
            .with_min_samples_split(2);

        let sample_size =
            ((n_samples as f64 * params.subsample).round() as usize).clamp(1, n_samples);
        let mut rng = StdRng::seed_from_u64(params.random_state);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            if cancel.is_cancelled() {
                return Err(BoostingError::Cancelled {
                    completed_rounds: round,
                });
            }

            let rows: Vec<usize> = if sample_size == n_samples {
                (0..n_samples).collect()
            } else {
                let mut picked = index::sample(&mut rng, n_samples, sample_size).into_vec();
                picked.sort_unstable();
                picked
            };

            let x_round = to_matrix(rows.iter().map(|&i| x[i].as_slice()), n_features);
            let residuals: Vec<f64> = rows.iter().map(|&i| y[i] - current[i]).collect();

            let tree = Tree::fit(&x_round, &residuals, tree_params.clone()).map_err(|e| {
                BoostingError::Fit {
                    round,
                    message: e.to_string(),
                }
            })?;

            let step = tree
                .predict(&x_all)
                .map_err(|e| BoostingError::Predict(e.to_string()))?;
            for (value, delta) in current.iter_mut().zip(step) {
                *value += params.learning_rate * delta;
            }
            trees.push(tree);
        }

        debug!(trees = trees.len(), n_samples, n_features, "boosting finished");

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            n_features,
            trees,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64, BoostingError> {
        if row.len() != self.n_features {
            return Err(BoostingError::FeatureCount {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let x = to_matrix(std::iter::once(row), self.n_features);
        let mut value = self.base_score;
        for tree in &self.trees {
            let out = tree
                .predict(&x)
                .map_err(|e| BoostingError::Predict(e.to_string()))?;
            value += self.learning_rate * out.first().copied().unwrap_or(0.0);
        }
        Ok(value)
    }

    pub fn predict_rows(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, BoostingError> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn to_matrix<'a>(rows: impl Iterator<Item = &'a [f64]>, n_features: usize) -> DenseMatrix<f64> {
    let mut flat = Vec::new();
    let mut n_rows = 0;
    for row in rows {
        flat.extend_from_slice(row);
        n_rows += 1;
    }
    DenseMatrix::new(n_rows, n_features, flat, false)
}
