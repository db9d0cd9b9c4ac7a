//! Active model handle
//!
//! Readers take an `Arc` snapshot of the current model and keep using it for
//! the rest of their request. A retrain publishes a whole new snapshot; the
//! old one is dropped once the last in-flight reader releases it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use super::TrainedModel;

/// One published model generation.
#[derive(Debug)]
pub struct ActiveModel {
    /// Starts at 1 and increases with every swap.
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub model: TrainedModel,
}

impl ActiveModel {
    /// Version tag reported by the health endpoint.
    pub fn version_tag(&self) -> String {
        format!("{}.0", self.generation)
    }
}

#[derive(Debug, Clone)]
pub struct ModelHandle {
    current: Arc<RwLock<Arc<ActiveModel>>>,
}

impl ModelHandle {
    pub fn new(model: TrainedModel) -> Self {
        let active = ActiveModel {
            generation: 1,
            loaded_at: Utc::now(),
            model,
        };
        Self {
            current: Arc::new(RwLock::new(Arc::new(active))),
        }
    }

    /// Snapshot of the model published right now.
    pub fn current(&self) -> Arc<ActiveModel> {
        self.current.read().clone()
    }

    /// Publish `model` as the next generation and return it.
    pub fn swap(&self, model: TrainedModel) -> Arc<ActiveModel> {
        let mut guard = self.current.write();
        let next = Arc::new(ActiveModel {
            generation: guard.generation + 1,
            loaded_at: Utc::now(),
            model,
        });
        *guard = next.clone();
        drop(guard);

        info!(
            generation = next.generation,
            model_id = %next.model.metadata.model_id,
            "active model swapped"
        );
        next
    }
}
