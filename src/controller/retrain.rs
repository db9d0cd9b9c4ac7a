//! Background retraining
//!
//! A retrain request is acknowledged immediately and runs on the blocking
//! pool. Progress is published on a `watch` channel: callers either poll
//! [`RetrainManager::status`] or await [`RetrainManager::wait_for_completion`].
//! Only a successfully published and reloaded model is swapped in; every
//! failure leaves the active model untouched.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use strum::Display;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ml::{
    ArtifactStore, Hyperparameters, ModelHandle, TrainedModel, TrainingError, TrainingPipeline,
};

/// Produces a new, already-persisted model.
pub trait ModelTrainer: Send + Sync + 'static {
    fn train(
        &self,
        params: &Hyperparameters,
        cancel: &CancellationToken,
    ) -> Result<TrainedModel, TrainingError>;
}

/// Trains from the configured CSV exports and publishes to the artifact store.
pub struct PublishingTrainer {
    pipeline: TrainingPipeline,
    store: ArtifactStore,
}

impl PublishingTrainer {
    pub fn new(pipeline: TrainingPipeline, store: ArtifactStore) -> Self {
        Self { pipeline, store }
    }
}

impl ModelTrainer for PublishingTrainer {
    fn train(
        &self,
        params: &Hyperparameters,
        cancel: &CancellationToken,
    ) -> Result<TrainedModel, TrainingError> {
        self.pipeline.run_and_publish(params, cancel, &self.store)
    }
}

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RetrainState {
    Idle,
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RetrainState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Latest retrain job as reported to clients
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetrainStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub status: RetrainState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperparameters: Option<Hyperparameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Version tag of the model published by this job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrainStatus {
    fn idle() -> Self {
        Self {
            job_id: None,
            status: RetrainState::Idle,
            hyperparameters: None,
            queued_at: None,
            started_at: None,
            finished_at: None,
            model_version: None,
            model_id: None,
            error: None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RetrainError {
    #[error("retrain job {0} is still running")]
    AlreadyRunning(Uuid),

    #[error("no retrain job is running")]
    NotRunning,
}

struct RunningJob {
    id: Uuid,
    cancel: CancellationToken,
}

pub struct RetrainManager {
    trainer: Arc<dyn ModelTrainer>,
    models: ModelHandle,
    timeout: Duration,
    status: watch::Sender<RetrainStatus>,
    running: Mutex<Option<RunningJob>>,
}

impl RetrainManager {
    pub fn new(
        trainer: Arc<dyn ModelTrainer>,
        models: ModelHandle,
        timeout: Duration,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(RetrainStatus::idle());
        Arc::new(Self {
            trainer,
            models,
            timeout,
            status,
            running: Mutex::new(None),
        })
    }

    pub fn status(&self) -> RetrainStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RetrainStatus> {
        self.status.subscribe()
    }

    /// Queue a retrain and return at once with the `QUEUED` status.
    pub fn submit(
        self: &Arc<Self>,
        params: Hyperparameters,
    ) -> Result<RetrainStatus, RetrainError> {
        let mut running = self.running.lock();
        if let Some(job) = running.as_ref() {
            return Err(RetrainError::AlreadyRunning(job.id));
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        *running = Some(RunningJob {
            id,
            cancel: cancel.clone(),
        });

        let queued = RetrainStatus {
            job_id: Some(id),
            status: RetrainState::Queued,
            hyperparameters: Some(params),
            queued_at: Some(Utc::now()),
            ..RetrainStatus::idle()
        };
        self.status.send_replace(queued.clone());
        drop(running);

        info!(job_id = %id, n_estimators = params.n_estimators, "retrain queued");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_job(id, params, cancel).await;
        });

        Ok(queued)
    }

    /// Cancel the running job; the worker stops before its next boosting round.
    pub fn cancel(&self) -> Result<Uuid, RetrainError> {
        let running = self.running.lock();
        let job = running.as_ref().ok_or(RetrainError::NotRunning)?;
        job.cancel.cancel();
        info!(job_id = %job.id, "retrain cancellation requested");
        Ok(job.id)
    }

    /// Resolve once job `job_id` reaches a terminal state.
    ///
    /// The channel only holds the latest job. If a newer job has already
    /// replaced `job_id`, that job's status is returned instead.
    pub async fn wait_for_completion(&self, job_id: Uuid) -> RetrainStatus {
        let mut rx = self.subscribe();
        let result = rx
            .wait_for(|s| s.job_id != Some(job_id) || s.status.is_terminal())
            .await
            .map(|s| s.clone());
        match result {
            Ok(status) => status,
            // The sender lives as long as `self`, so this only happens on teardown.
            Err(_) => self.status(),
        }
    }

    async fn run_job(&self, id: Uuid, params: Hyperparameters, cancel: CancellationToken) {
        self.status.send_modify(|s| {
            s.status = RetrainState::Running;
            s.started_at = Some(Utc::now());
        });

        let trainer = Arc::clone(&self.trainer);
        let worker_cancel = cancel.clone();
        let mut worker =
            tokio::task::spawn_blocking(move || trainer.train(&params, &worker_cancel));

        let mut timed_out = false;
        let joined = match tokio::time::timeout(self.timeout, &mut worker).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    job_id = %id,
                    timeout_secs = self.timeout.as_secs(),
                    "retrain timed out, cancelling"
                );
                timed_out = true;
                cancel.cancel();
                worker.await
            }
        };

        let outcome = match joined {
            Ok(Err(TrainingError::Cancelled)) if timed_out => {
                Err(TrainingError::TimedOut(self.timeout))
            }
            Ok(result) => result,
            Err(join_err) => Err(TrainingError::Aborted(join_err.to_string())),
        };

        let (state, model, error) = match outcome {
            Ok(model) => {
                let model_id = model.metadata.model_id.clone();
                let active = self.models.swap(model);
                info!(job_id = %id, %model_id, generation = active.generation, "retrain succeeded");
                (RetrainState::Succeeded, Some((active.version_tag(), model_id)), None)
            }
            Err(TrainingError::Cancelled) => {
                info!(job_id = %id, "retrain cancelled");
                (RetrainState::Cancelled, None, None)
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "retrain failed, keeping previous model");
                (RetrainState::Failed, None, Some(e.to_string()))
            }
        };

        // Publish and free the slot under one lock.
        let mut running = self.running.lock();
        self.status.send_modify(|s| {
            s.status = state;
            s.finished_at = Some(Utc::now());
            if let Some((version, model_id)) = model {
                s.model_version = Some(version);
                s.model_id = Some(model_id);
            }
            s.error = error;
        });
        if running.as_ref().map(|j| j.id) == Some(id) {
            *running = None;
        }
    }
}
