//! `QueueFacade`: the thin, scheduling-free API surface external collaborators (a CLI, a future
//! transport) are meant to call. Grounded on the teacher's `hook-producer`/`hook-api` binaries,
//! whose entire job is validating input and forwarding to `PgQueue` — no logic of their own.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ConfigService, ResolvedConfig};
use crate::error::QueueError;
use crate::job::{Job, JobSpec, JobState};
use crate::store::{EnqueueOutcome, ReviveOutcome, Store};

#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub counts: HashMap<JobState, i64>,
    pub active_workers: i64,
    pub config: ResolvedConfig,
}

pub struct QueueFacade {
    store: Arc<Store>,
    config: ConfigService,
}

impl QueueFacade {
    pub fn new(store: Arc<Store>) -> Self {
        let config = ConfigService::new(store.clone());
        Self { store, config }
    }

    /// Validate and enqueue a new job. `ErrInvalid` for an empty `id`/`command` or a negative
    /// `max_retries`; `ErrDuplicateId` if `id` is already in use.
    pub async fn enqueue(&self, spec: JobSpec) -> Result<(), QueueError> {
        if spec.id.trim().is_empty() {
            return Err(QueueError::Invalid("id must not be empty".to_owned()));
        }
        if spec.command.trim().is_empty() {
            return Err(QueueError::Invalid("command must not be empty".to_owned()));
        }

        match self.store.enqueue_job(spec.clone()).await? {
            EnqueueOutcome::Ok => Ok(()),
            EnqueueOutcome::DuplicateId => Err(QueueError::DuplicateId(spec.id)),
            EnqueueOutcome::Invalid(reason) => Err(QueueError::Invalid(reason)),
        }
    }

    pub async fn list(
        &self,
        state_filter: Option<JobState>,
        limit: Option<i64>,
    ) -> Result<Vec<Job>, QueueError> {
        Ok(self.store.list_jobs(state_filter, limit).await?)
    }

    pub async fn status(&self) -> Result<QueueStatus, QueueError> {
        let counts = self.store.status_counts().await?;
        let active_workers = self
            .store
            .active_worker_count(chrono::Utc::now(), crate::DEFAULT_HEARTBEAT_TTL)
            .await?;
        let config = self
            .config
            .resolved()
            .await
            .map_err(|e| QueueError::Invalid(e.to_string()))?;

        Ok(QueueStatus {
            counts,
            active_workers,
            config,
        })
    }

    /// The subset of `list` that is state=DEAD — the Dead Letter Queue is just a filter, not a
    /// separate structure.
    pub async fn dlq_list(&self, limit: Option<i64>) -> Result<Vec<Job>, QueueError> {
        self.list(Some(JobState::Dead), limit).await
    }

    pub async fn dlq_retry(&self, id: &str) -> Result<(), QueueError> {
        match self.store.revive_dead(id).await? {
            ReviveOutcome::Ok => Ok(()),
            ReviveOutcome::NotDead => Err(QueueError::NotDead(id.to_owned())),
        }
    }

    pub fn config(&self) -> &ConfigService {
        &self.config
    }
}
