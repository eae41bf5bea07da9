//! `WorkerSupervisor`: the main loop of §4.6, adapted from `hook_worker::worker::WebhookWorker`.
//!
//! The teacher's `WebhookWorker::run` polls once per process and then fans each leased job out to
//! a `tokio::spawn`'d task bounded by a semaphore, because many webhook deliveries can be
//! in-flight at once inside one process. Here, the process *is* the concurrency unit (§5 of the
//! expanded spec): one OS process holds at most one lease at a time, so the loop executes each
//! job inline instead of spawning it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use queuectl_core::store::Store;
use queuectl_core::{BackoffPolicy, ConfigService};
use tracing::{error, info, warn};

use crate::error::WorkerError;
use crate::exec;

pub struct WorkerSupervisor {
    worker_id: String,
    store: Arc<Store>,
    config: ConfigService,
    lease_ttl: Duration,
    poll_interval: Duration,
    heartbeat_interval: Duration,
    exec_timeout: Duration,
    shutdown: Arc<AtomicBool>,
}

impl WorkerSupervisor {
    pub fn new(
        store: Arc<Store>,
        lease_ttl: Duration,
        poll_interval: Duration,
        heartbeat_interval: Duration,
        exec_timeout: Duration,
    ) -> Self {
        let worker_id = uuid::Uuid::new_v4().to_string();
        let config = ConfigService::new(store.clone());
        Self {
            worker_id,
            store,
            config,
            lease_ttl,
            poll_interval,
            heartbeat_interval,
            exec_timeout,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// A clone-able handle a signal handler task can flip to request graceful shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Register the worker row, then run the lease/execute loop until the shutdown flag is set,
    /// finishing any in-flight job before exiting and marking the worker row stopped.
    pub async fn run(&self) -> Result<(), WorkerError> {
        self.store.register_worker(&self.worker_id).await?;
        info!(worker_id = %self.worker_id, "worker registered");

        let mut last_heartbeat = Utc::now() - chrono::Duration::seconds(3600);

        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Utc::now();
            if (now - last_heartbeat).to_std().unwrap_or(Duration::ZERO) >= self.heartbeat_interval
            {
                if let Err(e) = self.store.heartbeat(&self.worker_id, now).await {
                    warn!(worker_id = %self.worker_id, error = %e, "heartbeat failed, will retry next tick");
                } else {
                    last_heartbeat = now;
                }
            }

            match self
                .store
                .lease_next_due(&self.worker_id, Utc::now(), self.lease_ttl)
                .await
            {
                Ok(Some(job)) => {
                    self.execute_and_report(&job.id, &job.command, job.attempts)
                        .await;
                }
                Ok(None) => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    // Persistent store faults are surfaced via the log and retried next tick;
                    // the worker never exits because the store is briefly unavailable.
                    error!(worker_id = %self.worker_id, error = %e, "store fault while leasing, retrying");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        self.store.mark_stopped(&self.worker_id).await?;
        info!(worker_id = %self.worker_id, "worker stopped");
        Ok(())
    }

    async fn execute_and_report(&self, job_id: &str, command: &str, attempts: i64) {
        info!(worker_id = %self.worker_id, job_id, attempts, "leased job, executing");

        match exec::run(command, self.exec_timeout).await {
            Ok(()) => match self.store.complete_job(job_id, &self.worker_id).await {
                Ok(queuectl_core::store::LeaseOutcome::Ok) => {
                    info!(worker_id = %self.worker_id, job_id, "job completed");
                }
                Ok(queuectl_core::store::LeaseOutcome::NotLeased) => {
                    warn!(
                        worker_id = %self.worker_id,
                        job_id,
                        "completion reported after lease was stolen; discarding (new lessee is authoritative)"
                    );
                }
                Err(e) => {
                    error!(worker_id = %self.worker_id, job_id, error = %e, "store fault recording completion");
                }
            },
            Err(exec_error) => {
                let message = exec_error.to_error_message();
                let backoff = self
                    .config
                    .backoff_policy()
                    .await
                    .unwrap_or_else(|_| BackoffPolicy::default());
                let max_retries_default = self.config.max_retries().await.unwrap_or(3);

                match self
                    .store
                    .fail_job(
                        job_id,
                        &self.worker_id,
                        &message,
                        Utc::now(),
                        &backoff,
                        max_retries_default,
                    )
                    .await
                {
                    Ok(queuectl_core::store::FailOutcome::RetryScheduled) => {
                        warn!(worker_id = %self.worker_id, job_id, error = %message, "job failed, retry scheduled");
                    }
                    Ok(queuectl_core::store::FailOutcome::MovedToDlq) => {
                        warn!(worker_id = %self.worker_id, job_id, error = %message, "job failed, retries exhausted, moved to DLQ");
                    }
                    Ok(queuectl_core::store::FailOutcome::NotLeased) => {
                        warn!(
                            worker_id = %self.worker_id,
                            job_id,
                            "failure reported after lease was stolen; discarding (new lessee is authoritative)"
                        );
                    }
                    Err(e) => {
                        error!(worker_id = %self.worker_id, job_id, error = %e, "store fault recording failure");
                    }
                }
            }
        }
    }
}
