//! Core of a single-host, persistent background job queue: a SQLite-backed store with an atomic
//! lease protocol, the job retry/DLQ state machine, and a thin façade in front of both.
//!
//! Adapted from PostHog's `hook-common`/`hook-worker` job-queue subsystem (`pgqueue.rs`,
//! `retry.rs`) — see `DESIGN.md` for the full grounding ledger. The worker supervisor loop that
//! drives this store lives in the sibling `queuectl-worker` crate, as its own binary, since the
//! spec requires each worker to be a separate OS process.

pub mod backoff;
pub mod config;
pub mod error;
pub mod job;
pub mod queue;
pub mod store;

use std::time::Duration;

/// Default lease TTL per the spec: 5 minutes.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(5 * 60);

/// A worker is considered active if it has heartbeated within this window.
pub const DEFAULT_HEARTBEAT_TTL: Duration = Duration::from_secs(60);

pub use backoff::BackoffPolicy;
pub use config::ConfigService;
pub use error::{ConfigError, QueueError, StoreError};
pub use job::{Job, JobSpec, JobState, Worker, WorkerStatus};
pub use queue::{QueueFacade, QueueStatus};
pub use store::Store;
