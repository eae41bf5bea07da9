//! Error taxonomy for `queuectl-core`, split by layer the way the teacher splits
//! `hook_common::pgqueue::PgQueueError` (store faults) from `hook_worker::error::WorkerError`
//! (caller-facing outcomes).

use thiserror::Error;

/// Faults originating in the store itself: connection/query failures and malformed rows.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open or migrate the queue database: {0}")]
    Connection(#[from] sqlx::Error),
    #[error("{0} is not a valid job state")]
    ParseJobStateError(String),
}

/// Input errors a client of the queue façade can hit. Synchronous, no state change on error.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("a job with id {0:?} already exists")]
    DuplicateId(String),
    #[error("invalid job spec: {0}")]
    Invalid(String),
    #[error("job {0:?} is not in the DEAD state")]
    NotDead(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from `ConfigService`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0:?} is not a recognized configuration key")]
    UnknownKey(String),
    #[error("value {0:?} is not valid for this configuration key: {1}")]
    InvalidValue(String, String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
