//! Top-level error type for the `queuectl-worker` binary boundary, mirroring the split between
//! `hook_worker::error::WorkerError` (a precise enum) and the `anyhow`/`eyre::Result` the
//! teacher's `main` functions return.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] queuectl_core::StoreError),
    #[error(transparent)]
    Config(#[from] envconfig::Error),
}
