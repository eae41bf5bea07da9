//! Library half of the `queuectl-worker` package: the supervisor loop, command execution, and
//! process-level configuration, kept behind a `lib.rs` (alongside the `main.rs` binary) so
//! integration tests can exercise `exec`/`supervisor` directly instead of shelling out to the
//! built binary.

pub mod config;
pub mod error;
pub mod exec;
pub mod supervisor;
