//! Process-level configuration, loaded once from the environment at worker start.
//!
//! Mirrors `hook_worker::config::Config`: an `envconfig`-derived struct with small `FromStr`
//! newtypes for the fields that need more than a bare scalar, including the same
//! milliseconds-in-an-env-var trick as the teacher's `EnvMsDuration`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct WorkerConfig {
    /// Path to the SQLite database file. Defaults to `${HOME}/.queuectl/queuectl.db`, per the
    /// spec's §6 persisted store layout.
    #[envconfig(from = "QUEUECTL_DB_PATH")]
    pub db_path: Option<String>,

    /// A human-distinguishable name for this worker process, used only for logging; the worker
    /// identity used for leasing is always a fresh UUID (§4.6).
    #[envconfig(from = "QUEUECTL_WORKER_NAME", default = "worker")]
    pub worker_name: String,

    #[envconfig(from = "QUEUECTL_LEASE_TTL_SECS", default = "300")]
    pub lease_ttl: EnvSecsDuration,

    #[envconfig(from = "QUEUECTL_POLL_INTERVAL_MS", default = "1000")]
    pub poll_interval: EnvMsDuration,

    #[envconfig(from = "QUEUECTL_EXEC_TIMEOUT_SECS", default = "300")]
    pub exec_timeout: EnvSecsDuration,

    #[envconfig(from = "QUEUECTL_HEARTBEAT_INTERVAL_MS", default = "1000")]
    pub heartbeat_interval: EnvMsDuration,
}

impl WorkerConfig {
    /// Resolve the database path, falling back to `${HOME}/.queuectl/queuectl.db` per the spec.
    pub fn resolve_db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(p) => PathBuf::from(p),
            None => {
                let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
                home.join(".queuectl").join("queuectl.db")
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub Duration);

#[derive(Debug, Clone, Copy)]
pub struct EnvSecsDuration(pub Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvDurationError)?;
        Ok(EnvMsDuration(Duration::from_millis(ms)))
    }
}

impl FromStr for EnvSecsDuration {
    type Err = ParseEnvDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs = s.parse::<u64>().map_err(|_| ParseEnvDurationError)?;
        Ok(EnvSecsDuration(Duration::from_secs(secs)))
    }
}
