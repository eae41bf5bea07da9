//! `ConfigService`: validated read/write of the two domain-level tunables persisted in the
//! store's `config` table. Distinct from process-level configuration (database path, lease TTL,
//! poll interval), which `queuectl-worker::config` loads once from the environment at start — see
//! SPEC_FULL.md §9.3.

use std::sync::Arc;

use crate::backoff::BackoffPolicy;
use crate::error::ConfigError;
use crate::store::Store;

pub const MAX_RETRIES_KEY: &str = "max_retries";
pub const BACKOFF_BASE_KEY: &str = "backoff_base";

const DEFAULT_MAX_RETRIES: i64 = 3;
const DEFAULT_BACKOFF_BASE: u32 = 2;

/// A snapshot of the two recognized configuration keys, resolved to their effective values
/// (persisted value, or the documented default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub max_retries: i64,
    pub backoff_base: u32,
}

pub struct ConfigService {
    store: Arc<Store>,
}

impl ConfigService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn max_retries(&self) -> Result<i64, ConfigError> {
        match self.store.get_config(MAX_RETRIES_KEY).await? {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue(v, "must be an integer".to_owned())),
            None => Ok(DEFAULT_MAX_RETRIES),
        }
    }

    pub async fn backoff_base(&self) -> Result<u32, ConfigError> {
        match self.store.get_config(BACKOFF_BASE_KEY).await? {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue(v, "must be an integer".to_owned())),
            None => Ok(DEFAULT_BACKOFF_BASE),
        }
    }

    pub async fn backoff_policy(&self) -> Result<BackoffPolicy, ConfigError> {
        Ok(BackoffPolicy::new(self.backoff_base().await?))
    }

    pub async fn resolved(&self) -> Result<ResolvedConfig, ConfigError> {
        Ok(ResolvedConfig {
            max_retries: self.max_retries().await?,
            backoff_base: self.backoff_base().await?,
        })
    }

    /// Get the raw string value for any recognized key. Returns `ErrInvalidConfig`-equivalent
    /// (`ConfigError::UnknownKey`) for anything else.
    pub async fn get(&self, key: &str) -> Result<String, ConfigError> {
        match key {
            MAX_RETRIES_KEY => Ok(self.max_retries().await?.to_string()),
            BACKOFF_BASE_KEY => Ok(self.backoff_base().await?.to_string()),
            other => Err(ConfigError::UnknownKey(other.to_owned())),
        }
    }

    /// Set a recognized key, validating its value parses before writing. Unknown keys and
    /// unparseable values are both rejected without touching the store.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            MAX_RETRIES_KEY => {
                let parsed: i64 = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(value.to_owned(), "must be an integer".to_owned()))?;
                if parsed < 0 {
                    return Err(ConfigError::InvalidValue(
                        value.to_owned(),
                        "must be >= 0".to_owned(),
                    ));
                }
            }
            BACKOFF_BASE_KEY => {
                let parsed: u32 = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(value.to_owned(), "must be an integer".to_owned()))?;
                if parsed < 2 {
                    tracing::warn!(
                        value = parsed,
                        "backoff_base below the documented minimum of 2; accepting anyway (see DESIGN.md)"
                    );
                }
            }
            other => return Err(ConfigError::UnknownKey(other.to_owned())),
        }

        self.store.set_config(key, value).await?;
        Ok(())
    }
}
