//! `Store`: the SQLite-backed transactional home for jobs, workers, and config.
//!
//! Adapted from `hook_common::pgqueue::PgQueue`. The teacher leans on Postgres'
//! `FOR UPDATE SKIP LOCKED` inside a `WITH ... UPDATE ... RETURNING` statement to claim exactly
//! one row under concurrent dequeues. SQLite has no `SKIP LOCKED`, but it doesn't need one: the
//! engine serializes writers at the file level, so a single `UPDATE ... WHERE id = (SELECT ...
//! LIMIT 1) RETURNING *` statement is already atomic with respect to every other connection,
//! in-process or not. That single-statement shape is preserved from the teacher; only the locking
//! primitive underneath it changed.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::backoff::BackoffPolicy;
use crate::error::StoreError;
use crate::job::{Job, JobRow, JobSpec, JobState, Worker, WorkerStatus};

/// Outcome of `enqueue_job`.
#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Ok,
    DuplicateId,
    Invalid(String),
}

/// Outcome of `complete_job`/part of `fail_job`.
#[derive(Debug, PartialEq, Eq)]
pub enum LeaseOutcome {
    Ok,
    NotLeased,
}

/// Outcome of `fail_job`.
#[derive(Debug, PartialEq, Eq)]
pub enum FailOutcome {
    RetryScheduled,
    MovedToDlq,
    NotLeased,
}

/// Outcome of `revive_dead`.
#[derive(Debug, PartialEq, Eq)]
pub enum ReviveOutcome {
    Ok,
    NotDead,
}

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if necessary) the SQLite database at `path`, in WAL mode with a bounded
    /// busy timeout so concurrent readers and a single writer coexist without the application
    /// hand-rolling its own locking, then run pending migrations.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(sqlx::Error::Io(e))
            })?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            StoreError::Connection(sqlx::Error::Migrate(Box::new(e)))
        })?;

        Ok(Self { pool })
    }

    /// Build a `Store` directly from an already-open pool. Used by tests that need a
    /// file-backed (not `:memory:`) database so WAL semantics are exercised faithfully.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            StoreError::Connection(sqlx::Error::Migrate(Box::new(e)))
        })?;
        Ok(Self { pool })
    }

    pub async fn enqueue_job(&self, spec: JobSpec) -> Result<EnqueueOutcome, StoreError> {
        if spec.id.is_empty() {
            return Ok(EnqueueOutcome::Invalid("id must not be empty".to_owned()));
        }
        if spec.command.is_empty() {
            return Ok(EnqueueOutcome::Invalid(
                "command must not be empty".to_owned(),
            ));
        }
        if let Some(mr) = spec.max_retries {
            if mr < 0 {
                return Ok(EnqueueOutcome::Invalid(
                    "max_retries must be >= 0".to_owned(),
                ));
            }
        }

        let max_retries = match spec.max_retries {
            Some(mr) => mr,
            None => self.get_config_max_retries().await?,
        };

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO jobs
                (id, command, state, attempts, max_retries, created_at, updated_at)
            VALUES
                (?1, ?2, 'pending', 0, ?3, ?4, ?4)
            "#,
        )
        .bind(&spec.id)
        .bind(&spec.command)
        .bind(max_retries)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(EnqueueOutcome::Ok),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(EnqueueOutcome::DuplicateId)
            }
            Err(e) => Err(StoreError::Connection(e)),
        }
    }

    /// Atomically claim one eligible job for `worker_id`, incrementing `attempts` and marking it
    /// PROCESSING. Eligible: PENDING, or FAILED with `next_retry_at <= now`, and not validly
    /// leased (no lock, or a lock older than `lease_ttl`).
    pub async fn lease_next_due(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        lease_ttl: std::time::Duration,
    ) -> Result<Option<Job>, StoreError> {
        let lease_cutoff = now - chrono::Duration::from_std(lease_ttl).unwrap_or_default();

        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET
                state = 'processing',
                locked_by = ?1,
                locked_at = ?2,
                attempts = attempts + 1,
                updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE
                    (
                        state = 'pending'
                        OR (state = 'failed' AND next_retry_at <= ?2)
                        OR (state = 'processing' AND locked_at < ?3)
                    )
                    AND (locked_by IS NULL OR locked_at < ?3)
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .bind(lease_cutoff)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    pub async fn complete_job(
        &self,
        id: &str,
        worker_id: &str,
    ) -> Result<LeaseOutcome, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET
                state = 'completed',
                error_message = NULL,
                locked_by = NULL,
                locked_at = NULL,
                updated_at = ?3
            WHERE id = ?1 AND locked_by = ?2
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(LeaseOutcome::NotLeased)
        } else {
            Ok(LeaseOutcome::Ok)
        }
    }

    pub async fn fail_job(
        &self,
        id: &str,
        worker_id: &str,
        error: &str,
        now: DateTime<Utc>,
        backoff_policy: &BackoffPolicy,
        max_retries_default: i64,
    ) -> Result<FailOutcome, StoreError> {
        let row: Option<(i64, Option<i64>)> = sqlx::query_as(
            "SELECT attempts, max_retries FROM jobs WHERE id = ?1 AND locked_by = ?2",
        )
        .bind(id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((attempts, max_retries)) = row else {
            return Ok(FailOutcome::NotLeased);
        };
        let max_retries = max_retries.unwrap_or(max_retries_default);

        if attempts <= max_retries {
            let next_retry_at = now + backoff_policy.delay(attempts);
            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET
                    state = 'failed',
                    error_message = ?1,
                    next_retry_at = ?2,
                    locked_by = NULL,
                    locked_at = NULL,
                    updated_at = ?3
                WHERE id = ?4 AND locked_by = ?5
                "#,
            )
            .bind(error)
            .bind(next_retry_at)
            .bind(now)
            .bind(id)
            .bind(worker_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Ok(FailOutcome::NotLeased);
            }
            Ok(FailOutcome::RetryScheduled)
        } else {
            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET
                    state = 'dead',
                    error_message = ?1,
                    next_retry_at = NULL,
                    locked_by = NULL,
                    locked_at = NULL,
                    updated_at = ?2
                WHERE id = ?3 AND locked_by = ?4
                "#,
            )
            .bind(error)
            .bind(now)
            .bind(id)
            .bind(worker_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Ok(FailOutcome::NotLeased);
            }
            Ok(FailOutcome::MovedToDlq)
        }
    }

    pub async fn revive_dead(&self, id: &str) -> Result<ReviveOutcome, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET
                state = 'pending',
                attempts = 0,
                error_message = NULL,
                next_retry_at = NULL,
                updated_at = ?1
            WHERE id = ?2 AND state = 'dead'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(ReviveOutcome::NotDead)
        } else {
            Ok(ReviveOutcome::Ok)
        }
    }

    pub async fn list_jobs(
        &self,
        state_filter: Option<JobState>,
        limit: Option<i64>,
    ) -> Result<Vec<Job>, StoreError> {
        let limit = limit.unwrap_or(i64::MAX);
        let rows: Vec<JobRow> = match state_filter {
            Some(state) => {
                sqlx::query_as(
                    "SELECT * FROM jobs WHERE state = ?1 ORDER BY created_at ASC LIMIT ?2",
                )
                .bind(state.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM jobs ORDER BY created_at ASC LIMIT ?1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Job::try_from).collect()
    }

    pub async fn status_counts(&self) -> Result<std::collections::HashMap<JobState, i64>, StoreError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = std::collections::HashMap::new();
        for state in JobState::all() {
            counts.insert(state, 0);
        }
        for (state, count) in rows {
            counts.insert(JobState::from_str(&state)?, count);
        }
        Ok(counts)
    }

    pub async fn active_worker_count(
        &self,
        now: DateTime<Utc>,
        heartbeat_ttl: std::time::Duration,
    ) -> Result<i64, StoreError> {
        let cutoff = now - chrono::Duration::from_std(heartbeat_ttl).unwrap_or_default();
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM workers WHERE status = 'running' AND last_heartbeat >= ?1",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    pub async fn register_worker(&self, worker_id: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO workers (worker_id, started_at, last_heartbeat, status)
            VALUES (?1, ?2, ?2, 'running')
            ON CONFLICT (worker_id) DO UPDATE SET
                started_at = excluded.started_at,
                last_heartbeat = excluded.last_heartbeat,
                status = excluded.status
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn heartbeat(&self, worker_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE workers SET last_heartbeat = ?1 WHERE worker_id = ?2",
        )
        .bind(now)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(worker_id, "heartbeat for unregistered worker");
        }
        Ok(())
    }

    pub async fn mark_stopped(&self, worker_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE workers SET status = 'stopped' WHERE worker_id = ?1")
            .bind(worker_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Look up a single worker's registry row. Mainly useful for tests and operator tooling; the
    /// worker supervisor itself only ever writes its own row.
    pub async fn get_worker(&self, worker_id: &str) -> Result<Option<Worker>, StoreError> {
        let row: Option<(String, DateTime<Utc>, DateTime<Utc>, String)> = sqlx::query_as(
            "SELECT worker_id, started_at, last_heartbeat, status FROM workers WHERE worker_id = ?1",
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(worker_id, started_at, last_heartbeat, status)| {
            Ok(Worker {
                worker_id,
                started_at,
                last_heartbeat,
                status: WorkerStatus::from_str(&status)?,
            })
        })
        .transpose()
    }

    pub async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM config WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO config (key, value) VALUES (?1, ?2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_config_max_retries(&self) -> Result<i64, StoreError> {
        match self.get_config("max_retries").await? {
            Some(v) => Ok(v.parse().unwrap_or(3)),
            None => Ok(3),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
