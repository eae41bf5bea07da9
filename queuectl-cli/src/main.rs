//! `queuectl`: a thin binary wiring `clap` subcommands straight into `QueueFacade`/`ConfigService`,
//! in the spirit of the teacher's `posthog-cli` binary and its `hook-api`/`hook-producer`
//! counterparts that exist only to expose a library's public API to a transport — here, a
//! terminal instead of HTTP. No subcommand carries logic of its own; each parses its arguments
//! and calls straight into `queuectl-core`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use queuectl_core::job::JobSpec;
use queuectl_core::store::Store;
use queuectl_core::{JobState, QueueFacade};

#[derive(Parser)]
#[command(name = "queuectl", version, about = "Submit and inspect queuectl jobs")]
struct Cli {
    /// Path to the SQLite database file. Defaults to `${HOME}/.queuectl/queuectl.db`.
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a new job.
    Enqueue {
        /// Caller-supplied unique job id.
        id: String,
        /// Shell-style command line to execute.
        command: String,
        /// Per-job override of the default retry budget.
        #[arg(long)]
        max_retries: Option<i64>,
    },
    /// List jobs, optionally filtered by state.
    List {
        #[arg(long, value_parser = parse_state)]
        state: Option<JobState>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print queue-wide counts, active worker count, and resolved configuration.
    Status,
    /// Dead Letter Queue operations.
    Dlq {
        #[command(subcommand)]
        cmd: DlqCommand,
    },
    /// Read or write a domain-level configuration key (`max_retries`, `backoff_base`).
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum DlqCommand {
    /// List jobs currently in the Dead Letter Queue.
    List {
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Move a DEAD job back to PENDING with a clean retry count.
    Retry { id: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
}

fn parse_state(s: &str) -> Result<JobState, String> {
    s.parse().map_err(|_| {
        format!(
            "invalid state {s:?}, expected one of: pending, processing, completed, failed, dead"
        )
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let db_path = match cli.db_path {
        Some(p) => std::path::PathBuf::from(p),
        None => default_db_path()?,
    };
    let store = Arc::new(Store::connect(&db_path).await.with_context(|| {
        format!("failed to open queuectl database at {}", db_path.display())
    })?);
    let queue = QueueFacade::new(store);

    match cli.command {
        Commands::Enqueue {
            id,
            command,
            max_retries,
        } => {
            queue
                .enqueue(JobSpec {
                    id: id.clone(),
                    command,
                    max_retries,
                })
                .await?;
            println!("enqueued {id}");
        }
        Commands::List { state, limit } => {
            let jobs = queue.list(state, limit).await?;
            for job in jobs {
                println!("{job:#?}");
            }
        }
        Commands::Status => {
            let status = queue.status().await?;
            println!("{status:#?}");
        }
        Commands::Dlq { cmd } => match cmd {
            DlqCommand::List { limit } => {
                let jobs = queue.dlq_list(limit).await?;
                for job in jobs {
                    println!("{job:#?}");
                }
            }
            DlqCommand::Retry { id } => {
                queue.dlq_retry(&id).await?;
                println!("revived {id}");
            }
        },
        Commands::Config { cmd } => match cmd {
            ConfigCommand::Get { key } => {
                let value = queue.config().get(&key).await?;
                println!("{key} = {value}");
            }
            ConfigCommand::Set { key, value } => {
                queue.config().set(&key, &value).await?;
                println!("{key} set to {value}");
            }
        },
    }

    Ok(())
}

fn default_db_path() -> Result<std::path::PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".queuectl").join("queuectl.db"))
}
