//! Binary entry point for one worker process. Adapted from `hook_worker::main`: init tracing,
//! load config, open the store, build the supervisor, install signal handlers, run.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use envconfig::Envconfig;
use queuectl_core::store::Store;
use queuectl_worker::config::WorkerConfig;
use queuectl_worker::supervisor::WorkerSupervisor;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = WorkerConfig::init_from_env()?;
    let db_path = config.resolve_db_path();
    let store = Arc::new(Store::connect(&db_path).await?);

    let supervisor = WorkerSupervisor::new(
        store,
        config.lease_ttl.0,
        config.poll_interval.0,
        config.heartbeat_interval.0,
        config.exec_timeout.0,
    );

    tracing::info!(
        worker_id = supervisor.worker_id(),
        worker_name = %config.worker_name,
        db_path = %db_path.display(),
        "starting worker"
    );

    let shutdown = supervisor.shutdown_handle();
    tokio::spawn(async move {
        install_shutdown_signal_handler(shutdown).await;
    });

    supervisor.run().await?;
    Ok(())
}

/// Wait for an interrupt or termination request and flip the shutdown flag. The supervisor loop
/// only observes this flag between iterations, so an in-flight job always runs to completion (or
/// its own timeout) before the process exits — a second identical signal does not change that.
async fn install_shutdown_signal_handler(shutdown: Arc<std::sync::atomic::AtomicBool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown requested, finishing in-flight job before exiting");
    shutdown.store(true, Ordering::SeqCst);
}
