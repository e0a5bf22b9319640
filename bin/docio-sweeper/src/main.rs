//! DocIO Sweeper
//!
//! This binary runs the periodic retry sweep over the dead-letter queues
//! and, when enabled, the background record/object reconcile sweep.

use anyhow::{Context, Result};
use clap::Parser;
use docio_common::Config;
use docio_engine::{
    EngineDispatcher, HandlerTarget, LifecycleEngine, MemoryQueue, QueueBinding, ReconcileEngine,
    RetryCoordinator,
};
use docio_object_store::MemoryObjectStore;
use docio_record_store::RedbRecordStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docio-sweeper")]
#[command(about = "DocIO retry and reconcile sweeper")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/docio/sweeper.toml")]
    config: String,

    /// Bucket holding document content and metadata objects
    #[arg(short, long, default_value = "documents")]
    bucket: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(path: &str) -> Result<Config> {
    if !Path::new(path).exists() {
        info!("no config file at {path}, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    toml::from_str(&raw).with_context(|| format!("parsing {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DocIO Sweeper");

    let config = load_config(&args.config)?;

    let records: Arc<RedbRecordStore> = Arc::new(
        RedbRecordStore::open(&config.record_store.path)
            .with_context(|| format!("opening record store at {:?}", config.record_store.path))?,
    );
    let objects = Arc::new(MemoryObjectStore::new());

    let reconcile = Arc::new(ReconcileEngine::new(
        records.clone(),
        objects.clone(),
        config.backoff,
    ));
    let lifecycle = Arc::new(LifecycleEngine::new(
        records.clone(),
        objects.clone(),
        args.bucket.clone(),
    ));
    let dispatcher = Arc::new(EngineDispatcher::new(reconcile, lifecycle.clone()));

    let coordinator = RetryCoordinator::new(
        dispatcher,
        Arc::new(MemoryQueue::new("manual-check")),
        vec![
            QueueBinding {
                queue: Arc::new(MemoryQueue::new("dlq-object-created")),
                target: HandlerTarget::Reconcile,
                synchronous: true,
            },
            QueueBinding {
                queue: Arc::new(MemoryQueue::new("dlq-restore-completed")),
                target: HandlerTarget::RestoreEvents,
                synchronous: true,
            },
        ],
        config.retry,
    );

    info!(
        interval_secs = config.sweeper.interval_secs,
        reconcile_sweep = config.sweeper.reconcile_sweep,
        "sweeper configured"
    );

    let mut ticker = tokio::time::interval(config.sweeper.interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = coordinator.run_sweep().await;
                info!(
                    processed = summary.total_processed(),
                    quarantined = summary.total_quarantined(),
                    "retry sweep done"
                );
                if config.sweeper.reconcile_sweep {
                    match lifecycle.reconcile_sweep(config.sweeper.reconcile_batch).await {
                        Ok(report) => info!(
                            examined = report.examined,
                            healed = report.healed,
                            orphans_removed = report.orphans_removed,
                            "reconcile sweep done"
                        ),
                        Err(e) => warn!("reconcile sweep failed: {e}"),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    info!("Sweeper shut down gracefully");
    Ok(())
}
