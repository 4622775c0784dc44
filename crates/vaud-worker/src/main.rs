//! Audio conversion worker binary.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vaud_firestore::{FirestoreClient, JobRepository};
use vaud_ledger::LedgerConfig;
use vaud_media::FfmpegEngine;
use vaud_queue::RedisBroker;
use vaud_storage::AssetStorage;
use vaud_store::{JobStore, PgLogStore};
use vaud_worker::{metrics, JobProcessor, JobWorker, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting vaud-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
        info!("Metrics listening on :{}", port);
    }

    let storage = AssetStorage::from_env();
    storage
        .ensure_dirs()
        .await
        .context("Failed to create storage directories")?;

    let engine = FfmpegEngine::with_binary(config.ffmpeg_bin.clone());
    match engine.locate() {
        Ok(path) => info!("Using FFmpeg at {}", path.display()),
        // Jobs will fail with this message until the binary shows up.
        Err(e) => warn!("{}", e),
    }

    let firestore = FirestoreClient::from_env()
        .await
        .context("Failed to create Firestore client")?;
    let state = JobRepository::from_env(firestore);

    let pool = vaud_ledger::create_pool(&LedgerConfig::from_env())
        .await
        .context("Failed to connect to ledger database")?;
    vaud_ledger::run_migrations(&pool)
        .await
        .context("Failed to run ledger migrations")?;

    let store = JobStore::new(Arc::new(state), Arc::new(PgLogStore::new(pool)));
    let processor = JobProcessor::new(store, Arc::new(engine), storage, config.settings);

    let broker = RedisBroker::from_env().context("Failed to create queue client")?;
    let worker = JobWorker::new(broker, processor, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await?;

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("vaud=info"))?;

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
