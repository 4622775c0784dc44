//! Application state.

use std::sync::Arc;

use anyhow::Context;

use vaud_firestore::{FirestoreClient, JobRepository};
use vaud_ledger::LedgerConfig;
use vaud_queue::{RedisBroker, TaskPublisher};
use vaud_storage::AssetStorage;
use vaud_store::{JobStore, PgLogStore};

use crate::config::ApiConfig;
use crate::services::{JobSubmitter, ResultRetriever};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: JobStore,
    pub submitter: JobSubmitter,
    pub retriever: ResultRetriever,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: JobStore,
        publisher: Arc<dyn TaskPublisher>,
        storage: AssetStorage,
    ) -> Self {
        let submitter = JobSubmitter::new(store.clone(), publisher, storage.clone());
        let retriever = ResultRetriever::new(store.clone(), storage, config.output_codec);
        Self {
            config,
            store,
            submitter,
            retriever,
        }
    }

    /// Wire the production backends from the environment.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = AssetStorage::from_env();
        storage
            .ensure_dirs()
            .await
            .context("Failed to create storage directories")?;

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

        let broker = RedisBroker::from_env().context("Failed to create queue client")?;
        broker.init().await.context("Failed to initialize queue")?;

        let store = JobStore::new(Arc::new(state), Arc::new(PgLogStore::new(pool)));
        Ok(Self::new(config, store, Arc::new(broker), storage))
    }
}
