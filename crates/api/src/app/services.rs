//! Store, signal and queue wiring behind the orchestrator.

use std::sync::Arc;

use docket_infra::{
    InfraConfig, JobOrchestrator,
    job_store::{InMemoryJobStore, JobStore},
    queue::{InMemoryWorkQueue, WorkQueue},
    signals::{InMemorySignalStore, JobSignals, SignalStore},
};

#[cfg(feature = "redis")]
use docket_infra::{
    job_store::PostgresJobStore,
    queue::RedisWorkQueue,
    redis_client::RedisConnector,
    signals::RedisSignalStore,
};
#[cfg(feature = "redis")]
use sqlx::PgPool;

/// Shared handles used by the HTTP handlers.
///
/// The store, signals and queue are exposed next to the orchestrator so an
/// in-process worker (or a test standing in for one) can share them.
#[derive(Clone)]
pub struct AppServices {
    pub orchestrator: JobOrchestrator,
    pub store: Arc<dyn JobStore>,
    pub signals: JobSignals,
    pub queue: Arc<dyn WorkQueue>,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn JobStore>,
        signals: JobSignals,
        queue: Arc<dyn WorkQueue>,
        config: &InfraConfig,
    ) -> Self {
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            signals.clone(),
            queue.clone(),
            config.orchestrator.clone(),
        );
        Self {
            orchestrator,
            store,
            signals,
            queue,
        }
    }
}

pub async fn build_services(config: &InfraConfig) -> anyhow::Result<AppServices> {
    if config.use_persistent_stores {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services(config).await;
        }

        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
            );
        }
    }

    Ok(build_in_memory_services(config))
}

pub fn build_in_memory_services(config: &InfraConfig) -> AppServices {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let signal_store: Arc<dyn SignalStore> = Arc::new(InMemorySignalStore::new());
    let queue: Arc<dyn WorkQueue> = Arc::new(InMemoryWorkQueue::new(config.queue.retention));
    let signals = JobSignals::new(signal_store, config.signal_ttls);

    tracing::info!("using in-memory job store, signals and queue");
    AppServices::new(store, signals, queue, config)
}

#[cfg(feature = "redis")]
async fn build_persistent_services(config: &InfraConfig) -> anyhow::Result<AppServices> {
    use anyhow::Context;

    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;

    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    let job_store = PostgresJobStore::new(pool);
    job_store
        .ensure_schema()
        .await
        .context("failed to bootstrap the job schema")?;

    let redis = RedisConnector::open(&config.redis_url, config.redis_key_prefix.clone())
        .context("invalid REDIS_URL")?;

    let store: Arc<dyn JobStore> = Arc::new(job_store);
    let signal_store: Arc<dyn SignalStore> = Arc::new(RedisSignalStore::new(redis.clone()));
    let queue: Arc<dyn WorkQueue> = Arc::new(RedisWorkQueue::new(redis, config.queue.retention));
    let signals = JobSignals::new(signal_store, config.signal_ttls);

    tracing::info!("using Postgres job store with Redis signals and queue");
    Ok(AppServices::new(store, signals, queue, config))
}
