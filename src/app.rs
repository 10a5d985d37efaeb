use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

use crate::collectors::{WeatherCollector, WEATHER_JOB};
use crate::config::{Config, StorageBackend};
use crate::db::{self, ExecutionRepository, ExecutionStore, MemoryStore};
use crate::error::PersistenceError;
use crate::job::{JobRegistry, JobRunner};
use crate::metrics::MetricsAggregator;
use crate::worker::Scheduler;

/// Message recorded on executions a previous process left unfinished
pub const INTERRUPTED_MESSAGE: &str = "interrupted: process stopped before the run completed";

/// Everything the HTTP layer and CLI need, built once per process
pub struct AppContext {
    pub store: Arc<dyn ExecutionStore>,
    pub scheduler: Arc<Scheduler>,
    pub metrics: Arc<MetricsAggregator>,
    pub started_at: DateTime<Utc>,
}

impl AppContext {
    /// Connect the configured store (running migrations for postgres) and register the jobs
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let store = open_store(config).await?;

        let mut registry = JobRegistry::new();
        registry.register(
            WEATHER_JOB,
            WeatherCollector::new(&config.weather_city).with_outage_rate(config.weather_outage_rate),
            config.weather_interval,
        )?;

        Ok(Self::from_parts(store, registry, config))
    }

    pub fn from_parts(store: Arc<dyn ExecutionStore>, registry: JobRegistry, config: &Config) -> Self {
        let runner = Arc::new(JobRunner::new(Arc::new(registry), store.clone()));
        let scheduler = Arc::new(Scheduler::new(runner));
        let metrics = Arc::new(MetricsAggregator::new(store.clone(), config.timezone));
        Self {
            store,
            scheduler,
            metrics,
            started_at: Utc::now(),
        }
    }

    /// Fail executions left PENDING/RUNNING by an earlier process
    pub async fn reconcile_interrupted(&self) -> Result<u64, PersistenceError> {
        let reconciled = self
            .store
            .reconcile_interrupted(self.started_at, INTERRUPTED_MESSAGE)
            .await?;
        info!("Reconciled {} interrupted executions", reconciled);
        Ok(reconciled)
    }

    /// Run the weather job once unless a reading arrived within the last hour
    pub async fn initial_collection(&self) -> anyhow::Result<()> {
        let recent = self
            .store
            .readings_since(Utc::now() - Duration::hours(1))
            .await?;
        if !recent.is_empty() {
            info!("Skipping initial collection: {} recent readings", recent.len());
            return Ok(());
        }

        info!("Running initial collection...");
        self.scheduler.trigger(WEATHER_JOB).await?;
        Ok(())
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ExecutionStore>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using in-memory execution store (history is lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = db::connection::get_connection(url, config.max_db_connections)
                .await
                .context("Failed to connect to database")?;
            info!("Database connection pool established");

            db::migrations::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            Ok(Arc::new(ExecutionRepository::new(pool)))
        }
    }
}
