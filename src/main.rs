use actix_web::{App, HttpServer, web};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use datalake_native::api::{health::health_config, job::{job_config, JobService}, validation};
use datalake_native::app::AppContext;
use datalake_native::config::{self, StorageBackend};
use datalake_native::db::{self, ExecutionStore};
use datalake_native::shutdown::ShutdownCoordinator;
use datalake_native::telemetry;

mod cli;
use crate::cli::{Cli, Command};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = config::Config::from_env()
        .map_err(anyhow::Error::msg)
        .context("Failed to load configuration")?;

    telemetry::init_tracing(&config.log_dir).context("Failed to initialize logging")?;

    match cli.command() {
        Command::Serve => serve(config).await,
        Command::Migrate => migrate(&config).await,
        Command::Run { job } => run_once(&config, job).await,
        Command::Reconcile => {
            let ctx = AppContext::build(&config).await?;
            let reconciled = ctx.reconcile_interrupted().await?;
            println!("Reconciled {} interrupted executions", reconciled);
            ctx.store.close().await;
            Ok(())
        }
    }
}

async fn migrate(config: &config::Config) -> anyhow::Result<()> {
    if config.storage_backend == StorageBackend::Memory {
        info!("Memory backend selected; nothing to migrate");
        return Ok(());
    }
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for migrations")?;
    let pool = db::connection::get_connection(url, config.max_db_connections)
        .await
        .context("Failed to connect to database")?;
    db::migrations::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    pool.close().await;
    Ok(())
}

async fn run_once(config: &config::Config, job: &str) -> anyhow::Result<()> {
    let ctx = AppContext::build(config).await?;
    let result = ctx.scheduler.runner().run(job).await;
    ctx.store.close().await;

    let execution = result?;
    println!("{}", serde_json::to_string_pretty(&execution)?);
    Ok(())
}

async fn serve(config: config::Config) -> anyhow::Result<()> {
    info!("Starting datalake-native");
    info!("Configuration loaded successfully:");
    info!("  - Storage backend: {:?}", config.storage_backend);
    info!("  - Weather city: {}", config.weather_city);
    info!("  - Weather interval: {:?}", config.weather_interval);
    info!("  - Store timezone: {}", config.timezone);

    let ctx = AppContext::build(&config).await?;

    if config.reconcile_on_startup {
        ctx.reconcile_interrupted().await?;
    }

    if config.initial_collection {
        if let Err(e) = ctx.initial_collection().await {
            error!("Initial collection failed: {:#}", e);
        }
    }

    ctx.scheduler.start()?;

    let job_service = web::Data::new(JobService::new(ctx.scheduler.clone(), ctx.metrics.clone()));
    let store_data: web::Data<dyn ExecutionStore> = web::Data::from(Arc::clone(&ctx.store));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(job_service.clone())
            .app_data(store_data.clone())
            .app_data(validation::query_config()) // Global query validation config
            .configure(health_config) // Health check endpoints
            .configure(job_config)
    });

    info!("Server starting on http://{}:{}", config.host, config.port);

    let server = server
        .bind((config.host.as_str(), config.port))?
        .run();

    // Get server handle for graceful shutdown
    let server_handle = server.handle();

    // Spawn server in background
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        ctx.scheduler.clone(),
        ctx.store.clone(),
    );

    coordinator.wait_for_shutdown().await?;
    Ok(())
}
