use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::store::ExecutionStore;
use crate::error::RunError;
use super::models::JobExecution;
use super::registry::JobRegistry;

const PANIC_MESSAGE: &str = "collector panicked";

/// Executes registered jobs and records every attempt
///
/// # Behavior
/// - Rejects unknown job names before anything is written
/// - Appends a RUNNING execution, then awaits the collector
/// - Records SUCCESS (plus the reading, if any) or FAILURE in one store call
///
/// Collector errors and panics become FAILURE records and never reach the
/// caller. Only store failures are returned as errors.
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    store: Arc<dyn ExecutionStore>,
}

impl JobRunner {
    pub fn new(registry: Arc<JobRegistry>, store: Arc<dyn ExecutionStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run `job_name` once and return its terminal execution record
    pub async fn run(&self, job_name: &str) -> Result<JobExecution, RunError> {
        let job = self.registry.get(job_name)?;

        let mut execution = JobExecution::start(&job.name);
        self.store.append_execution(&execution).await.map_err(|e| {
            error!("Failed to record start of job {}: {}", job.name, e);
            e
        })?;
        info!("Started job {} (execution {})", job.name, execution.id);

        // Run on its own task so a panicking collector only fails this execution.
        let collector = job.collector.clone();
        let outcome = tokio::spawn(async move { collector.collect().await }).await;

        let finished_at = Utc::now();
        let reading = match outcome {
            Ok(Ok(collected)) => {
                execution.succeed(finished_at, collected.records_processed);
                collected.reading.map(|r| r.into_reading(execution.id))
            }
            Ok(Err(e)) => {
                warn!("Job {} failed: {}", job.name, e);
                execution.fail(finished_at, &e.to_string());
                None
            }
            Err(e) => {
                error!("Collector for job {} did not complete: {}", job.name, e);
                execution.fail(finished_at, PANIC_MESSAGE);
                None
            }
        };

        self.store
            .complete_execution(&execution, reading.as_ref())
            .await
            .map_err(|e| {
                error!("Failed to record outcome of job {} (execution {}): {}", job.name, execution.id, e);
                e
            })?;

        info!(
            "Finished job {}: status={}, records={}, duration={:?}s",
            job.name,
            execution.status,
            execution.records_processed,
            execution.duration_seconds()
        );
        Ok(execution)
    }
}
