use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::validation::ErrorResponse;
use crate::error::{ConfigurationError, PersistenceError, RunError};
use crate::job::models::{ExecutionStatus, Reading};
use crate::metrics::{MetricsAggregator, StorageInfo};
use crate::worker::{Scheduler, TriggerOutcome};
use super::dto::{ExecutionPageResponse, ExecutionResponse, MetricsResponse, TriggerResponse};

/// Service-level errors
#[derive(Debug)]
pub enum ServiceError {
    /// The execution store failed
    DatabaseError(PersistenceError),

    /// The request named a job that is not registered
    Configuration(ConfigurationError),

    /// The job is in flight; the trigger was skipped
    AlreadyRunning(String),

    /// The run ended without an outcome
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::DatabaseError(e) => write!(f, "Database error: {}", e),
            ServiceError::Configuration(e) => write!(f, "Configuration error: {}", e),
            ServiceError::AlreadyRunning(name) => write!(f, "Job already running: {}", name),
            ServiceError::Internal(message) => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<PersistenceError> for ServiceError {
    fn from(e: PersistenceError) -> Self {
        ServiceError::DatabaseError(e)
    }
}

impl From<RunError> for ServiceError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::Configuration(e) => ServiceError::Configuration(e),
            RunError::Persistence(e) => ServiceError::DatabaseError(e),
            e @ RunError::Aborted(_) => ServiceError::Internal(e.to_string()),
        }
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::DatabaseError(e) => {
                error!("Database error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Database error occurred"}),
                })
            }
            ServiceError::Configuration(ConfigurationError::UnknownJob(name)) => {
                warn!("Job not found: {}", name);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": format!("Job {} not found", name)}),
                })
            }
            ServiceError::Configuration(e) => {
                warn!("Configuration error: {}", e);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Invalid job".to_string(),
                    fields: serde_json::json!({"message": e.to_string()}),
                })
            }
            ServiceError::AlreadyRunning(name) => {
                warn!("Job already running: {}", name);
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Job already running".to_string(),
                    fields: serde_json::json!({
                        "message": format!("Job {} is already running; trigger skipped", name)
                    }),
                })
            }
            ServiceError::Internal(message) => {
                error!("Internal error: {}", message);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Internal error occurred"}),
                })
            }
        }
    }
}

/// Job service behind the HTTP handlers
pub struct JobService {
    scheduler: Arc<Scheduler>,
    metrics: Arc<MetricsAggregator>,
}

impl JobService {
    /// Create a new JobService instance
    pub fn new(scheduler: Arc<Scheduler>, metrics: Arc<MetricsAggregator>) -> Self {
        Self { scheduler, metrics }
    }

    /// Dashboard summary
    pub async fn summary(&self) -> Result<MetricsResponse, ServiceError> {
        let metrics = self.metrics.summary().await?;
        Ok(MetricsResponse::from(metrics))
    }

    /// Page of the execution history, most recent first
    pub async fn list_executions(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<ExecutionPageResponse, ServiceError> {
        let page = self.metrics.execution_page(page, per_page).await?;
        Ok(ExecutionPageResponse::from(page))
    }

    /// Run a job now and report its execution
    ///
    /// # Returns
    /// - `Ok(TriggerResponse)` - The run finished; its status may still be FAILURE
    /// - `Err(ServiceError)` - Unknown job, job in flight, or store failure
    pub async fn trigger(&self, job_name: &str) -> Result<TriggerResponse, ServiceError> {
        info!("Service: Manual trigger requested for job={}", job_name);

        match self.scheduler.trigger(job_name).await? {
            TriggerOutcome::Completed(execution) => {
                let message = match execution.status {
                    ExecutionStatus::Success => format!("Job {} executed successfully", job_name),
                    status => format!("Job {} finished with status {}", job_name, status),
                };
                Ok(TriggerResponse {
                    message,
                    execution: ExecutionResponse::from(execution),
                })
            }
            TriggerOutcome::Skipped => Err(ServiceError::AlreadyRunning(job_name.to_string())),
        }
    }

    /// Readings from the last `hours` hours
    pub async fn readings(&self, hours: u32) -> Result<Vec<Reading>, ServiceError> {
        Ok(self.metrics.recent_readings(hours).await?)
    }

    pub async fn storage_info(&self) -> Result<StorageInfo, ServiceError> {
        Ok(self.metrics.storage_info().await?)
    }
}
