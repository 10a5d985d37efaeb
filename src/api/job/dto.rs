use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::job::models::{ExecutionStatus, JobExecution};
use crate::metrics::{ExecutionPage, JobMetrics, Metrics};

/// Execution as shown to API clients, with its derived duration
#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub id: Uuid,
    pub job_name: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub records_processed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<JobExecution> for ExecutionResponse {
    fn from(execution: JobExecution) -> Self {
        Self {
            duration_seconds: execution.duration_seconds(),
            id: execution.id,
            job_name: execution.job_name,
            status: execution.status,
            started_at: execution.started_at,
            finished_at: execution.finished_at,
            records_processed: execution.records_processed,
            error_message: execution.error_message,
        }
    }
}

/// Response for a page of execution history
#[derive(Debug, Serialize)]
pub struct ExecutionPageResponse {
    pub executions: Vec<ExecutionResponse>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
}

impl From<ExecutionPage> for ExecutionPageResponse {
    fn from(page: ExecutionPage) -> Self {
        Self {
            executions: page.executions.into_iter().map(ExecutionResponse::from).collect(),
            total: page.total,
            pages: page.pages,
            current_page: page.current_page,
        }
    }
}

/// Response for the dashboard metrics
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub total_jobs: i64,
    pub successful_jobs: i64,
    pub failed_jobs: i64,
    pub jobs_today: i64,
    pub success_rate: f64,
    pub last_execution: Option<ExecutionResponse>,
    pub jobs: Vec<JobMetrics>,
}

impl From<Metrics> for MetricsResponse {
    fn from(metrics: Metrics) -> Self {
        Self {
            total_jobs: metrics.total_jobs,
            successful_jobs: metrics.successful_jobs,
            failed_jobs: metrics.failed_jobs,
            jobs_today: metrics.jobs_today,
            success_rate: metrics.success_rate,
            last_execution: metrics.last_execution.map(ExecutionResponse::from),
            jobs: metrics.jobs,
        }
    }
}

/// Response for a manual trigger
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub message: String,
    pub execution: ExecutionResponse,
}
