use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::store::JobStats;
use crate::error::PersistenceError;
use crate::job::models::{JobExecution, Reading};

/// Database representation of a job execution
#[derive(Debug, FromRow)]
pub struct JobExecutionRow {
    pub id: Uuid,
    pub job_name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub records_processed: i64,
    pub error_message: Option<String>,
}

impl TryFrom<JobExecutionRow> for JobExecution {
    type Error = PersistenceError;

    fn try_from(row: JobExecutionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| PersistenceError::CorruptRow(format!("job_executions {}: {}", row.id, e)))?;
        Ok(JobExecution {
            id: row.id,
            job_name: row.job_name,
            status,
            started_at: row.started_at,
            finished_at: row.finished_at,
            records_processed: row.records_processed,
            error_message: row.error_message,
        })
    }
}

/// Database representation of a reading
#[derive(Debug, FromRow)]
pub struct ReadingRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub source: String,
    pub value: f64,
    pub quality: String,
    pub details: serde_json::Value,
    pub collected_at: DateTime<Utc>,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = PersistenceError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        let quality = row
            .quality
            .parse()
            .map_err(|e| PersistenceError::CorruptRow(format!("readings {}: {}", row.id, e)))?;
        Ok(Reading {
            id: row.id,
            execution_id: row.execution_id,
            source: row.source,
            value: row.value,
            quality,
            details: row.details,
            collected_at: row.collected_at,
        })
    }
}

/// One row of the per-job aggregate query
#[derive(Debug, FromRow)]
pub struct JobStatsRow {
    pub job_name: String,
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub today: i64,
    pub last_started_at: Option<DateTime<Utc>>,
}

impl From<JobStatsRow> for JobStats {
    fn from(row: JobStatsRow) -> Self {
        JobStats {
            job_name: row.job_name,
            total: row.total,
            successful: row.successful,
            failed: row.failed,
            today: row.today,
            last_started_at: row.last_started_at,
        }
    }
}
