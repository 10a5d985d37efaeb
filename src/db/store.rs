use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PersistenceError;
use crate::job::models::{JobExecution, Reading};

/// Per-job execution counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStats {
    pub job_name: String,
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    /// Executions started at or after the requested day start
    pub today: i64,
    pub last_started_at: Option<DateTime<Utc>>,
}

/// Storage for execution history and readings.
///
/// The job runner is the only writer. Everything else reads.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a freshly started (non-terminal) execution
    async fn append_execution(&self, execution: &JobExecution) -> Result<(), PersistenceError>;

    /// Move a stored execution to its terminal state and store its reading, as one unit
    async fn complete_execution(
        &self,
        execution: &JobExecution,
        reading: Option<&Reading>,
    ) -> Result<(), PersistenceError>;

    /// Executions ordered by start time, most recent first
    async fn recent_executions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobExecution>, PersistenceError>;

    async fn count_executions(&self) -> Result<i64, PersistenceError>;

    /// Counters for every job that has at least one execution, in name order
    async fn execution_stats(
        &self,
        day_start: DateTime<Utc>,
    ) -> Result<Vec<JobStats>, PersistenceError>;

    /// Readings collected at or after `since`, oldest first
    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, PersistenceError>;

    async fn reading_for_execution(
        &self,
        execution_id: uuid::Uuid,
    ) -> Result<Option<Reading>, PersistenceError>;

    /// Mark non-terminal executions started before `before` as FAILURE
    async fn reconcile_interrupted(
        &self,
        before: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, PersistenceError>;

    async fn ping(&self) -> Result<(), PersistenceError>;

    /// Short name of the backend, e.g. `postgres`
    fn backend(&self) -> &'static str;

    async fn close(&self) {}
}
