use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

use crate::db::models::{JobExecutionRow, JobStatsRow, ReadingRow};
use crate::db::store::{ExecutionStore, JobStats};
use crate::error::PersistenceError;
use crate::job::models::{bounded_error_message, JobExecution, Reading};

const EXECUTION_COLUMNS: &str =
    "id, job_name, status, started_at, finished_at, records_processed, error_message";
const READING_COLUMNS: &str = "id, execution_id, source, value, quality, details, collected_at";

/// PostgreSQL-backed execution history
#[derive(Clone)]
pub struct ExecutionRepository {
    pool: Pool<Postgres>,
}

impl ExecutionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for ExecutionRepository {
    async fn append_execution(&self, execution: &JobExecution) -> Result<(), PersistenceError> {
        debug!("Inserting execution: id={}, job={}", execution.id, execution.job_name);

        let result = sqlx::query(
            r#"
            INSERT INTO job_executions
                (id, job_name, status, started_at, finished_at, records_processed, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(execution.id)
        .bind(&execution.job_name)
        .bind(execution.status.as_str())
        .bind(execution.started_at)
        .bind(execution.finished_at)
        .bind(execution.records_processed)
        .bind(&execution.error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::DuplicateExecution(execution.id));
        }
        Ok(())
    }

    async fn complete_execution(
        &self,
        execution: &JobExecution,
        reading: Option<&Reading>,
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE job_executions
            SET status = $2, finished_at = $3, records_processed = $4, error_message = $5
            WHERE id = $1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(execution.id)
        .bind(execution.status.as_str())
        .bind(execution.finished_at)
        .bind(execution.records_processed)
        .bind(&execution.error_message)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(PersistenceError::NotInFlight(execution.id));
        }

        if let Some(reading) = reading {
            sqlx::query(
                r#"
                INSERT INTO readings (id, execution_id, source, value, quality, details, collected_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(reading.id)
            .bind(reading.execution_id)
            .bind(&reading.source)
            .bind(reading.value)
            .bind(reading.quality.as_str())
            .bind(&reading.details)
            .bind(reading.collected_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Execution {} completed as {}", execution.id, execution.status);
        Ok(())
    }

    async fn recent_executions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobExecution>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM job_executions ORDER BY started_at DESC, id DESC LIMIT $1 OFFSET $2",
            EXECUTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobExecutionRow>(&query)
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobExecution::try_from).collect()
    }

    async fn count_executions(&self) -> Result<i64, PersistenceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_executions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn execution_stats(
        &self,
        day_start: DateTime<Utc>,
    ) -> Result<Vec<JobStats>, PersistenceError> {
        let rows = sqlx::query_as::<_, JobStatsRow>(
            r#"
            SELECT job_name,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'success') AS successful,
                   COUNT(*) FILTER (WHERE status = 'failure') AS failed,
                   COUNT(*) FILTER (WHERE started_at >= $1) AS today,
                   MAX(started_at) AS last_started_at
            FROM job_executions
            GROUP BY job_name
            ORDER BY job_name
            "#,
        )
        .bind(day_start)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(JobStats::from).collect())
    }

    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM readings WHERE collected_at >= $1 ORDER BY collected_at ASC",
            READING_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReadingRow>(&query)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Reading::try_from).collect()
    }

    async fn reading_for_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<Reading>, PersistenceError> {
        let query = format!("SELECT {} FROM readings WHERE execution_id = $1", READING_COLUMNS);
        let row = sqlx::query_as::<_, ReadingRow>(&query)
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Reading::try_from).transpose()
    }

    async fn reconcile_interrupted(
        &self,
        before: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            r#"
            UPDATE job_executions
            SET status = 'failure',
                finished_at = GREATEST(NOW(), started_at + INTERVAL '1 microsecond'),
                error_message = $2
            WHERE status IN ('pending', 'running') AND started_at < $1
            "#,
        )
        .bind(before)
        .bind(bounded_error_message(message))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
