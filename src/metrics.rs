//! Summary statistics over the execution history.
//!
//! Every call reads the store afresh; nothing is cached.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::db::store::{ExecutionStore, JobStats};
use crate::error::PersistenceError;
use crate::job::models::{JobExecution, Reading};

/// Per-job slice of the summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMetrics {
    pub job_name: String,
    pub total_jobs: i64,
    pub successful_jobs: i64,
    pub failed_jobs: i64,
    pub jobs_today: i64,
    pub success_rate: f64,
    pub last_started_at: Option<DateTime<Utc>>,
}

/// Dashboard summary
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_jobs: i64,
    pub successful_jobs: i64,
    pub failed_jobs: i64,
    pub jobs_today: i64,
    /// Percentage of completed executions that succeeded, one decimal place
    pub success_rate: f64,
    pub last_execution: Option<JobExecution>,
    pub jobs: Vec<JobMetrics>,
}

/// One page of the execution history
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPage {
    pub executions: Vec<JobExecution>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
}

/// What backs the history and how much it holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageInfo {
    pub storage_type: &'static str,
    pub total_executions: i64,
    /// Readings collected in the last 24 hours
    pub readings_last_day: usize,
}

pub struct MetricsAggregator {
    store: Arc<dyn ExecutionStore>,
    timezone: FixedOffset,
}

impl MetricsAggregator {
    /// `timezone` decides where "today" begins
    pub fn new(store: Arc<dyn ExecutionStore>, timezone: FixedOffset) -> Self {
        Self { store, timezone }
    }

    pub async fn summary(&self) -> Result<Metrics, PersistenceError> {
        self.summary_at(Utc::now()).await
    }

    /// Summary as seen at `now`
    pub async fn summary_at(&self, now: DateTime<Utc>) -> Result<Metrics, PersistenceError> {
        let day_start = start_of_day(now, self.timezone);
        let stats = self.store.execution_stats(day_start).await?;
        let last_execution = self.store.recent_executions(1, 0).await?.into_iter().next();

        let total_jobs = stats.iter().map(|s| s.total).sum();
        let successful_jobs = stats.iter().map(|s| s.successful).sum();
        let failed_jobs = stats.iter().map(|s| s.failed).sum();
        let jobs_today = stats.iter().map(|s| s.today).sum();

        Ok(Metrics {
            total_jobs,
            successful_jobs,
            failed_jobs,
            jobs_today,
            success_rate: success_rate(successful_jobs, failed_jobs),
            last_execution,
            jobs: stats.into_iter().map(JobMetrics::from).collect(),
        })
    }

    /// The `limit` most recent executions, newest first
    pub async fn job_executions(&self, limit: u32) -> Result<Vec<JobExecution>, PersistenceError> {
        self.store.recent_executions(i64::from(limit), 0).await
    }

    /// Page `page` (1-based) of the history with `per_page` entries each
    pub async fn execution_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<ExecutionPage, PersistenceError> {
        let page = i64::from(page.max(1));
        let per_page = i64::from(per_page.max(1));

        let total = self.store.count_executions().await?;
        let executions = self
            .store
            .recent_executions(per_page, (page - 1) * per_page)
            .await?;

        Ok(ExecutionPage {
            executions,
            total,
            pages: (total + per_page - 1) / per_page,
            current_page: page,
        })
    }

    /// Readings collected during the last `hours` hours, oldest first
    pub async fn recent_readings(&self, hours: u32) -> Result<Vec<Reading>, PersistenceError> {
        let since = Utc::now() - Duration::hours(i64::from(hours));
        self.store.readings_since(since).await
    }

    pub async fn storage_info(&self) -> Result<StorageInfo, PersistenceError> {
        Ok(StorageInfo {
            storage_type: self.store.backend(),
            total_executions: self.store.count_executions().await?,
            readings_last_day: self.recent_readings(24).await?.len(),
        })
    }
}

impl From<JobStats> for JobMetrics {
    fn from(stats: JobStats) -> Self {
        JobMetrics {
            success_rate: success_rate(stats.successful, stats.failed),
            job_name: stats.job_name,
            total_jobs: stats.total,
            successful_jobs: stats.successful,
            failed_jobs: stats.failed,
            jobs_today: stats.today,
            last_started_at: stats.last_started_at,
        }
    }
}

/// successful / (successful + failed) as a percentage; 0 when nothing completed
pub fn success_rate(successful: i64, failed: i64) -> f64 {
    let completed = successful + failed;
    if completed <= 0 {
        return 0.0;
    }
    let rate = successful as f64 / completed as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// Midnight of `now`'s calendar day in `timezone`, as UTC
pub fn start_of_day(now: DateTime<Utc>, timezone: FixedOffset) -> DateTime<Utc> {
    // A fixed offset maps every local time to exactly one instant.
    now.with_timezone(&timezone)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| timezone.from_local_datetime(&midnight).single())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now)
}
