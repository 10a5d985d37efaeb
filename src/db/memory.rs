use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::db::store::{ExecutionStore, JobStats};
use crate::error::PersistenceError;
use crate::job::models::{bounded_error_message, ExecutionStatus, JobExecution, Reading};

#[derive(Default)]
struct MemoryState {
    // Insertion order doubles as the tie-breaker for equal start times.
    executions: Vec<JobExecution>,
    readings: Vec<Reading>,
}

/// Process-local store for development and tests.
///
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, PersistenceError> {
        self.state
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn append_execution(&self, execution: &JobExecution) -> Result<(), PersistenceError> {
        let mut state = self.lock()?;
        if state.executions.iter().any(|e| e.id == execution.id) {
            return Err(PersistenceError::DuplicateExecution(execution.id));
        }
        debug!("Appending execution {} ({})", execution.id, execution.job_name);
        state.executions.push(execution.clone());
        Ok(())
    }

    async fn complete_execution(
        &self,
        execution: &JobExecution,
        reading: Option<&Reading>,
    ) -> Result<(), PersistenceError> {
        let mut state = self.lock()?;
        let stored = state
            .executions
            .iter_mut()
            .find(|e| e.id == execution.id && !e.is_terminal())
            .ok_or(PersistenceError::NotInFlight(execution.id))?;
        *stored = execution.clone();
        if let Some(reading) = reading {
            state.readings.push(reading.clone());
        }
        debug!("Completed execution {} as {}", execution.id, execution.status);
        Ok(())
    }

    async fn recent_executions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobExecution>, PersistenceError> {
        let state = self.lock()?;
        let mut ordered: Vec<&JobExecution> = state.executions.iter().rev().collect();
        // Stable sort keeps later inserts first among equal start times.
        ordered.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(ordered
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_executions(&self) -> Result<i64, PersistenceError> {
        Ok(self.lock()?.executions.len() as i64)
    }

    async fn execution_stats(
        &self,
        day_start: DateTime<Utc>,
    ) -> Result<Vec<JobStats>, PersistenceError> {
        let state = self.lock()?;
        let mut per_job: BTreeMap<&str, JobStats> = BTreeMap::new();
        for execution in &state.executions {
            let stats = per_job
                .entry(execution.job_name.as_str())
                .or_insert_with(|| JobStats {
                    job_name: execution.job_name.clone(),
                    total: 0,
                    successful: 0,
                    failed: 0,
                    today: 0,
                    last_started_at: None,
                });
            stats.total += 1;
            match execution.status {
                ExecutionStatus::Success => stats.successful += 1,
                ExecutionStatus::Failure => stats.failed += 1,
                ExecutionStatus::Pending | ExecutionStatus::Running => {}
            }
            if execution.started_at >= day_start {
                stats.today += 1;
            }
            stats.last_started_at = stats.last_started_at.max(Some(execution.started_at));
        }
        Ok(per_job.into_values().collect())
    }

    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, PersistenceError> {
        let state = self.lock()?;
        let mut readings: Vec<Reading> = state
            .readings
            .iter()
            .filter(|r| r.collected_at >= since)
            .cloned()
            .collect();
        readings.sort_by(|a, b| a.collected_at.cmp(&b.collected_at));
        Ok(readings)
    }

    async fn reading_for_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<Reading>, PersistenceError> {
        let state = self.lock()?;
        Ok(state
            .readings
            .iter()
            .find(|r| r.execution_id == execution_id)
            .cloned())
    }

    async fn reconcile_interrupted(
        &self,
        before: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, PersistenceError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let mut reconciled = 0;
        for execution in state
            .executions
            .iter_mut()
            .filter(|e| !e.is_terminal() && e.started_at < before)
        {
            execution.status = ExecutionStatus::Failure;
            execution.finished_at = Some(now.max(execution.started_at + chrono::Duration::microseconds(1)));
            execution.error_message = Some(bounded_error_message(message));
            reconciled += 1;
        }
        Ok(reconciled)
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        self.lock().map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
