use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::db::memory::MemoryStore;
use crate::db::store::{ExecutionStore, JobStats};
use crate::error::PersistenceError;
use crate::job::models::{JobExecution, Reading};

/// Memory store that rejects selected writes
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_append: bool,
    fail_complete: bool,
    appends: AtomicUsize,
}

impl FaultyStore {
    /// Every append fails
    pub fn read_only() -> Self {
        Self {
            fail_append: true,
            fail_complete: true,
            ..Self::default()
        }
    }

    /// Appends succeed, completions fail
    pub fn failing_completion() -> Self {
        Self {
            fail_complete: true,
            ..Self::default()
        }
    }

    /// Number of append attempts so far
    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

fn disk_full() -> PersistenceError {
    PersistenceError::Unavailable("disk full".to_string())
}

#[async_trait]
impl ExecutionStore for FaultyStore {
    async fn append_execution(&self, execution: &JobExecution) -> Result<(), PersistenceError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if self.fail_append {
            return Err(disk_full());
        }
        self.inner.append_execution(execution).await
    }

    async fn complete_execution(
        &self,
        execution: &JobExecution,
        reading: Option<&Reading>,
    ) -> Result<(), PersistenceError> {
        if self.fail_complete {
            return Err(disk_full());
        }
        self.inner.complete_execution(execution, reading).await
    }

    async fn recent_executions(&self, limit: i64, offset: i64) -> Result<Vec<JobExecution>, PersistenceError> {
        self.inner.recent_executions(limit, offset).await
    }

    async fn count_executions(&self) -> Result<i64, PersistenceError> {
        self.inner.count_executions().await
    }

    async fn execution_stats(&self, day_start: DateTime<Utc>) -> Result<Vec<JobStats>, PersistenceError> {
        self.inner.execution_stats(day_start).await
    }

    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, PersistenceError> {
        self.inner.readings_since(since).await
    }

    async fn reading_for_execution(&self, execution_id: Uuid) -> Result<Option<Reading>, PersistenceError> {
        self.inner.reading_for_execution(execution_id).await
    }

    async fn reconcile_interrupted(&self, before: DateTime<Utc>, message: &str) -> Result<u64, PersistenceError> {
        self.inner.reconcile_interrupted(before, message).await
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        if self.fail_append {
            return Err(disk_full());
        }
        self.inner.ping().await
    }

    fn backend(&self) -> &'static str {
        "faulty"
    }
}
