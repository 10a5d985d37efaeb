use async_trait::async_trait;

use crate::error::CollectionError;
use super::models::NewReading;

/// What a collector hands back after a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub records_processed: u32,
    pub reading: Option<NewReading>,
}

impl Collected {
    /// A single reading, counted as one processed record
    pub fn reading(reading: NewReading) -> Self {
        Self {
            records_processed: 1,
            reading: Some(reading),
        }
    }

    /// A job that only reports how many records it touched
    pub fn count(records_processed: u32) -> Self {
        Self {
            records_processed,
            reading: None,
        }
    }
}

/// Capability that performs the actual work behind a job.
///
/// The runner knows nothing about what a collector does; it only awaits
/// `collect` and records the outcome.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self) -> Result<Collected, CollectionError>;
}
