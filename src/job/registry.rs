use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::ConfigurationError;
use super::collector::Collector;

/// A named job: its collector and how often the scheduler fires it
#[derive(Clone)]
pub struct JobDefinition {
    pub name: String,
    pub collector: Arc<dyn Collector>,
    pub interval: Duration,
}

/// Fixed set of jobs, filled at startup before anything runs
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: BTreeMap<String, JobDefinition>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `collector` under `name`, fired every `interval` by the scheduler
    pub fn register<C>(
        &mut self,
        name: &str,
        collector: C,
        interval: Duration,
    ) -> Result<(), ConfigurationError>
    where
        C: Collector + 'static,
    {
        self.register_shared(name, Arc::new(collector), interval)
    }

    pub fn register_shared(
        &mut self,
        name: &str,
        collector: Arc<dyn Collector>,
        interval: Duration,
    ) -> Result<(), ConfigurationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigurationError::EmptyJobName);
        }
        if interval.is_zero() {
            return Err(ConfigurationError::InvalidInterval(name.to_string()));
        }
        if self.jobs.contains_key(name) {
            return Err(ConfigurationError::DuplicateJob(name.to_string()));
        }

        info!("Registered job {} (every {:?})", name, interval);
        self.jobs.insert(
            name.to_string(),
            JobDefinition {
                name: name.to_string(),
                collector,
                interval,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&JobDefinition, ConfigurationError> {
        self.jobs
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownJob(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// Registered jobs in name order
    pub fn jobs(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
