//! Scheduled data-collection jobs with persisted execution history and
//! dashboard metrics.
//!
//! Jobs are registered once at startup ([`job::JobRegistry`]), executed by
//! the [`job::JobRunner`], fired on fixed intervals or on demand by the
//! [`worker::Scheduler`], and summarised by the [`metrics::MetricsAggregator`].

pub mod api;
pub mod app;
pub mod collectors;
pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod metrics;
pub mod shutdown;
pub mod telemetry;
pub mod worker;

pub use error::{CollectionError, ConfigurationError, PersistenceError, RunError};
