//! Error kinds of the job-execution core.

use thiserror::Error;
use uuid::Uuid;

/// The caller asked for something the registry cannot provide.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No job with this name was registered at startup.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// A job with this name is already registered.
    #[error("Job already registered: {0}")]
    DuplicateJob(String),

    /// Jobs need a non-empty name.
    #[error("Job name must not be empty")]
    EmptyJobName,

    /// The scheduling interval must be greater than zero.
    #[error("Invalid interval for job {0}: must be greater than zero")]
    InvalidInterval(String),
}

/// A collector failed to produce its data.
///
/// Never escapes the job runner; it is recorded as a FAILURE execution.
#[derive(Error, Debug, Clone)]
pub enum CollectionError {
    /// The upstream source could not be reached.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The upstream source answered with data that failed validation.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("{0}")]
    Other(String),
}

/// The store could not durably record or read execution history.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `complete_execution` was called for a record that is missing or already terminal.
    #[error("Execution {0} is not in flight")]
    NotInFlight(Uuid),

    /// An execution with this id was already appended.
    #[error("Execution {0} already exists")]
    DuplicateExecution(Uuid),

    /// A stored row could not be mapped back to the domain model.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors a job runner call can return to its caller.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The task driving the run ended without reporting an outcome.
    #[error("Run of job {0} did not report an outcome")]
    Aborted(String),
}

/// Scheduler lifecycle misuse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,
}
