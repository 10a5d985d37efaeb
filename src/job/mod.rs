pub mod collector;
pub mod models;
pub mod registry;
pub mod runner;

// Re-export commonly used types
pub use collector::{Collected, Collector};
pub use models::{DataQuality, ExecutionStatus, JobExecution, NewReading, Reading};
pub use registry::{JobDefinition, JobRegistry};
pub use runner::JobRunner;
