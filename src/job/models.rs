use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use uuid::Uuid;

/// Longest error message kept on a failed execution
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

const TRUNCATION_MARKER: &str = "...";
const EMPTY_ERROR_MESSAGE: &str = "collector failed without an error message";

/// Execution status representing the lifecycle of one job run
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
        }
    }

    /// SUCCESS and FAILURE are final; a record never leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failure)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "failure" => Ok(ExecutionStatus::Failure),
            other => Err(format!("unknown execution status: {}", other)),
        }
    }
}

/// Durable record of one attempt to run a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_name: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub records_processed: i64,
    pub error_message: Option<String>,
}

impl JobExecution {
    /// Begin a new run of `job_name`, stamped with the current time
    pub fn start(job_name: &str) -> Self {
        Self::start_at(job_name, Utc::now())
    }

    pub fn start_at(job_name: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            status: ExecutionStatus::Running,
            started_at,
            finished_at: None,
            records_processed: 0,
            error_message: None,
        }
    }

    /// Transition to SUCCESS.
    pub fn succeed(&mut self, finished_at: DateTime<Utc>, records_processed: u32) {
        debug_assert!(!self.status.is_terminal(), "execution already finished");
        self.status = ExecutionStatus::Success;
        self.finished_at = Some(self.clamp_finish(finished_at));
        self.records_processed = i64::from(records_processed);
        self.error_message = None;
    }

    /// Transition to FAILURE with a bounded, non-empty message.
    pub fn fail(&mut self, finished_at: DateTime<Utc>, message: &str) {
        debug_assert!(!self.status.is_terminal(), "execution already finished");
        self.status = ExecutionStatus::Failure;
        self.finished_at = Some(self.clamp_finish(finished_at));
        self.records_processed = 0;
        self.error_message = Some(bounded_error_message(message));
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elapsed time between start and finish; `None` while in flight
    pub fn duration(&self) -> Option<Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration()
            .and_then(|d| d.num_microseconds())
            .map(|us| us as f64 / 1_000_000.0)
    }

    // Stores keep microseconds; a finish that does not land strictly after the start is nudged forward.
    fn clamp_finish(&self, finished_at: DateTime<Utc>) -> DateTime<Utc> {
        let earliest = self.started_at + Duration::microseconds(1);
        if finished_at < earliest {
            earliest
        } else {
            finished_at
        }
    }
}

/// Truncate an error message to [`MAX_ERROR_MESSAGE_LEN`] characters.
pub fn bounded_error_message(message: &str) -> String {
    let message = message.trim();
    if message.is_empty() {
        return EMPTY_ERROR_MESSAGE.to_string();
    }
    if message.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return message.to_string();
    }
    let keep = MAX_ERROR_MESSAGE_LEN - TRUNCATION_MARKER.len();
    let mut truncated: String = message.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Data-quality indicator attached to every reading
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// Passed every validation rule
    Good,
    /// Produced from fallback or substitute data
    Degraded,
    /// Outside the plausible range for the measured quantity
    Suspect,
}

impl DataQuality {
    /// `Good` when `value` lies in `plausible`, `Suspect` otherwise (NaN included).
    pub fn assess(value: f64, plausible: RangeInclusive<f64>) -> Self {
        if plausible.contains(&value) {
            DataQuality::Good
        } else {
            DataQuality::Suspect
        }
    }

    /// Combine two assessments, keeping the worse one.
    pub fn and(self, other: DataQuality) -> Self {
        match (self, other) {
            (DataQuality::Suspect, _) | (_, DataQuality::Suspect) => DataQuality::Suspect,
            (DataQuality::Degraded, _) | (_, DataQuality::Degraded) => DataQuality::Degraded,
            _ => DataQuality::Good,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::Good => "good",
            DataQuality::Degraded => "degraded",
            DataQuality::Suspect => "suspect",
        }
    }
}

impl FromStr for DataQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(DataQuality::Good),
            "degraded" => Ok(DataQuality::Degraded),
            "suspect" => Ok(DataQuality::Suspect),
            other => Err(format!("unknown data quality: {}", other)),
        }
    }
}

/// Reading as handed over by a collector, before it is tied to an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub source: String,
    pub value: f64,
    pub quality: DataQuality,
    #[serde(default)]
    pub details: serde_json::Value,
    pub collected_at: DateTime<Utc>,
}

impl NewReading {
    pub fn new(source: impl Into<String>, value: f64, quality: DataQuality) -> Self {
        Self {
            source: source.into(),
            value,
            quality,
            details: serde_json::Value::Null,
            collected_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Bind this reading to the execution that produced it
    pub fn into_reading(self, execution_id: Uuid) -> Reading {
        Reading {
            id: Uuid::new_v4(),
            execution_id,
            source: self.source,
            value: self.value,
            quality: self.quality,
            details: self.details,
            collected_at: self.collected_at,
        }
    }
}

/// Durable record of the data a successful execution produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub source: String,
    pub value: f64,
    pub quality: DataQuality,
    pub details: serde_json::Value,
    pub collected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Success,
            ExecutionStatus::Failure,
        ] {
            assert_eq!(status.as_str().parse::<ExecutionStatus>(), Ok(status));
        }
        assert!("error".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn test_running_execution_has_no_end_or_duration() {
        let execution = JobExecution::start("weather_collection");
        assert_eq!(execution.status, ExecutionStatus::Running);
        assert!(execution.finished_at.is_none());
        assert!(execution.duration().is_none());
        assert!(execution.error_message.is_none());
    }

    #[test]
    fn test_succeed_sets_end_and_count() {
        let start = Utc::now();
        let mut execution = JobExecution::start_at("weather_collection", start);
        execution.succeed(start + Duration::milliseconds(1500), 1);

        assert_eq!(execution.status, ExecutionStatus::Success);
        assert_eq!(execution.records_processed, 1);
        assert!(execution.error_message.is_none());
        assert_eq!(execution.duration_seconds(), Some(1.5));
    }

    #[test]
    fn test_fail_keeps_end_after_start() {
        let start = Utc::now();
        let mut execution = JobExecution::start_at("flaky", start);
        execution.fail(start, "timeout");

        assert_eq!(execution.status, ExecutionStatus::Failure);
        assert_eq!(execution.error_message.as_deref(), Some("timeout"));
        assert!(execution.finished_at.unwrap() > execution.started_at);
    }

    #[test]
    fn test_error_message_is_bounded() {
        let long = "é".repeat(2 * MAX_ERROR_MESSAGE_LEN);
        let bounded = bounded_error_message(&long);
        assert_eq!(bounded.chars().count(), MAX_ERROR_MESSAGE_LEN);
        assert!(bounded.ends_with("..."));

        assert_eq!(bounded_error_message("  "), EMPTY_ERROR_MESSAGE);
        assert_eq!(bounded_error_message("short"), "short");
    }

    #[test]
    fn test_quality_assessment() {
        assert_eq!(DataQuality::assess(22.5, -10.0..=50.0), DataQuality::Good);
        assert_eq!(DataQuality::assess(71.0, -10.0..=50.0), DataQuality::Suspect);
        assert_eq!(DataQuality::assess(f64::NAN, -10.0..=50.0), DataQuality::Suspect);

        assert_eq!(DataQuality::Good.and(DataQuality::Degraded), DataQuality::Degraded);
        assert_eq!(DataQuality::Degraded.and(DataQuality::Suspect), DataQuality::Suspect);
        assert_eq!(DataQuality::Good.and(DataQuality::Good), DataQuality::Good);
    }
}
