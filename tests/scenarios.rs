use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use datalake_native::db::{ExecutionStore, MemoryStore};
use datalake_native::job::{
    Collected, Collector, DataQuality, ExecutionStatus, JobRegistry, JobRunner, NewReading,
};
use datalake_native::metrics::MetricsAggregator;
use datalake_native::worker::{Scheduler, TickOutcome, TriggerOutcome};
use datalake_native::{CollectionError, ConfigurationError, RunError};

struct Thermometer;

#[async_trait]
impl Collector for Thermometer {
    async fn collect(&self) -> Result<Collected, CollectionError> {
        Ok(Collected::reading(NewReading::new("Campinas", 22.5, DataQuality::Good)))
    }
}

/// Fails on the second call only
struct Flaky {
    calls: AtomicUsize,
}

#[async_trait]
impl Collector for Flaky {
    async fn collect(&self) -> Result<Collected, CollectionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == 2 {
            return Err(CollectionError::InvalidData("sensor returned garbage".to_string()));
        }
        Ok(Collected::reading(NewReading::new("Campinas", 21.0, DataQuality::Good)))
    }
}

struct Slow {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Collector for Slow {
    async fn collect(&self) -> Result<Collected, CollectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(Collected::count(3))
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    scheduler: Arc<Scheduler>,
    metrics: MetricsAggregator,
}

fn harness(register: impl FnOnce(&mut JobRegistry)) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let mut registry = JobRegistry::new();
    register(&mut registry);
    let runner = Arc::new(JobRunner::new(Arc::new(registry), store.clone()));
    let scheduler = Arc::new(Scheduler::new(runner));
    let metrics = MetricsAggregator::new(store.clone(), FixedOffset::east_opt(0).unwrap());
    Harness { store, scheduler, metrics }
}

async fn trigger(scheduler: &Scheduler, job: &str) -> datalake_native::job::JobExecution {
    match scheduler.trigger(job).await.unwrap() {
        TriggerOutcome::Completed(execution) => execution,
        TriggerOutcome::Skipped => panic!("trigger of {} was skipped", job),
    }
}

#[tokio::test]
async fn weather_job_triggered_three_times() {
    let h = harness(|r| r.register("weather", Thermometer, Duration::from_secs(1800)).unwrap());

    for _ in 0..3 {
        let execution = trigger(&h.scheduler, "weather").await;
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert!(execution.finished_at.unwrap() > execution.started_at);
        let reading = h.store.reading_for_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(reading.value, 22.5);
        assert_eq!(reading.quality, DataQuality::Good);
    }

    let metrics = h.metrics.summary().await.unwrap();
    assert_eq!(metrics.total_jobs, 3);
    assert_eq!(metrics.successful_jobs, 3);
    assert_eq!(metrics.failed_jobs, 0);
    assert_eq!(metrics.success_rate, 100.0);
    assert_eq!(metrics.jobs_today, 3);
}

#[tokio::test]
async fn flaky_job_fails_on_second_trigger() {
    let h = harness(|r| {
        r.register("flaky", Flaky { calls: AtomicUsize::new(0) }, Duration::from_secs(60))
            .unwrap()
    });

    let first = trigger(&h.scheduler, "flaky").await;
    let second = trigger(&h.scheduler, "flaky").await;
    let third = trigger(&h.scheduler, "flaky").await;
    assert_eq!(second.status, ExecutionStatus::Failure);
    assert!(h.store.reading_for_execution(second.id).await.unwrap().is_none());

    let metrics = h.metrics.summary().await.unwrap();
    assert_eq!(metrics.total_jobs, 3);
    assert_eq!(metrics.successful_jobs, 2);
    assert_eq!(metrics.failed_jobs, 1);
    assert_eq!(metrics.success_rate, 66.7);

    let recent = h.metrics.job_executions(3).await.unwrap();
    let ids: Vec<_> = recent.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);

    // Make the failing run the most recent one and check what the history shows.
    let h = harness(|r| {
        r.register("flaky", Flaky { calls: AtomicUsize::new(0) }, Duration::from_secs(60))
            .unwrap()
    });
    trigger(&h.scheduler, "flaky").await;
    trigger(&h.scheduler, "flaky").await;
    let latest = h.metrics.job_executions(1).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].status, ExecutionStatus::Failure);
    assert_eq!(
        latest[0].error_message.as_deref(),
        Some("Invalid data: sensor returned garbage")
    );
}

#[tokio::test]
async fn overlapping_ticks_produce_one_execution() {
    let calls = Arc::new(AtomicUsize::new(0));
    let slow_calls = calls.clone();
    let h = harness(move |r| {
        r.register("slow", Slow { calls: slow_calls }, Duration::from_secs(60))
            .unwrap()
    });

    assert_eq!(h.scheduler.tick("slow").unwrap(), TickOutcome::Started);
    assert_eq!(h.scheduler.tick("slow").unwrap(), TickOutcome::Skipped);
    h.scheduler.drain().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let executions = h.metrics.job_executions(10).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].records_processed, 3);
}

#[tokio::test]
async fn unknown_job_writes_nothing() {
    let h = harness(|r| r.register("weather", Thermometer, Duration::from_secs(60)).unwrap());

    let err = h.scheduler.trigger("snow").await.unwrap_err();
    assert!(matches!(err, RunError::Configuration(ConfigurationError::UnknownJob(_))));
    let err = h.scheduler.runner().run("snow").await.unwrap_err();
    assert!(matches!(err, RunError::Configuration(_)));

    assert_eq!(h.store.count_executions().await.unwrap(), 0);
    let metrics = h.metrics.summary().await.unwrap();
    assert_eq!(metrics.success_rate, 0.0);
    assert!(metrics.last_execution.is_none());
}

#[tokio::test]
async fn readings_window_only_returns_recent_data() {
    let h = harness(|r| r.register("weather", Thermometer, Duration::from_secs(60)).unwrap());
    trigger(&h.scheduler, "weather").await;

    let readings = h.metrics.recent_readings(24).await.unwrap();
    assert_eq!(readings.len(), 1);
    assert!(readings[0].collected_at <= Utc::now());
}
