use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{ConfigurationError, RunError, SchedulerError};
use crate::job::models::JobExecution;
use crate::job::runner::JobRunner;

/// Lifecycle state of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Result of a scheduled tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A run was spawned in the background
    Started,
    /// The previous run of this job is still in flight
    Skipped,
}

/// Result of a manual trigger
#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(JobExecution),
    /// The job was already running, nothing was started
    Skipped,
}

enum Lifecycle {
    Stopped,
    Running {
        shutdown_tx: watch::Sender<bool>,
        timers: Vec<JoinHandle<()>>,
    },
}

/// Fires every registered job on its own fixed interval
///
/// # Concurrency Model
/// - One timer task per job; distinct jobs run concurrently
/// - Each job has a run guard; a tick or manual trigger that finds the
///   guard taken is skipped, so a job never overlaps itself
/// - Stopping ends the timers only; in-flight runs finish on their own
pub struct Scheduler {
    runner: Arc<JobRunner>,
    guards: HashMap<String, Arc<Mutex<()>>>,
    lifecycle: StdMutex<Lifecycle>,
}

impl Scheduler {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        let guards = runner
            .registry()
            .jobs()
            .map(|job| (job.name.clone(), Arc::new(Mutex::new(()))))
            .collect();
        Self {
            runner,
            guards,
            lifecycle: StdMutex::new(Lifecycle::Stopped),
        }
    }

    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    pub fn state(&self) -> SchedulerState {
        match *self.lifecycle() {
            Lifecycle::Stopped => SchedulerState::Stopped,
            Lifecycle::Running { .. } => SchedulerState::Running,
        }
    }

    /// Whether a run of `job_name` is currently in flight
    pub fn is_job_running(&self, job_name: &str) -> bool {
        self.guards.get(job_name).map(is_held).unwrap_or(false)
    }

    /// Spawn one timer task per registered job
    ///
    /// The first firing happens one interval after start.
    pub fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let mut lifecycle = self.lifecycle();
        if matches!(*lifecycle, Lifecycle::Running { .. }) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let timers = self
            .runner
            .registry()
            .jobs()
            .map(|job| {
                let scheduler = Arc::clone(self);
                let name = job.name.clone();
                let period = job.interval;
                let rx = shutdown_rx.clone();
                tokio::spawn(async move { scheduler.run_timer(name, period, rx).await })
            })
            .collect::<Vec<_>>();

        info!("Scheduler started with {} jobs", timers.len());
        *lifecycle = Lifecycle::Running { shutdown_tx, timers };
        Ok(())
    }

    /// Stop future firings and wait for the timer tasks to exit
    ///
    /// Runs already in flight are not aborted; use [`Scheduler::drain`] to wait for them.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);
        let Lifecycle::Running { shutdown_tx, timers } = previous else {
            debug!("Scheduler stop requested while already stopped");
            return;
        };

        info!("Stopping scheduler timers...");
        if let Err(e) = shutdown_tx.send(true) {
            error!("Failed to send stop signal to timers: {:?}", e);
        }
        for handle in timers {
            if let Err(e) = handle.await {
                error!("Scheduler timer task failed: {:?}", e);
            }
        }
        info!("Scheduler stopped");
    }

    /// Wait until no job is in flight
    pub async fn drain(&self) {
        for (name, guard) in &self.guards {
            if is_held(guard) {
                info!("Waiting for in-flight run of job {}...", name);
            }
            let _idle = guard.lock().await;
        }
    }

    /// Fire `job_name` as the timer would: spawn a background run unless one is in flight
    pub fn tick(&self, job_name: &str) -> Result<TickOutcome, ConfigurationError> {
        let guard = self.guard(job_name)?;
        let Some(permit) = try_acquire(guard) else {
            warn!("Skipping scheduled run of job {}: previous run still in flight", job_name);
            return Ok(TickOutcome::Skipped);
        };

        let runner = Arc::clone(&self.runner);
        let name = job_name.to_string();
        tokio::spawn(async move {
            let _permit = permit;
            match runner.run(&name).await {
                Ok(execution) => debug!(
                    "Scheduled run of job {} finished: {}",
                    name, execution.status
                ),
                // Logged and dropped; the next tick is a fresh attempt.
                Err(e) => error!("Scheduled run of job {} could not be recorded: {}", name, e),
            }
        });
        Ok(TickOutcome::Started)
    }

    /// Run `job_name` now and wait for its execution record
    ///
    /// Skipped when the job is already in flight, whether started by a tick or another trigger.
    /// The run owns its guard on a spawned task: dropping the returned future only stops
    /// waiting, the run still completes and releases the guard when done.
    pub async fn trigger(&self, job_name: &str) -> Result<TriggerOutcome, RunError> {
        let guard = self.guard(job_name)?;
        let Some(permit) = try_acquire(guard) else {
            info!("Manual trigger of job {} skipped: already running", job_name);
            return Ok(TriggerOutcome::Skipped);
        };

        info!("Manual trigger of job {}", job_name);
        let runner = Arc::clone(&self.runner);
        let name = job_name.to_string();
        let run = tokio::spawn(async move {
            let _permit = permit;
            runner.run(&name).await
        });

        match run.await {
            Ok(result) => Ok(TriggerOutcome::Completed(result?)),
            Err(e) => {
                error!("Manual run of job {} did not complete: {}", job_name, e);
                Err(RunError::Aborted(job_name.to_string()))
            }
        }
    }

    async fn run_timer(&self, name: String, period: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Timer for job {} armed (every {:?})", name, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(&name) {
                        error!("Timer for job {} fired for an unregistered job: {}", name, e);
                        break;
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Timer for job {} stopped", name);
    }

    fn guard(&self, job_name: &str) -> Result<&Arc<Mutex<()>>, ConfigurationError> {
        self.guards
            .get(job_name)
            .ok_or_else(|| ConfigurationError::UnknownJob(job_name.to_string()))
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        // Nothing panics while holding this lock; recover the state if it ever does.
        self.lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn try_acquire(guard: &Arc<Mutex<()>>) -> Option<OwnedMutexGuard<()>> {
    Arc::clone(guard).try_lock_owned().ok()
}

fn is_held(guard: &Arc<Mutex<()>>) -> bool {
    guard.try_lock().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::store::ExecutionStore;
    use crate::db::testing::FaultyStore;
    use crate::error::CollectionError;
    use crate::job::collector::{Collected, Collector};
    use crate::job::models::ExecutionStatus;
    use crate::job::registry::JobRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Collector that blocks until released
    struct Gated {
        release: Arc<Notify>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Collector for Gated {
        async fn collect(&self) -> Result<Collected, CollectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(Collected::count(1))
        }
    }

    /// Collector that takes a fixed amount of (tokio) time
    struct Slow {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Collector for Slow {
        async fn collect(&self) -> Result<Collected, CollectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Collected::count(1))
        }
    }

    fn scheduler_on<C: Collector + 'static>(
        store: Arc<dyn ExecutionStore>,
        collector: C,
        interval: Duration,
    ) -> Arc<Scheduler> {
        let mut registry = JobRegistry::new();
        registry.register("slow", collector, interval).unwrap();
        let runner = Arc::new(JobRunner::new(Arc::new(registry), store));
        Arc::new(Scheduler::new(runner))
    }

    fn scheduler_with<C: Collector + 'static>(
        collector: C,
        interval: Duration,
    ) -> (Arc<Scheduler>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (scheduler_on(store.clone(), collector, interval), store)
    }

    async fn wait_until_running(scheduler: &Scheduler, job: &str) {
        while !scheduler.is_job_running(job) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_second_tick_is_skipped_while_first_runs() {
        let release = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (scheduler, store) = scheduler_with(
            Gated { release: release.clone(), calls: calls.clone() },
            Duration::from_secs(60),
        );

        assert_eq!(scheduler.tick("slow").unwrap(), TickOutcome::Started);
        assert_eq!(scheduler.tick("slow").unwrap(), TickOutcome::Skipped);

        wait_until_running(&scheduler, "slow").await;
        release.notify_one();
        scheduler.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let executions = store.recent_executions(10, 0).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn test_manual_trigger_skipped_while_tick_in_flight() {
        let release = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (scheduler, store) = scheduler_with(
            Gated { release: release.clone(), calls: calls.clone() },
            Duration::from_secs(60),
        );

        scheduler.tick("slow").unwrap();
        wait_until_running(&scheduler, "slow").await;

        let outcome = scheduler.trigger("slow").await.unwrap();
        assert!(matches!(outcome, TriggerOutcome::Skipped));

        release.notify_one();
        scheduler.drain().await;
        assert_eq!(store.count_executions().await.unwrap(), 1);

        // Idle again: the trigger runs to completion.
        release.notify_one();
        let outcome = scheduler.trigger("slow").await.unwrap();
        match outcome {
            TriggerOutcome::Completed(execution) => {
                assert_eq!(execution.status, ExecutionStatus::Success)
            }
            TriggerOutcome::Skipped => panic!("expected the trigger to run"),
        }
        assert_eq!(store.count_executions().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_job_is_a_configuration_error() {
        let (scheduler, store) = scheduler_with(
            Slow { delay: Duration::from_millis(1), calls: Arc::new(AtomicUsize::new(0)) },
            Duration::from_secs(60),
        );

        assert!(matches!(
            scheduler.trigger("nope").await,
            Err(RunError::Configuration(ConfigurationError::UnknownJob(_)))
        ));
        assert!(scheduler.tick("nope").is_err());
        assert_eq!(store.count_executions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let (scheduler, _store) = scheduler_with(
            Slow { delay: Duration::from_millis(1), calls: Arc::new(AtomicUsize::new(0)) },
            Duration::from_secs(3600),
        );

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        scheduler.start().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.start(), Err(SchedulerError::AlreadyRunning));

        scheduler.stop().await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        scheduler.stop().await;

        scheduler.start().unwrap();
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_on_interval_and_skips_overlaps() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (scheduler, store) = scheduler_with(
            Slow { delay: Duration::from_secs(25), calls: calls.clone() },
            Duration::from_secs(10),
        );

        scheduler.start().unwrap();
        // Ticks at 10s (runs until 35s), 20s and 30s (skipped), 40s (runs).
        tokio::time::sleep(Duration::from_secs(45)).await;
        scheduler.stop().await;
        scheduler.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let executions = store.recent_executions(10, 0).await.unwrap();
        assert_eq!(executions.len(), 2);
        assert!(executions.iter().all(|e| e.status == ExecutionStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_does_not_abort_in_flight_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (scheduler, store) = scheduler_with(
            Slow { delay: Duration::from_secs(30), calls: calls.clone() },
            Duration::from_secs(10),
        );

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(scheduler.is_job_running("slow"));

        scheduler.stop().await;
        scheduler.drain().await;

        let executions = store.recent_executions(10, 0).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trigger_still_completes_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (scheduler, store) = scheduler_with(
            Slow { delay: Duration::from_millis(300), calls: calls.clone() },
            Duration::from_secs(60),
        );

        let waited = tokio::time::timeout(Duration::from_millis(50), scheduler.trigger("slow")).await;
        assert!(waited.is_err());

        // The abandoned run keeps its guard until it finishes.
        assert!(scheduler.is_job_running("slow"));
        assert!(matches!(scheduler.trigger("slow").await.unwrap(), TriggerOutcome::Skipped));

        scheduler.drain().await;
        assert!(!scheduler.is_job_running("slow"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let executions = store.recent_executions(10, 0).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_keeps_firing_when_store_fails() {
        let store = Arc::new(FaultyStore::failing_completion());
        let scheduler = scheduler_on(
            store.clone(),
            Slow { delay: Duration::from_secs(1), calls: Arc::new(AtomicUsize::new(0)) },
            Duration::from_secs(10),
        );

        scheduler.start().unwrap();
        // Ticks at 10s and 20s; each run fails to record its outcome.
        tokio::time::sleep(Duration::from_secs(25)).await;
        scheduler.stop().await;
        scheduler.drain().await;

        assert_eq!(store.appends(), 2);
        assert!(!scheduler.is_job_running("slow"));
    }
}
