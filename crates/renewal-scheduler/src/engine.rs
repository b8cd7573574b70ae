use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{Result, SchedulerError},
    schedule::compute_next_run,
    types::{JobInfo, JobStatus, RemoveOutcome, Schedule, TriggerOutcome},
};

/// Error type a job callback may return.
pub type JobError = Box<dyn std::error::Error + Send + Sync>;
pub type JobResult = std::result::Result<(), JobError>;

/// Work executed when a job fires.
///
/// Implemented for any `Fn() -> impl Future<Output = JobResult>` closure, so
/// most callers just pass `move || async move { ... }`.
#[async_trait]
pub trait JobCallback: Send + Sync + 'static {
    async fn run(&self) -> JobResult;
}

#[async_trait]
impl<F, Fut> JobCallback for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    async fn run(&self) -> JobResult {
        (self)().await
    }
}

struct Job {
    schedule: Schedule,
    callback: Arc<dyn JobCallback>,
    status: JobStatus,
    run_count: u64,
    failure_count: u64,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    last_error: Option<String>,
    pending_removal: bool,
    created_at: DateTime<Utc>,
}

impl Job {
    fn info(&self, name: &str) -> JobInfo {
        JobInfo {
            name: name.to_string(),
            schedule: self.schedule.clone(),
            status: self.status,
            run_count: self.run_count,
            failure_count: self.failure_count,
            last_run: self.last_run,
            next_run: self.next_run,
            last_error: self.last_error.clone(),
            pending_removal: self.pending_removal,
            created_at: self.created_at,
        }
    }
}

/// Handle to the running poll loop.
struct LoopHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Inner {
    jobs: Mutex<HashMap<String, Job>>,
    tick: Duration,
    loop_handle: Mutex<Option<LoopHandle>>,
}

impl Inner {
    fn jobs(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flip an idle job to `Running` and hand back its callback.
    /// `Ok(None)` means it was already running.
    fn claim(&self, name: &str) -> Result<Option<Arc<dyn JobCallback>>> {
        let mut jobs = self.jobs();
        let job = jobs.get_mut(name).ok_or_else(|| SchedulerError::JobNotFound {
            name: name.to_string(),
        })?;
        if job.status == JobStatus::Running {
            return Ok(None);
        }
        job.status = JobStatus::Running;
        Ok(Some(Arc::clone(&job.callback)))
    }

    /// Claim every idle job whose next run has arrived.
    fn claim_due(&self, now: DateTime<Utc>) -> Vec<(String, Arc<dyn JobCallback>)> {
        let mut jobs = self.jobs();
        jobs.iter_mut()
            .filter(|(_, job)| {
                job.status == JobStatus::Idle
                    && !job.pending_removal
                    && job.next_run.is_some_and(|next| next <= now)
            })
            .map(|(name, job)| {
                job.status = JobStatus::Running;
                (name.clone(), Arc::clone(&job.callback))
            })
            .collect()
    }

    fn finish(&self, name: &str, outcome: &TriggerOutcome, now: DateTime<Utc>) {
        let mut jobs = self.jobs();
        let Some(job) = jobs.get_mut(name) else {
            return;
        };
        job.status = JobStatus::Idle;
        job.run_count += 1;
        job.last_run = Some(now);
        if let TriggerOutcome::Failed { error } = outcome {
            job.failure_count += 1;
            job.last_error = Some(error.clone());
        }
        job.next_run = compute_next_run(&job.schedule, now);

        if job.pending_removal {
            jobs.remove(name);
            info!(job = %name, "deferred job removal completed");
        }
    }
}

/// Runs a claimed job to completion and releases it.
///
/// The callback runs on its own task so a panic surfaces as a `JoinError`
/// instead of unwinding through the scheduler.
async fn execute(
    inner: Arc<Inner>,
    name: String,
    callback: Arc<dyn JobCallback>,
    origin: &'static str,
) -> TriggerOutcome {
    let run_id = Uuid::new_v4();
    info!(job = %name, %run_id, origin, "job started");

    let outcome = match tokio::spawn(async move { callback.run().await }).await {
        Ok(Ok(())) => TriggerOutcome::Completed,
        Ok(Err(e)) => TriggerOutcome::Failed {
            error: e.to_string(),
        },
        Err(join) => TriggerOutcome::Failed {
            error: format!("callback panicked: {join}"),
        },
    };

    match &outcome {
        TriggerOutcome::Failed { error } => error!(job = %name, %run_id, %error, "job failed"),
        _ => info!(job = %name, %run_id, "job completed"),
    }
    inner.finish(&name, &outcome, Utc::now());
    outcome
}

/// In-process job scheduler. Cheap to clone; clones share the job table.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler whose loop polls every `tick` once started.
    pub fn new(tick: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                tick,
                loop_handle: Mutex::new(None),
            }),
        }
    }

    /// Register `name`, replacing any previous definition under that name.
    ///
    /// Counters survive a replacement, and so does a run in progress.
    pub fn schedule(
        &self,
        name: &str,
        schedule: Schedule,
        callback: impl JobCallback,
    ) -> Result<JobInfo> {
        schedule.validate()?;
        let now = Utc::now();
        let next_run = compute_next_run(&schedule, now);
        let callback: Arc<dyn JobCallback> = Arc::new(callback);

        let mut jobs = self.inner.jobs();
        let job = match jobs.remove(name) {
            Some(previous) => Job {
                schedule,
                callback,
                next_run,
                pending_removal: false,
                ..previous
            },
            None => Job {
                schedule,
                callback,
                status: JobStatus::Idle,
                run_count: 0,
                failure_count: 0,
                last_run: None,
                next_run,
                last_error: None,
                pending_removal: false,
                created_at: now,
            },
        };
        let info = job.info(name);
        jobs.insert(name.to_string(), job);
        info!(job = %name, next_run = ?info.next_run, "job scheduled");
        Ok(info)
    }

    /// Deregister a job. A running job is dropped once its current run ends.
    pub fn remove_job(&self, name: &str) -> Result<RemoveOutcome> {
        let mut jobs = self.inner.jobs();
        let job = jobs.get_mut(name).ok_or_else(|| SchedulerError::JobNotFound {
            name: name.to_string(),
        })?;
        if job.status == JobStatus::Running {
            job.pending_removal = true;
            info!(job = %name, "job running; removal deferred");
            return Ok(RemoveOutcome::Deferred);
        }
        jobs.remove(name);
        info!(job = %name, "job removed");
        Ok(RemoveOutcome::Removed)
    }

    pub fn get_job(&self, name: &str) -> Option<JobInfo> {
        self.inner.jobs().get(name).map(|job| job.info(name))
    }

    /// Snapshots of every registered job, ordered by name.
    pub fn list_jobs(&self) -> Vec<JobInfo> {
        let mut out: Vec<JobInfo> = self
            .inner
            .jobs()
            .iter()
            .map(|(name, job)| job.info(name))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Run one job now, unless it is already running.
    ///
    /// The run is detached from the caller: dropping the returned future
    /// leaves the job to finish and release itself.
    pub async fn trigger_job(&self, name: &str) -> Result<TriggerOutcome> {
        match self.inner.claim(name)? {
            Some(callback) => {
                let run = tokio::spawn(execute(
                    Arc::clone(&self.inner),
                    name.to_string(),
                    callback,
                    "manual",
                ));
                Ok(run.await.unwrap_or_else(|join| TriggerOutcome::Failed {
                    error: format!("job task ended abnormally: {join}"),
                }))
            }
            None => {
                debug!(job = %name, "job already running; trigger skipped");
                Ok(TriggerOutcome::Skipped)
            }
        }
    }

    /// Trigger every registered job concurrently.
    pub async fn trigger_all_jobs(&self) -> Vec<(String, TriggerOutcome)> {
        let names: Vec<String> = self.inner.jobs().keys().cloned().collect();
        let runs = names.into_iter().map(|name| async move {
            // A job removed between listing and claiming counts as skipped.
            let outcome = self
                .trigger_job(&name)
                .await
                .unwrap_or(TriggerOutcome::Skipped);
            (name, outcome)
        });
        futures_util::future::join_all(runs).await
    }

    /// Spawn every due, idle job. Must be called inside a Tokio runtime.
    pub fn run_due(&self, now: DateTime<Utc>) -> Vec<JoinHandle<TriggerOutcome>> {
        self.inner
            .claim_due(now)
            .into_iter()
            .map(|(name, callback)| {
                tokio::spawn(execute(Arc::clone(&self.inner), name, callback, "schedule"))
            })
            .collect()
    }

    /// Start the polling loop. Returns `false` if it was already running.
    pub fn start(&self) -> Result<bool> {
        if self.inner.tick.is_zero() {
            return Err(SchedulerError::InvalidTick);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let mut slot = self
            .inner
            .loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(false);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = self.clone();
        let task = runtime.spawn(scheduler.run(shutdown_rx));
        *slot = Some(LoopHandle { shutdown_tx, task });
        Ok(true)
    }

    /// Stop the polling loop. In-flight runs finish on their own.
    /// Returns `false` if the loop was not running.
    pub async fn stop(&self) -> bool {
        let handle = self
            .inner
            .loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return false;
        };
        let _ = handle.shutdown_tx.send(true);
        if let Err(e) = handle.task.await {
            warn!("scheduler loop ended abnormally: {e}");
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Poll loop. Ticks until `shutdown` broadcasts `true` or its sender drops.
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_ms = self.inner.tick.as_millis() as u64, "scheduler started");

        let mut interval = tokio::time::interval(self.inner.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let spawned = self.run_due(Utc::now());
                    if !spawned.is_empty() {
                        debug!(count = spawned.len(), "due jobs dispatched");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn counting(counter: Arc<AtomicUsize>) -> impl JobCallback {
        move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), JobError>(())
            }
        }
    }

    /// A callback that blocks until `release` is notified.
    fn gated(started: Arc<Notify>, release: Arc<Notify>, calls: Arc<AtomicUsize>) -> impl JobCallback {
        move || {
            let (started, release, calls) =
                (Arc::clone(&started), Arc::clone(&release), Arc::clone(&calls));
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                started.notify_one();
                release.notified().await;
                Ok::<(), JobError>(())
            }
        }
    }

    fn far_future() -> Schedule {
        Schedule::Interval { every_secs: 3_600 }
    }

    #[tokio::test]
    async fn manual_trigger_runs_and_counts() {
        let sched = Scheduler::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));
        sched.schedule("job", far_future(), counting(Arc::clone(&calls))).unwrap();

        let outcome = sched.trigger_job("job").await.unwrap();
        assert_eq!(outcome, TriggerOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let info = sched.get_job("job").unwrap();
        assert_eq!(info.run_count, 1);
        assert_eq!(info.status, JobStatus::Idle);
        assert!(info.last_run.is_some());
        assert!(info.next_run.is_some());
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let sched = Scheduler::new(Duration::from_millis(50));
        assert!(matches!(
            sched.trigger_job("ghost").await,
            Err(SchedulerError::JobNotFound { .. })
        ));
        assert!(sched.remove_job("ghost").is_err());
    }

    #[tokio::test]
    async fn overlapping_trigger_is_skipped() {
        let sched = Scheduler::new(Duration::from_millis(50));
        let (started, release) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        sched
            .schedule(
                "slow",
                far_future(),
                gated(Arc::clone(&started), Arc::clone(&release), Arc::clone(&calls)),
            )
            .unwrap();

        let first = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.trigger_job("slow").await })
        };
        started.notified().await;

        assert_eq!(sched.get_job("slow").unwrap().status, JobStatus::Running);
        assert_eq!(
            sched.trigger_job("slow").await.unwrap(),
            TriggerOutcome::Skipped
        );
        assert!(sched.run_due(Utc::now() + chrono::Duration::days(1)).is_empty());

        release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), TriggerOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sched.get_job("slow").unwrap().run_count, 1);
    }

    #[tokio::test]
    async fn dropped_trigger_still_releases_the_job() {
        let sched = Scheduler::new(Duration::from_millis(50));
        let (started, release) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        sched
            .schedule(
                "slow",
                far_future(),
                gated(Arc::clone(&started), Arc::clone(&release), Arc::clone(&calls)),
            )
            .unwrap();

        // Caller gives up while the callback is still blocked.
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), sched.trigger_job("slow")).await;
        assert!(abandoned.is_err());
        started.notified().await;
        release.notify_one();

        for _ in 0..100 {
            if sched.get_job("slow").unwrap().status == JobStatus::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let info = sched.get_job("slow").unwrap();
        assert_eq!(info.status, JobStatus::Idle);
        assert_eq!(info.run_count, 1);

        release.notify_one();
        assert_eq!(
            sched.trigger_job("slow").await.unwrap(),
            TriggerOutcome::Completed
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_and_panic_release_the_job() {
        let sched = Scheduler::new(Duration::from_millis(50));
        sched
            .schedule("fails", far_future(), || async {
                Err::<(), JobError>("upstream unavailable".into())
            })
            .unwrap();
        sched
            .schedule("panics", far_future(), || async {
                if true {
                    panic!("boom");
                }
                Ok::<(), JobError>(())
            })
            .unwrap();

        let outcome = sched.trigger_job("fails").await.unwrap();
        assert_eq!(
            outcome,
            TriggerOutcome::Failed {
                error: "upstream unavailable".to_string()
            }
        );
        assert!(matches!(
            sched.trigger_job("panics").await.unwrap(),
            TriggerOutcome::Failed { .. }
        ));

        for name in ["fails", "panics"] {
            let info = sched.get_job(name).unwrap();
            assert_eq!(info.status, JobStatus::Idle);
            assert_eq!(info.run_count, 1);
            assert_eq!(info.failure_count, 1);
            assert!(info.last_error.is_some());
        }

        // Still triggerable afterwards.
        assert!(matches!(
            sched.trigger_job("fails").await.unwrap(),
            TriggerOutcome::Failed { .. }
        ));
        assert_eq!(sched.get_job("fails").unwrap().run_count, 2);
    }

    #[tokio::test]
    async fn removal_while_running_is_deferred() {
        let sched = Scheduler::new(Duration::from_millis(50));
        let (started, release) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        sched
            .schedule(
                "slow",
                far_future(),
                gated(Arc::clone(&started), Arc::clone(&release), calls),
            )
            .unwrap();

        let run = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.trigger_job("slow").await })
        };
        started.notified().await;

        assert_eq!(sched.remove_job("slow").unwrap(), RemoveOutcome::Deferred);
        assert!(sched.get_job("slow").unwrap().pending_removal);

        release.notify_one();
        run.await.unwrap().unwrap();
        assert!(sched.get_job("slow").is_none());
    }

    #[tokio::test]
    async fn idle_removal_is_immediate() {
        let sched = Scheduler::new(Duration::from_millis(50));
        sched
            .schedule("job", far_future(), counting(Arc::new(AtomicUsize::new(0))))
            .unwrap();
        assert_eq!(sched.remove_job("job").unwrap(), RemoveOutcome::Removed);
        assert!(sched.list_jobs().is_empty());
    }

    #[tokio::test]
    async fn reschedule_replaces_definition() {
        let sched = Scheduler::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));
        sched.schedule("job", far_future(), counting(Arc::clone(&calls))).unwrap();
        sched.trigger_job("job").await.unwrap();

        let info = sched
            .schedule("job", Schedule::Daily { hour: 9, minute: 0 }, counting(Arc::clone(&calls)))
            .unwrap();
        assert_eq!(info.schedule, Schedule::Daily { hour: 9, minute: 0 });
        assert_eq!(info.run_count, 1);
        assert_eq!(sched.list_jobs().len(), 1);
    }

    #[tokio::test]
    async fn invalid_schedule_is_rejected() {
        let sched = Scheduler::new(Duration::from_millis(50));
        let err = sched
            .schedule(
                "bad",
                Schedule::Daily { hour: 24, minute: 0 },
                counting(Arc::new(AtomicUsize::new(0))),
            )
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule(_)));
    }

    #[tokio::test]
    async fn loop_fires_due_once_job() {
        let sched = Scheduler::new(Duration::from_millis(20));
        let calls = Arc::new(AtomicUsize::new(0));
        sched
            .schedule(
                "once",
                Schedule::Once {
                    at: Utc::now() + chrono::Duration::milliseconds(50),
                },
                counting(Arc::clone(&calls)),
            )
            .unwrap();

        assert!(sched.start().unwrap());
        for _ in 0..100 {
            if calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sched.stop().await);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let info = sched.get_job("once").unwrap();
        assert_eq!(info.run_count, 1);
        assert!(info.next_run.is_none());
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let sched = Scheduler::new(Duration::from_millis(20));
        assert!(!sched.is_running());
        assert!(sched.start().unwrap());
        assert!(!sched.start().unwrap());
        assert!(sched.is_running());
        assert!(sched.stop().await);
        assert!(!sched.stop().await);
        assert!(!sched.is_running());
    }

    #[tokio::test]
    async fn zero_tick_refuses_to_start() {
        let sched = Scheduler::new(Duration::ZERO);
        assert!(matches!(sched.start(), Err(SchedulerError::InvalidTick)));
        assert!(!sched.is_running());
    }

    #[test]
    fn start_outside_runtime_fails() {
        let sched = Scheduler::new(Duration::from_millis(20));
        assert!(matches!(sched.start(), Err(SchedulerError::NoRuntime)));
    }

    #[tokio::test]
    async fn trigger_all_runs_every_job() {
        let sched = Scheduler::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));
        for name in ["a", "b", "c"] {
            sched.schedule(name, far_future(), counting(Arc::clone(&calls))).unwrap();
        }
        let outcomes = sched.trigger_all_jobs().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes
            .iter()
            .all(|(_, o)| *o == TriggerOutcome::Completed));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
