//! Job queue: enqueue, consumer stream, worker pool, retry, and maintenance.
//!
//! Delivery is at-least-once. A job claimed by a worker that dies is found by the
//! stalled-job check once its attempt outlives `timeout + grace`, and handed out again.
//!
//! Shutdown: [`JobQueue::shutdown`] stops claiming and the background loops; it does not
//! wait for in-flight jobs. Anything cut short is redelivered after restart.

use anyhow::{anyhow, Result};
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use mediaflow_core::constants::JOB_NOTIFY_CHANNEL;
use mediaflow_core::models::{EnqueueOutcome, Job, JobOptions};
use mediaflow_core::{QueueSettings, TaskError};
use mediaflow_db::JobStore;

use crate::handler::JobHandler;

/// Upper bound on the delay between two attempts of one job.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Delay before the next attempt after attempt number `attempts_made` failed.
///
/// Exponential: `base * 2^(attempts_made - 1)`, capped at [`MAX_RETRY_BACKOFF_SECS`].
pub fn compute_retry_delay(base: Duration, attempts_made: i32) -> Duration {
    let exponent = (attempts_made.max(1) - 1).min(31) as u32;
    let cap = Duration::from_secs(MAX_RETRY_BACKOFF_SECS);
    base.checked_mul(1_u32 << exponent)
        .map_or(cap, |delay| delay.min(cap))
}

#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Jobs processed at the same time
    pub concurrency: usize,
    pub poll_interval: Duration,
    /// How often stalled jobs are checked and finished jobs purged
    pub maintenance_interval: Duration,
    /// Added to a job's timeout before an active attempt counts as stalled
    pub stalled_grace_period: Duration,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self::from(&QueueSettings::default())
    }
}

impl From<&QueueSettings> for JobQueueConfig {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            concurrency: settings.worker_concurrency.max(1),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            maintenance_interval: Duration::from_secs(settings.stalled_check_interval_secs),
            stalled_grace_period: Duration::from_secs(settings.stalled_grace_period_secs),
        }
    }
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Scheduled for another attempt after `delay`
    Retrying { delay: Duration },
    /// No further attempts
    Failed,
    /// The attempt no longer owned the job, so nothing was recorded
    Superseded,
}

/// A job handed to a consumer. Settle it with [`ack`](Self::ack) or [`fail`](Self::fail).
pub struct ClaimedJob {
    job: Job,
    store: Arc<dyn JobStore>,
}

impl ClaimedJob {
    fn new(job: Job, store: Arc<dyn JobStore>) -> Self {
        Self { job, store }
    }

    pub fn id(&self) -> Uuid {
        self.job.id
    }

    pub fn key(&self) -> &str {
        &self.job.job_key
    }

    pub fn name(&self) -> &str {
        &self.job.name
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.job.payload
    }

    pub fn attempts_made(&self) -> i32 {
        self.job.attempts_made
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Mark the job completed.
    ///
    /// Returns `false` if this attempt was already superseded by a redelivery.
    pub async fn ack(self) -> Result<bool> {
        self.store
            .complete(self.job.id, self.job.attempts_made)
            .await
    }

    /// Record a failed attempt and schedule a retry if the job has attempts left.
    ///
    /// Errors carrying an unrecoverable [`TaskError`] fail the job immediately.
    pub async fn fail(self, error: anyhow::Error) -> Result<FailureOutcome> {
        let unrecoverable = error
            .downcast_ref::<TaskError>()
            .map(|te| !te.is_recoverable())
            .unwrap_or(false);
        let message = format!("{:#}", error);

        if !unrecoverable && self.job.has_attempts_remaining() {
            let base = Duration::from_millis(self.job.backoff_delay_ms.max(0) as u64);
            let delay = compute_retry_delay(base, self.job.attempts_made);
            let retry_at = Utc::now()
                + chrono::Duration::from_std(delay)
                    .unwrap_or_else(|_| chrono::Duration::seconds(MAX_RETRY_BACKOFF_SECS as i64));

            tracing::info!(
                job_id = %self.job.id,
                job_key = %self.job.job_key,
                attempt = self.job.attempts_made,
                max_attempts = self.job.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Scheduling job retry"
            );

            let recorded = self
                .store
                .fail(self.job.id, self.job.attempts_made, &message, Some(retry_at))
                .await?;
            return Ok(if recorded {
                FailureOutcome::Retrying { delay }
            } else {
                FailureOutcome::Superseded
            });
        }

        tracing::error!(
            job_id = %self.job.id,
            job_key = %self.job.job_key,
            attempts_made = self.job.attempts_made,
            unrecoverable = unrecoverable,
            error = %message,
            "Job failed permanently"
        );

        let recorded = self
            .store
            .fail(self.job.id, self.job.attempts_made, &message, None)
            .await?;
        Ok(if recorded {
            FailureOutcome::Failed
        } else {
            FailureOutcome::Superseded
        })
    }
}

pub struct JobQueue {
    store: Arc<dyn JobStore>,
    config: JobQueueConfig,
    options: JobOptions,
    wakeup: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
}

impl JobQueue {
    /// `options` is the retry and retention policy attached to every enqueued job.
    pub fn new(store: Arc<dyn JobStore>, config: JobQueueConfig, options: JobOptions) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            config,
            options,
            wakeup: Arc::new(Notify::new()),
            shutdown_tx,
        }
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Enqueue a job unless a live job with the same key exists.
    #[tracing::instrument(skip(self, payload))]
    pub async fn enqueue<T: Serialize + Sync>(
        &self,
        name: &str,
        job_key: &str,
        payload: &T,
    ) -> Result<EnqueueOutcome> {
        let payload = serde_json::to_value(payload)?;
        let outcome = self
            .store
            .enqueue(job_key, name, payload, &self.options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, job_key = %job_key, "Failed to enqueue job");
                e
            })?;

        match outcome {
            EnqueueOutcome::Enqueued(job_id) => {
                tracing::debug!(job_id = %job_id, job_key = %job_key, "Job submitted to queue");
                self.wakeup.notify_one();
            }
            EnqueueOutcome::Duplicate => {
                tracing::debug!(job_key = %job_key, "Duplicate job ignored");
            }
        }

        Ok(outcome)
    }

    /// Endless stream of claimed jobs.
    ///
    /// Polls every `poll_interval` and also wakes on local enqueues and on Postgres
    /// notifications when a listener is running.
    pub fn consume(&self) -> BoxStream<'static, ClaimedJob> {
        let store = self.store.clone();
        let wakeup = self.wakeup.clone();
        let poll_interval = self.config.poll_interval;

        stream::unfold((store, wakeup), move |(store, wakeup)| async move {
            loop {
                match store.claim_next().await {
                    Ok(Some(job)) => {
                        let claimed = ClaimedJob::new(job, store.clone());
                        return Some((claimed, (store, wakeup)));
                    }
                    Ok(None) => tracing::trace!("No jobs available in queue"),
                    Err(e) => tracing::error!(error = %e, "Failed to claim job from queue"),
                }

                tokio::select! {
                    _ = wakeup.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        })
        .boxed()
    }

    /// Start the worker pool and the maintenance loop.
    ///
    /// With a `pool`, workers also wake on `LISTEN` notifications sent by enqueue.
    pub fn start(
        self: &Arc<Self>,
        handler: Arc<dyn JobHandler>,
        pool: Option<sqlx::PgPool>,
    ) -> JoinHandle<()> {
        if let Some(pool) = pool {
            self.spawn_listener(pool);
        }
        if !self.config.maintenance_interval.is_zero() {
            self.spawn_maintenance();
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.worker_pool(handler).await })
    }

    /// Redeliver stalled jobs and purge finished ones. Returns `(requeued, purged)`.
    pub async fn run_maintenance(&self) -> Result<(u64, u64)> {
        let requeued = self
            .store
            .requeue_stalled(self.config.stalled_grace_period)
            .await?;
        let purged = self.store.purge_finished().await?;

        if requeued > 0 {
            self.wakeup.notify_one();
        }

        Ok((requeued, purged))
    }

    /// Stop claiming jobs. Returns immediately; in-flight jobs keep running.
    pub fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        self.shutdown_tx.send_replace(true);
    }

    async fn worker_pool(self: Arc<Self>, handler: Arc<dyn JobHandler>) {
        tracing::info!(
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            job_name = handler.job_name(),
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut jobs = self.consume();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        while !*shutdown_rx.borrow_and_update() {
            let permit = tokio::select! {
                _ = shutdown_rx.changed() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let claimed = tokio::select! {
                _ = shutdown_rx.changed() => break,
                next = jobs.next() => match next {
                    Some(claimed) => claimed,
                    None => break,
                },
            };

            let handler = handler.clone();
            tokio::spawn(async move {
                let _permit = permit;
                Self::process_job(claimed, handler).await;
            });
        }

        tracing::info!("Job queue worker pool stopped");
    }

    #[tracing::instrument(skip_all, fields(job.id = %claimed.id(), job.key = %claimed.key(), attempt = claimed.attempts_made()))]
    async fn process_job(claimed: ClaimedJob, handler: Arc<dyn JobHandler>) {
        if claimed.name() != handler.job_name() {
            let error = TaskError::unrecoverable(anyhow!(
                "No handler registered for job '{}'",
                claimed.name()
            ));
            if let Err(e) = claimed.fail(error.into()).await {
                tracing::error!(error = %e, "Failed to record job failure");
            }
            return;
        }

        let started = Instant::now();
        let timeout = claimed.job().timeout();
        let result = tokio::time::timeout(timeout, handler.handle(claimed.job())).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let settled = match result {
            Ok(Ok(())) => {
                tracing::info!(duration_ms, "Job completed");
                claimed.ack().await.map(|_| ())
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, duration_ms, "Job attempt failed");
                claimed.fail(e).await.map(|_| ())
            }
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "Job attempt timed out");
                handler.on_timeout(claimed.job()).await;
                claimed
                    .fail(anyhow!(
                        "Job execution timed out after {}s",
                        timeout.as_secs()
                    ))
                    .await
                    .map(|_| ())
            }
        };

        if let Err(e) = settled {
            // Left active; the stalled-job check hands it out again
            tracing::error!(error = %e, "Failed to record job result");
        }
    }

    fn spawn_listener(&self, pool: sqlx::PgPool) {
        let wakeup = self.wakeup.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    result = listen_for_jobs(&pool, &wakeup) => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "Job notification listener failed, will retry");
                        }
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                }
            }
        });
    }

    fn spawn_maintenance(self: &Arc<Self>) {
        let queue = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(queue.config.maintenance_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = queue.run_maintenance().await {
                            tracing::error!(error = %e, "Job queue maintenance failed");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
    }
}

async fn listen_for_jobs(pool: &sqlx::PgPool, wakeup: &Notify) -> Result<(), sqlx::Error> {
    let mut listener = sqlx::postgres::PgListener::connect_with(pool).await?;
    listener.listen(JOB_NOTIFY_CHANNEL).await?;
    tracing::debug!(channel = JOB_NOTIFY_CHANNEL, "Listening for job notifications");
    loop {
        listener.recv().await?;
        wakeup.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockJobStore;
    use async_trait::async_trait;
    use mediaflow_core::models::JobStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn queue(store: Arc<MockJobStore>) -> Arc<JobQueue> {
        queue_with_options(store, JobOptions::default())
    }

    fn queue_with_options(store: Arc<MockJobStore>, options: JobOptions) -> Arc<JobQueue> {
        let config = JobQueueConfig {
            concurrency: 2,
            poll_interval: Duration::from_millis(20),
            maintenance_interval: Duration::ZERO,
            stalled_grace_period: Duration::from_secs(60),
        };
        Arc::new(JobQueue::new(store, config, options))
    }

    async fn claim_one(queue: &JobQueue) -> ClaimedJob {
        tokio::time::timeout(Duration::from_secs(2), queue.consume().next())
            .await
            .expect("no job claimed")
            .expect("stream ended")
    }

    struct CountingHandler {
        calls: AtomicUsize,
        timeouts: AtomicUsize,
        fail_with: Option<&'static str>,
        sleep: Duration,
    }

    impl CountingHandler {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                timeouts: AtomicUsize::new(0),
                fail_with: None,
                sleep: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        fn job_name(&self) -> &'static str {
            "transform"
        }

        async fn handle(&self, _job: &Job) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.sleep.is_zero() {
                tokio::time::sleep(self.sleep).await;
            }
            match self.fail_with {
                Some(message) => Err(anyhow!(message)),
                None => Ok(()),
            }
        }

        async fn on_timeout(&self, _job: &Job) {
            self.timeouts.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for_status(store: &MockJobStore, key: &str, status: JobStatus) -> Job {
        for _ in 0..200 {
            if let Some(job) = store.job_by_key(key) {
                if job.status == status {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {key} never reached {status}");
    }

    #[test]
    fn retry_delay_doubles_from_base() {
        let base = Duration::from_secs(2);
        assert_eq!(compute_retry_delay(base, 1), Duration::from_secs(2));
        assert_eq!(compute_retry_delay(base, 2), Duration::from_secs(4));
        assert_eq!(compute_retry_delay(base, 3), Duration::from_secs(8));
    }

    #[test]
    fn retry_delay_is_capped() {
        let base = Duration::from_secs(2);
        assert_eq!(
            compute_retry_delay(base, 9),
            Duration::from_secs(MAX_RETRY_BACKOFF_SECS)
        );
        assert_eq!(
            compute_retry_delay(base, i32::MAX),
            Duration::from_secs(MAX_RETRY_BACKOFF_SECS)
        );
    }

    #[test]
    fn config_from_settings() {
        let config = JobQueueConfig::from(&QueueSettings::default());
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn duplicate_key_is_not_enqueued_twice() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());

        let first = queue.enqueue("transform", "k1", &serde_json::json!({})).await.unwrap();
        let second = queue.enqueue("transform", "k1", &serde_json::json!({})).await.unwrap();

        assert!(first.is_enqueued());
        assert_eq!(second, EnqueueOutcome::Duplicate);
        assert_eq!(store.jobs().len(), 1);
    }

    #[tokio::test]
    async fn consume_yields_enqueued_job() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        queue
            .enqueue("transform", "k1", &serde_json::json!({"media_id": "x"}))
            .await
            .unwrap();

        let claimed = claim_one(&queue).await;
        assert_eq!(claimed.key(), "k1");
        assert_eq!(claimed.attempts_made(), 1);
        assert_eq!(claimed.payload()["media_id"], "x");

        claimed.ack().await.unwrap();
        assert_eq!(store.job_by_key("k1").unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn failure_with_attempts_left_is_delayed() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        queue.enqueue("transform", "k1", &()).await.unwrap();

        let before = Utc::now();
        let outcome = claim_one(&queue).await.fail(anyhow!("boom")).await.unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::Retrying {
                delay: Duration::from_secs(2)
            }
        );

        let job = store.job_by_key("k1").unwrap();
        assert_eq!(job.status, JobStatus::Delayed);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
        assert!(job.run_at >= before + chrono::Duration::seconds(2));
    }

    #[tokio::test]
    async fn last_attempt_failure_is_final() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        queue.enqueue("transform", "k1", &()).await.unwrap();

        for attempt in 1..=3 {
            let claimed = claim_one(&queue).await;
            assert_eq!(claimed.attempts_made(), attempt);
            let outcome = claimed.fail(anyhow!("boom")).await.unwrap();
            if attempt < 3 {
                assert!(matches!(outcome, FailureOutcome::Retrying { .. }));
                store.make_due("k1");
            } else {
                assert_eq!(outcome, FailureOutcome::Failed);
            }
        }

        assert_eq!(store.job_by_key("k1").unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn unrecoverable_error_skips_remaining_attempts() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        queue.enqueue("transform", "k1", &()).await.unwrap();

        let error: anyhow::Error = TaskError::unrecoverable(anyhow!("bad payload")).into();
        let outcome = claim_one(&queue).await.fail(error).await.unwrap();

        assert_eq!(outcome, FailureOutcome::Failed);
        assert_eq!(store.job_by_key("k1").unwrap().attempts_made, 1);
    }

    #[tokio::test]
    async fn stalled_job_is_redelivered_and_keeps_attempt_count() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        queue.enqueue("transform", "k1", &()).await.unwrap();

        // Claimed and never settled, as if the worker died
        let lost = claim_one(&queue).await;
        drop(lost);
        store.backdate_start("k1", 3600);

        let (requeued, purged) = queue.run_maintenance().await.unwrap();
        assert_eq!((requeued, purged), (1, 0));

        let redelivered = claim_one(&queue).await;
        assert_eq!(redelivered.attempts_made(), 2);
    }

    #[tokio::test]
    async fn superseded_attempt_cannot_settle_redelivered_job() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        queue.enqueue("transform", "k1", &()).await.unwrap();

        let slow = claim_one(&queue).await;
        store.backdate_start("k1", 3600);
        queue.run_maintenance().await.unwrap();
        let redelivered = claim_one(&queue).await;
        assert_eq!(redelivered.attempts_made(), 2);

        // The first attempt finishes late and must not touch the second one
        assert!(!slow.ack().await.unwrap());
        let job = store.job_by_key("k1").unwrap();
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.attempts_made, 2);

        let outcome = redelivered.fail(anyhow!("boom")).await.unwrap();
        assert!(matches!(outcome, FailureOutcome::Retrying { .. }));
        assert_eq!(store.job_by_key("k1").unwrap().status, JobStatus::Delayed);
    }

    #[tokio::test]
    async fn superseded_attempt_failure_is_not_recorded() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        queue.enqueue("transform", "k1", &()).await.unwrap();

        let slow = claim_one(&queue).await;
        store.backdate_start("k1", 3600);
        queue.run_maintenance().await.unwrap();
        let redelivered = claim_one(&queue).await;

        let outcome = slow.fail(anyhow!("late failure")).await.unwrap();
        assert_eq!(outcome, FailureOutcome::Superseded);
        assert_eq!(store.job_by_key("k1").unwrap().status, JobStatus::Active);

        assert!(redelivered.ack().await.unwrap());
        assert_eq!(store.job_by_key("k1").unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn finished_jobs_are_purged_after_retention() {
        let store = Arc::new(MockJobStore::new());
        let options = JobOptions {
            remove_on_complete: Duration::ZERO,
            ..JobOptions::default()
        };
        let queue = queue_with_options(store.clone(), options);
        queue.enqueue("transform", "k1", &()).await.unwrap();
        claim_one(&queue).await.ack().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (_, purged) = queue.run_maintenance().await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.jobs().is_empty());
    }

    #[test]
    fn non_task_error_treated_as_recoverable() {
        let err: anyhow::Error = anyhow!("generic error");
        let is_unrecoverable = err
            .downcast_ref::<TaskError>()
            .map(|te| !te.is_recoverable())
            .unwrap_or(false);
        assert!(!is_unrecoverable);
    }

    #[tokio::test]
    async fn worker_pool_runs_handler_and_acks() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        let handler = Arc::new(CountingHandler::new());

        let pool = queue.start(handler.clone(), None);
        queue.enqueue("transform", "k1", &()).await.unwrap();

        wait_for_status(&store, "k1", JobStatus::Completed).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        queue.shutdown();
        tokio::time::timeout(Duration::from_secs(2), pool)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn worker_pool_records_handler_failure() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        let handler = Arc::new(CountingHandler {
            fail_with: Some("codec exploded"),
            ..CountingHandler::new()
        });

        queue.start(handler, None);
        queue.enqueue("transform", "k1", &()).await.unwrap();

        let job = wait_for_status(&store, "k1", JobStatus::Delayed).await;
        assert_eq!(job.attempts_made, 1);
        assert_eq!(job.last_error.as_deref(), Some("codec exploded"));
        queue.shutdown();
    }

    #[tokio::test]
    async fn worker_pool_times_out_slow_handler() {
        let store = Arc::new(MockJobStore::new());
        let options = JobOptions {
            timeout: Duration::from_secs(1),
            ..JobOptions::default()
        };
        let queue = queue_with_options(store.clone(), options);
        let handler = Arc::new(CountingHandler {
            sleep: Duration::from_secs(30),
            ..CountingHandler::new()
        });

        queue.start(handler.clone(), None);
        queue.enqueue("transform", "k1", &()).await.unwrap();

        let job = wait_for_status(&store, "k1", JobStatus::Delayed).await;
        assert!(job.last_error.unwrap().contains("timed out"));
        assert_eq!(handler.timeouts.load(Ordering::SeqCst), 1);
        queue.shutdown();
    }

    #[tokio::test]
    async fn unknown_job_name_fails_permanently() {
        let store = Arc::new(MockJobStore::new());
        let queue = queue(store.clone());
        let handler = Arc::new(CountingHandler::new());

        queue.start(handler.clone(), None);
        queue.enqueue("resize-video", "k1", &()).await.unwrap();

        wait_for_status(&store, "k1", JobStatus::Failed).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        queue.shutdown();
    }
}
