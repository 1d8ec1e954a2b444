//! In-memory job store for tests
//!
//! Mirrors the claim, retry and dedup behavior of the Postgres repository without a
//! database connection.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediaflow_core::models::{EnqueueOutcome, Job, JobOptions, JobStatus};
use mediaflow_db::JobStore;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct MockJobStore {
    jobs: Mutex<Vec<Job>>,
    fail_enqueue: AtomicBool,
}

impl MockJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent enqueue return an error
    pub fn set_fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Every job ever enqueued, in insertion order
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    /// Most recent job with `key`
    pub fn job_by_key(&self, key: &str) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|job| job.job_key == key)
            .cloned()
    }

    /// Pull a delayed job's retry time to now
    pub fn make_due(&self, key: &str) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().rev().find(|job| job.job_key == key) {
            job.run_at = Utc::now();
        }
    }

    /// Pretend the active attempt started `secs` seconds ago
    pub fn backdate_start(&self, key: &str, secs: i64) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().rev().find(|job| job.job_key == key) {
            job.started_at = job
                .started_at
                .map(|at| at - chrono::Duration::seconds(secs));
        }
    }

    /// Apply `apply` only while attempt `attempt` still owns the active job
    fn settle(&self, job_id: Uuid, attempt: i32, apply: impl FnOnce(&mut Job)) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or_else(|| anyhow!("job {} not found", job_id))?;
        if job.status != JobStatus::Active || job.attempts_made != attempt {
            return Ok(false);
        }
        apply(job);
        job.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl JobStore for MockJobStore {
    async fn enqueue(
        &self,
        job_key: &str,
        name: &str,
        payload: JsonValue,
        options: &JobOptions,
    ) -> Result<EnqueueOutcome> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(anyhow!("queue unavailable"));
        }

        let mut jobs = self.jobs.lock().unwrap();
        if jobs
            .iter()
            .any(|job| job.job_key == job_key && job.status.is_live())
        {
            return Ok(EnqueueOutcome::Duplicate);
        }

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            job_key: job_key.to_string(),
            name: name.to_string(),
            payload,
            status: JobStatus::Waiting,
            attempts_made: 0,
            max_attempts: options.attempts.max(1) as i32,
            backoff_delay_ms: options.backoff_delay.as_millis() as i64,
            timeout_seconds: options.timeout.as_secs().max(1) as i32,
            run_at: now,
            started_at: None,
            finished_at: None,
            last_error: None,
            remove_on_complete_secs: options.remove_on_complete.as_secs() as i64,
            remove_on_fail_secs: options.remove_on_fail.as_secs() as i64,
            created_at: now,
            updated_at: now,
        };
        let id = job.id;
        jobs.push(job);
        Ok(EnqueueOutcome::Enqueued(id))
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let next = jobs.iter_mut().find(|job| {
            matches!(job.status, JobStatus::Waiting | JobStatus::Delayed) && job.run_at <= now
        });

        Ok(next.map(|job| {
            job.status = JobStatus::Active;
            job.attempts_made += 1;
            job.started_at = Some(now);
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn complete(&self, job_id: Uuid, attempt: i32) -> Result<bool> {
        self.settle(job_id, attempt, |job| {
            job.status = JobStatus::Completed;
            job.finished_at = Some(Utc::now());
            job.last_error = None;
        })
    }

    async fn fail(
        &self,
        job_id: Uuid,
        attempt: i32,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        self.settle(job_id, attempt, |job| {
            job.last_error = Some(error.to_string());
            match retry_at {
                Some(run_at) => {
                    job.status = JobStatus::Delayed;
                    job.run_at = run_at;
                    job.started_at = None;
                }
                None => {
                    job.status = JobStatus::Failed;
                    job.finished_at = Some(Utc::now());
                }
            }
        })
    }

    async fn requeue_stalled(&self, grace: Duration) -> Result<u64> {
        let now = Utc::now();
        let grace = chrono::Duration::from_std(grace)?;
        let mut count = 0;
        for job in self.jobs.lock().unwrap().iter_mut() {
            let Some(started_at) = job.started_at else {
                continue;
            };
            let deadline = started_at + chrono::Duration::seconds(job.timeout_seconds as i64) + grace;
            if job.status == JobStatus::Active && deadline < now {
                job.status = if job.has_attempts_remaining() {
                    JobStatus::Waiting
                } else {
                    JobStatus::Failed
                };
                job.run_at = now;
                job.started_at = None;
                job.last_error = Some("job stalled".to_string());
                count += 1;
            }
        }
        Ok(count)
    }

    async fn purge_finished(&self) -> Result<u64> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|job| {
            let retention = match job.status {
                JobStatus::Completed => job.remove_on_complete_secs,
                JobStatus::Failed => job.remove_on_fail_secs,
                _ => return true,
            };
            job.finished_at
                .map_or(true, |at| at + chrono::Duration::seconds(retention) >= now)
        });
        Ok((before - jobs.len()) as u64)
    }
}
