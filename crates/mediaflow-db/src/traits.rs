//! Store abstractions
//!
//! These traits define the minimal interface the services need from persistence,
//! allowing the pipeline to be tested against in-memory implementations.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediaflow_core::models::{
    EnqueueOutcome, Job, JobOptions, MediaRecord, MediaUpdate, NewMediaRecord,
};
use mediaflow_core::AppError;
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;

use crate::db::{JobRepository, MediaRepository};

/// Persistence of media records
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Insert a new record in `PENDING`
    async fn create(&self, record: NewMediaRecord) -> Result<MediaRecord, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaRecord>, AppError>;

    /// Apply a worker mutation and bump `updated_at`.
    ///
    /// Returns `NotFound` if the record no longer exists.
    async fn update(&self, id: Uuid, update: MediaUpdate) -> Result<MediaRecord, AppError>;

    /// Terminal records last touched before their retention cutoff, oldest first
    async fn find_expired(
        &self,
        completed_before: DateTime<Utc>,
        failed_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError>;

    /// Returns whether a row was removed
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Persistence of queued jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job unless a live job with the same key exists
    async fn enqueue(
        &self,
        job_key: &str,
        name: &str,
        payload: JsonValue,
        options: &JobOptions,
    ) -> Result<EnqueueOutcome>;

    /// Claim the next runnable job, marking it active and counting the attempt
    async fn claim_next(&self) -> Result<Option<Job>>;

    /// Mark attempt number `attempt` completed.
    ///
    /// Returns `false` when that attempt no longer owns the job, for example after the
    /// stalled-job check handed it out again; the job is left untouched.
    async fn complete(&self, job_id: Uuid, attempt: i32) -> Result<bool>;

    /// Record failed attempt number `attempt`.
    ///
    /// With `retry_at` the job is delayed until then; without it the job is failed for good.
    /// Returns `false`, changing nothing, when the attempt no longer owns the job.
    async fn fail(
        &self,
        job_id: Uuid,
        attempt: i32,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Return active jobs that outlived their timeout plus `grace` to the queue.
    ///
    /// Jobs with no attempts left are failed instead. Returns the number of jobs touched.
    async fn requeue_stalled(&self, grace: Duration) -> Result<u64>;

    /// Delete finished jobs past their per-job retention
    async fn purge_finished(&self) -> Result<u64>;
}

#[async_trait]
impl MediaStore for MediaRepository {
    async fn create(&self, record: NewMediaRecord) -> Result<MediaRecord, AppError> {
        MediaRepository::create(self, record).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaRecord>, AppError> {
        MediaRepository::find_by_id(self, id).await
    }

    async fn update(&self, id: Uuid, update: MediaUpdate) -> Result<MediaRecord, AppError> {
        MediaRepository::update(self, id, update).await
    }

    async fn find_expired(
        &self,
        completed_before: DateTime<Utc>,
        failed_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError> {
        MediaRepository::find_expired(self, completed_before, failed_before, limit).await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        MediaRepository::delete_by_id(self, id).await
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn enqueue(
        &self,
        job_key: &str,
        name: &str,
        payload: JsonValue,
        options: &JobOptions,
    ) -> Result<EnqueueOutcome> {
        self.create_job(job_key, name, payload, options).await
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        self.claim_next_job().await
    }

    async fn complete(&self, job_id: Uuid, attempt: i32) -> Result<bool> {
        self.mark_completed(job_id, attempt).await
    }

    async fn fail(
        &self,
        job_id: Uuid,
        attempt: i32,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        match retry_at {
            Some(run_at) => self.mark_delayed(job_id, attempt, error, run_at).await,
            None => self.mark_failed(job_id, attempt, error).await,
        }
    }

    async fn requeue_stalled(&self, grace: Duration) -> Result<u64> {
        self.requeue_stalled_jobs(grace).await
    }

    async fn purge_finished(&self) -> Result<u64> {
        self.delete_expired_jobs().await
    }
}
