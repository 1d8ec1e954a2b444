use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mediaflow_core::constants::JOB_NOTIFY_CHANNEL;
use mediaflow_core::models::{EnqueueOutcome, Job, JobOptions};
use sqlx::{PgPool, Postgres, Row};
use std::time::Duration;
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, job_key, name, payload, status, attempts_made, max_attempts, \
     backoff_delay_ms, timeout_seconds, run_at, started_at, finished_at, last_error, \
     remove_on_complete_secs, remove_on_fail_secs, created_at, updated_at";

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a waiting job and notify listening workers.
    ///
    /// The partial unique index on live job keys turns a concurrent duplicate into a
    /// no-op insert, reported as [`EnqueueOutcome::Duplicate`].
    #[tracing::instrument(skip(self, payload, options))]
    pub async fn create_job(
        &self,
        job_key: &str,
        name: &str,
        payload: serde_json::Value,
        options: &JobOptions,
    ) -> Result<EnqueueOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for job creation")?;

        let job_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (
                job_key, name, payload, status, max_attempts, backoff_delay_ms,
                timeout_seconds, run_at, remove_on_complete_secs, remove_on_fail_secs
            )
            VALUES ($1, $2, $3, 'waiting', $4, $5, $6, NOW(), $7, $8)
            ON CONFLICT (job_key) WHERE status IN ('waiting', 'active', 'delayed') DO NOTHING
            RETURNING id
            "#,
        )
        .bind(job_key)
        .bind(name)
        .bind(payload)
        .bind(options.attempts.max(1) as i32)
        .bind(options.backoff_delay.as_millis() as i64)
        .bind(options.timeout.as_secs().max(1) as i32)
        .bind(options.remove_on_complete.as_secs() as i64)
        .bind(options.remove_on_fail.as_secs() as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, job_key = %job_key, "Failed to insert job into database");
            anyhow::anyhow!("Failed to insert job into database: {}", e)
        })?;

        let Some(job_id) = job_id else {
            tx.rollback().await.ok();
            tracing::debug!(job_key = %job_key, "Live job already exists for key, skipping enqueue");
            return Ok(EnqueueOutcome::Duplicate);
        };

        // Workers fall back to polling if the notification is lost
        if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
            .bind(JOB_NOTIFY_CHANNEL)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(
                error = %e,
                job_id = %job_id,
                "Failed to send pg_notify for new job, workers will discover it via polling"
            );
        }

        tx.commit()
            .await
            .context("Failed to commit job creation")?;

        tracing::info!(job_id = %job_id, job_key = %job_key, name = %name, "Job enqueued");

        Ok(EnqueueOutcome::Enqueued(job_id))
    }

    pub async fn claim_next_job(&self) -> Result<Option<Job>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let next: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM jobs
            WHERE status IN ('waiting', 'delayed')
                AND run_at <= NOW()
            ORDER BY run_at ASC, created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch next job")?;

        let Some(job_id) = next else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        let query = format!(
            "UPDATE jobs \
             SET status = 'active', \
                 attempts_made = attempts_made + 1, \
                 started_at = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {JOB_COLUMNS}"
        );

        let job = sqlx::query_as::<Postgres, Job>(&query)
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to mark job active")?;

        tx.commit().await.context("Failed to commit transaction")?;

        tracing::debug!(
            job_id = %job.id,
            job_key = %job.job_key,
            attempt = job.attempts_made,
            max_attempts = job.max_attempts,
            "Job claimed"
        );

        Ok(Some(job))
    }

    /// Settlement is fenced on the attempt: only the attempt that currently owns the
    /// active job can complete, delay or fail it.
    #[tracing::instrument(skip(self))]
    pub async fn mark_completed(&self, job_id: Uuid, attempt: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                finished_at = NOW(),
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1
                AND status = 'active'
                AND attempts_made = $2
            "#,
        )
        .bind(job_id)
        .bind(attempt)
        .execute(&self.pool)
        .await
        .context("Failed to mark job completed")?;

        Ok(settled(result.rows_affected(), job_id, attempt))
    }

    #[tracing::instrument(skip(self, error))]
    pub async fn mark_delayed(
        &self,
        job_id: Uuid,
        attempt: i32,
        error: &str,
        run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'delayed',
                run_at = $3,
                last_error = $4,
                started_at = NULL,
                updated_at = NOW()
            WHERE id = $1
                AND status = 'active'
                AND attempts_made = $2
            "#,
        )
        .bind(job_id)
        .bind(attempt)
        .bind(run_at)
        .bind(error)
        .execute(&self.pool)
        .await
        .context("Failed to delay job")?;

        Ok(settled(result.rows_affected(), job_id, attempt))
    }

    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(&self, job_id: Uuid, attempt: i32, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                finished_at = NOW(),
                last_error = $3,
                updated_at = NOW()
            WHERE id = $1
                AND status = 'active'
                AND attempts_made = $2
            "#,
        )
        .bind(job_id)
        .bind(attempt)
        .bind(error)
        .execute(&self.pool)
        .await
        .context("Failed to mark job failed")?;

        Ok(settled(result.rows_affected(), job_id, attempt))
    }

    /// Redeliver or fail active jobs whose attempt outlived `timeout_seconds + grace`.
    ///
    /// The lost attempt stays counted, so a job that keeps crashing workers still
    /// runs out of attempts.
    #[tracing::instrument(skip(self))]
    pub async fn requeue_stalled_jobs(&self, grace: Duration) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE
                    WHEN attempts_made < max_attempts THEN 'waiting'::job_status
                    ELSE 'failed'::job_status
                END,
                finished_at = CASE
                    WHEN attempts_made < max_attempts THEN NULL
                    ELSE NOW()
                END,
                run_at = NOW(),
                started_at = NULL,
                last_error = 'job stalled',
                updated_at = NOW()
            WHERE status = 'active'
                AND started_at IS NOT NULL
                AND started_at + make_interval(secs => timeout_seconds + $1) < NOW()
            "#,
        )
        .bind(grace.as_secs_f64())
        .execute(&self.pool)
        .await
        .context("Failed to requeue stalled jobs")?;

        let count = result.rows_affected();
        if count > 0 {
            tracing::warn!(count = count, "Requeued stalled jobs");
        }

        Ok(count)
    }

    /// Delete finished jobs older than their own retention.
    #[tracing::instrument(skip(self))]
    pub async fn delete_expired_jobs(&self) -> Result<u64> {
        let row = sqlx::query(
            r#"
            WITH deleted AS (
                DELETE FROM jobs
                WHERE (status = 'completed'
                        AND finished_at < NOW() - make_interval(secs => remove_on_complete_secs))
                   OR (status = 'failed'
                        AND finished_at < NOW() - make_interval(secs => remove_on_fail_secs))
                RETURNING id
            )
            SELECT COUNT(*)::bigint FROM deleted
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to delete expired jobs")?;

        let count: i64 = row.get(0);
        let count = count.max(0) as u64;

        if count > 0 {
            tracing::info!(count = count, "Deleted expired jobs");
        }

        Ok(count)
    }
}

fn settled(rows_affected: u64, job_id: Uuid, attempt: i32) -> bool {
    if rows_affected == 0 {
        tracing::warn!(
            job_id = %job_id,
            attempt = attempt,
            "Job attempt no longer active, result discarded"
        );
        return false;
    }
    true
}
