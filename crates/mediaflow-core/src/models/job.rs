use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use crate::config::QueueSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "job_status", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Ready to be claimed
    Waiting,
    /// Claimed by a consumer
    Active,
    /// Waiting out a retry backoff
    Delayed,
    Completed,
    Failed,
}

impl JobStatus {
    /// Statuses during which the job key is reserved against duplicate enqueues.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            JobStatus::Waiting | JobStatus::Active | JobStatus::Delayed
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Active => write!(f, "active"),
            JobStatus::Delayed => write!(f, "delayed"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A queued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Job {
    pub id: Uuid,
    /// Deduplication key; the media id for transform jobs
    pub job_key: String,
    pub name: String,
    pub payload: JsonValue,
    pub status: JobStatus,
    /// Attempts started so far, including the one in flight
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub backoff_delay_ms: i64,
    pub timeout_seconds: i32,
    pub run_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub remove_on_complete_secs: i64,
    pub remove_on_fail_secs: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn has_attempts_remaining(&self) -> bool {
        self.attempts_made < self.max_attempts
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1) as u64)
    }

    pub fn decode_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Retry and retention policy attached to a job at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Exponential backoff base: attempt `n` waits `delay * 2^(n-1)` before the next one
    pub backoff_delay: Duration,
    pub timeout: Duration,
    pub remove_on_complete: Duration,
    pub remove_on_fail: Duration,
}

impl From<&QueueSettings> for JobOptions {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            attempts: settings.attempts,
            backoff_delay: Duration::from_millis(settings.backoff_delay_ms),
            timeout: Duration::from_secs(settings.job_timeout_secs),
            remove_on_complete: Duration::from_secs(settings.remove_on_complete_secs),
            remove_on_fail: Duration::from_secs(settings.remove_on_fail_secs),
        }
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::from(&QueueSettings::default())
    }
}

/// Payload of a transform job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformJobPayload {
    pub media_id: Uuid,
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued(Uuid),
    /// A live job with the same key already exists
    Duplicate,
}

impl EnqueueOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, EnqueueOutcome::Enqueued(_))
    }
}
