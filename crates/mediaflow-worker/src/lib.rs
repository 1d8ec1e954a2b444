//! Mediaflow Worker
//!
//! The durable job queue: enqueue with per-key dedup, a consumer stream of claimed
//! jobs, a bounded worker pool with per-attempt timeouts and exponential retry, and the
//! maintenance loop that redelivers stalled jobs and purges finished ones.

pub mod handler;
pub mod queue;

pub use handler::JobHandler;
pub use queue::{
    compute_retry_delay, ClaimedJob, FailureOutcome, JobQueue, JobQueueConfig,
    MAX_RETRY_BACKOFF_SECS,
};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
