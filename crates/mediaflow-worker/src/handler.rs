//! Job handler trait
//!
//! The worker pool calls `handle` for every claimed job whose name matches
//! `job_name`. Returning an error fails the attempt; wrap it in
//! [`mediaflow_core::TaskError::unrecoverable`] to skip the remaining attempts.

use anyhow::Result;
use async_trait::async_trait;

use mediaflow_core::models::Job;

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Name of the jobs this handler processes
    fn job_name(&self) -> &'static str;

    async fn handle(&self, job: &Job) -> Result<()>;

    /// Called after `handle` was cancelled for running past the job's timeout.
    ///
    /// The cancelled future never reaches its own error path, so any state it would
    /// have written on failure has to be written here.
    async fn on_timeout(&self, _job: &Job) {}
}
