//! Test helpers for service and API tests
//!
//! In-memory doubles for the media store, object storage and image codec, plus a
//! [`TestPipeline`] that wires every service together without a database.

pub mod fixtures;
pub mod mock_repositories;
pub mod mock_storage;

pub use fixtures::*;
pub use mediaflow_worker::test_helpers::MockJobStore;
pub use mock_repositories::MockMediaRepository;
pub use mock_storage::MockStorage;

use anyhow::anyhow;
use futures::StreamExt;
use mediaflow_core::models::JobOptions;
use mediaflow_core::CleanupSettings;
use mediaflow_processing::{ImageCodec, WebpCodec};
use mediaflow_worker::{FailureOutcome, JobHandler, JobQueue, JobQueueConfig};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;

use crate::ingestion::{IngestionService, UploadLimits};
use crate::{CleanupService, PipelineMetrics, StatusService, TransformWorker};

/// Every service wired to in-memory collaborators.
pub struct TestPipeline {
    pub media: Arc<MockMediaRepository>,
    pub storage: Arc<MockStorage>,
    pub jobs: Arc<MockJobStore>,
    pub queue: Arc<JobQueue>,
    /// Holds every pipeline metric
    pub registry: Registry,
    pub metrics: Arc<PipelineMetrics>,
    pub ingestion: Arc<IngestionService>,
    pub worker: Arc<TransformWorker>,
    pub status: Arc<StatusService>,
    pub cleanup: Arc<CleanupService>,
}

impl TestPipeline {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(WebpCodec::new()))
    }

    pub fn with_codec(codec: Arc<dyn ImageCodec>) -> Self {
        Self::with_job_options(codec, JobOptions::default())
    }

    /// Pipeline whose queue attaches `options` to every job
    pub fn with_job_options(codec: Arc<dyn ImageCodec>, options: JobOptions) -> Self {
        let media = Arc::new(MockMediaRepository::new());
        let storage = Arc::new(MockStorage::new());
        let jobs = Arc::new(MockJobStore::new());
        let registry = Registry::new();
        let metrics = Arc::new(
            PipelineMetrics::new(&registry).expect("Failed to register pipeline metrics"),
        );

        let queue_config = JobQueueConfig {
            concurrency: 1,
            poll_interval: Duration::from_millis(10),
            maintenance_interval: Duration::ZERO,
            stalled_grace_period: Duration::from_secs(60),
        };
        let queue = Arc::new(JobQueue::new(jobs.clone(), queue_config, options));

        let ingestion = Arc::new(IngestionService::new(
            media.clone(),
            storage.clone(),
            queue.clone(),
            metrics.clone(),
            UploadLimits {
                allowed_content_types: vec![
                    "image/jpeg".to_string(),
                    "image/png".to_string(),
                    "image/webp".to_string(),
                    "image/gif".to_string(),
                ],
                max_file_size_bytes: 10 * 1024 * 1024,
            },
        ));
        let worker = Arc::new(TransformWorker::new(
            media.clone(),
            storage.clone(),
            codec,
            metrics.clone(),
        ));
        let status = Arc::new(StatusService::new(
            media.clone(),
            storage.clone(),
            Duration::from_secs(900),
        ));
        let cleanup = Arc::new(CleanupService::new(
            media.clone(),
            storage.clone(),
            CleanupSettings::default(),
            metrics.clone(),
        ));

        Self {
            media,
            storage,
            jobs,
            queue,
            registry,
            metrics,
            ingestion,
            worker,
            status,
            cleanup,
        }
    }

    /// Claim the next job and run it through the transform worker.
    ///
    /// Returns `None` when the job was acknowledged, or how the failure was recorded.
    pub async fn run_next_job(&self) -> anyhow::Result<Option<FailureOutcome>> {
        let claimed = tokio::time::timeout(Duration::from_secs(2), self.queue.consume().next())
            .await
            .map_err(|_| anyhow!("no job became available"))?
            .ok_or_else(|| anyhow!("job stream ended"))?;

        match self.worker.handle(claimed.job()).await {
            Ok(()) => {
                claimed.ack().await?;
                Ok(None)
            }
            Err(e) => Ok(Some(claimed.fail(e).await?)),
        }
    }
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self::new()
    }
}
