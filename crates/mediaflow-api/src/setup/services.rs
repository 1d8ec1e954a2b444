//! Service wiring: repositories, queue, pipeline services and background tasks.

use anyhow::{Context, Result};
use mediaflow_core::models::JobOptions;
use mediaflow_core::Config;
use mediaflow_db::{JobRepository, JobStore, MediaRepository, MediaStore};
use mediaflow_processing::WebpCodec;
use mediaflow_services::{
    CleanupService, IngestionService, PipelineMetrics, StatusService, TransformWorker,
    UploadLimits,
};
use mediaflow_storage::StorageHandle;
use mediaflow_worker::{JobQueue, JobQueueConfig};
use prometheus::Registry;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::state::AppState;
use crate::telemetry::HttpMetrics;

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Handles to everything that runs beside the HTTP server.
pub struct BackgroundTasks {
    pub queue: Arc<JobQueue>,
    pub worker: Option<JoinHandle<()>>,
    pub cleanup: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Stop claiming jobs, wait briefly for the worker pool, and cancel the retention schedule.
    pub async fn shutdown(self) {
        self.queue.shutdown();

        if let Some(worker) = self.worker {
            if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await.is_err() {
                tracing::warn!("Worker pool did not stop in time");
            }
        }

        if let Some(cleanup) = self.cleanup {
            cleanup.abort();
            tracing::info!("Retention sweep stopped");
        }
    }
}

/// Build the pipeline on top of Postgres and the configured storage.
///
/// All metrics are registered on one registry owned by the returned state.
pub fn setup_services(
    config: &Config,
    pool: PgPool,
    storage: StorageHandle,
) -> Result<(Arc<AppState>, BackgroundTasks)> {
    let registry = Registry::new();
    let metrics = Arc::new(
        PipelineMetrics::new(&registry).context("Failed to register pipeline metrics")?,
    );
    let http_metrics =
        HttpMetrics::new(&registry).context("Failed to register HTTP metrics")?;

    let media: Arc<dyn MediaStore> = Arc::new(MediaRepository::new(pool.clone()));
    let jobs: Arc<dyn JobStore> = Arc::new(JobRepository::new(pool.clone()));

    let queue = Arc::new(JobQueue::new(
        jobs,
        JobQueueConfig::from(config.queue()),
        JobOptions::from(config.queue()),
    ));

    let ingestion = Arc::new(IngestionService::new(
        media.clone(),
        storage.storage.clone(),
        queue.clone(),
        metrics.clone(),
        UploadLimits::from_config(config),
    ));

    let status = Arc::new(StatusService::new(
        media.clone(),
        storage.signer.clone(),
        config.signed_url_expiry(),
    ));

    let worker = if config.queue().worker_enabled {
        let handler = Arc::new(TransformWorker::new(
            media.clone(),
            storage.storage.clone(),
            Arc::new(WebpCodec::new()),
            metrics.clone(),
        ));
        tracing::info!(
            concurrency = config.queue().worker_concurrency,
            "Starting transform worker"
        );
        Some(queue.start(handler, Some(pool.clone())))
    } else {
        tracing::info!("Transform worker disabled");
        None
    };

    let cleanup = if config.cleanup().enabled {
        let service = Arc::new(CleanupService::new(
            media,
            storage.storage.clone(),
            config.cleanup().clone(),
            metrics.clone(),
        ));
        Some(service.start())
    } else {
        tracing::info!("Retention sweep disabled");
        None
    };

    let file_signer = storage.local.as_ref().map(|local| local.signer().clone());

    let state = Arc::new(AppState {
        pool: Some(pool),
        storage: storage.storage,
        file_signer,
        ingestion,
        status,
        registry,
        metrics,
        http_metrics,
        max_upload_bytes: config.max_file_size_bytes(),
    });

    Ok((
        state,
        BackgroundTasks {
            queue,
            worker,
            cleanup,
        },
    ))
}
