//! Upload ingestion
//!
//! Accepts an upload, stores the original, creates the media record and enqueues its
//! transform job, in that order.

use bytes::Bytes;
use mediaflow_core::constants::TRANSFORM_JOB_NAME;
use mediaflow_core::models::{
    EnqueueOutcome, MediaStatus, NewMediaRecord, TransformJobPayload, TransformOptions,
};
use mediaflow_core::{AppError, Config};
use mediaflow_db::MediaStore;
use mediaflow_storage::{keys, Storage};
use mediaflow_worker::JobQueue;
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::PipelineMetrics;

/// One uploaded file as received by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub mimetype: String,
    pub original_name: String,
    pub transform: Option<TransformOptions>,
}

impl UploadRequest {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// What an upload must satisfy before anything is written.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub allowed_content_types: Vec<String>,
    pub max_file_size_bytes: usize,
}

impl UploadLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            allowed_content_types: config.allowed_content_types().to_vec(),
            max_file_size_bytes: config.max_file_size_bytes(),
        }
    }

    pub fn validate(&self, request: &UploadRequest) -> Result<(), AppError> {
        if request.bytes.is_empty() {
            return Err(AppError::InvalidInput("File is empty".to_string()));
        }

        if request.size() > self.max_file_size_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File size {} bytes exceeds the maximum of {} bytes",
                request.size(),
                self.max_file_size_bytes
            )));
        }

        let mimetype = request.mimetype.trim().to_ascii_lowercase();
        if !self
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&mimetype))
        {
            return Err(AppError::UnsupportedMediaType(format!(
                "Content type '{}' is not allowed. Allowed types: {}",
                request.mimetype,
                self.allowed_content_types.join(", ")
            )));
        }

        Ok(())
    }
}

pub struct IngestionService {
    media: Arc<dyn MediaStore>,
    storage: Arc<dyn Storage>,
    queue: Arc<JobQueue>,
    metrics: Arc<PipelineMetrics>,
    limits: UploadLimits,
}

impl IngestionService {
    pub fn new(
        media: Arc<dyn MediaStore>,
        storage: Arc<dyn Storage>,
        queue: Arc<JobQueue>,
        metrics: Arc<PipelineMetrics>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            media,
            storage,
            queue,
            metrics,
            limits,
        }
    }

    /// Accept an upload and return the new media id.
    ///
    /// A failed record write leaves the stored original behind; it is logged with its
    /// key. A failed enqueue leaves the record `PENDING` for [`resubmit`](Self::resubmit).
    #[tracing::instrument(skip(self, request), fields(mimetype = %request.mimetype, size = request.size()))]
    pub async fn submit(&self, request: UploadRequest) -> Result<Uuid, AppError> {
        if let Err(e) = self.limits.validate(&request) {
            self.metrics.record_upload_rejected();
            return Err(e);
        }

        let media_id = Uuid::new_v4();
        let original_key = keys::original_key();
        let size = request.size() as i64;

        self.storage
            .put(&original_key, request.bytes, &request.mimetype)
            .await?;

        let record = NewMediaRecord {
            id: media_id,
            original_name: request.original_name,
            mimetype: request.mimetype,
            size,
            original_key: original_key.clone(),
            transform: request.transform,
        };

        if let Err(e) = self.media.create(record).await {
            tracing::warn!(
                error = %e,
                media_id = %media_id,
                key = %original_key,
                "Media record creation failed, stored original is orphaned"
            );
            return Err(e);
        }

        self.enqueue_transform(media_id).await?;
        self.metrics.record_upload_accepted();

        tracing::info!(media_id = %media_id, key = %original_key, "Upload accepted");
        Ok(media_id)
    }

    /// Queue a new transform job for a `FAILED` record, or a `PENDING` one whose
    /// enqueue failed at submit time.
    ///
    /// Returns whether a job was created; `false` means one was already live.
    #[tracing::instrument(skip(self), fields(media_id = %media_id))]
    pub async fn resubmit(&self, media_id: Uuid) -> Result<bool, AppError> {
        let record = self
            .media
            .find_by_id(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", media_id)))?;

        if !matches!(record.status, MediaStatus::Failed | MediaStatus::Pending) {
            return Err(AppError::InvalidInput(format!(
                "Only failed or pending media can be retried, current status is {}",
                record.status
            )));
        }

        let outcome = self.enqueue_transform(media_id).await?;
        tracing::info!(enqueued = outcome.is_enqueued(), "Transform resubmitted");
        Ok(outcome.is_enqueued())
    }

    async fn enqueue_transform(&self, media_id: Uuid) -> Result<EnqueueOutcome, AppError> {
        let outcome = self
            .queue
            .enqueue(
                TRANSFORM_JOB_NAME,
                &media_id.to_string(),
                &TransformJobPayload { media_id },
            )
            .await
            .map_err(|e| AppError::Queue(format!("Failed to enqueue transform job: {:#}", e)))?;

        self.metrics.record_enqueue(outcome.is_enqueued());
        Ok(outcome)
    }
}
