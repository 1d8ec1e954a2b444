//! Transformation worker
//!
//! Turns one media record's original into an optimized image and a thumbnail.
//!
//! The handler is safe to run more than once per record: a record that is already
//! `COMPLETED` with both outputs is acknowledged without any writes, and every attempt
//! writes its outputs under fresh keys.

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use mediaflow_core::constants::{DERIVED_CONTENT_TYPE, TRANSFORM_JOB_NAME};
use mediaflow_core::models::{
    DerivedKeys, Job, MediaRecord, MediaStatus, MediaUpdate, TransformJobPayload,
    TransformOptions,
};
use mediaflow_core::{AppError, TaskError};
use mediaflow_db::MediaStore;
use mediaflow_processing::{ImageCodec, ResizeSpec};
use mediaflow_storage::{keys, Storage};
use mediaflow_worker::JobHandler;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::metrics::PipelineMetrics;

/// How a job for one record ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// The record no longer exists
    Discarded,
    /// Redelivery of a record that was already finished
    AlreadyCompleted,
    Completed(DerivedKeys),
}

pub struct TransformWorker {
    media: Arc<dyn MediaStore>,
    storage: Arc<dyn Storage>,
    codec: Arc<dyn ImageCodec>,
    metrics: Arc<PipelineMetrics>,
}

impl TransformWorker {
    pub fn new(
        media: Arc<dyn MediaStore>,
        storage: Arc<dyn Storage>,
        codec: Arc<dyn ImageCodec>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            media,
            storage,
            codec,
            metrics,
        }
    }

    /// Run the transformation for one record.
    ///
    /// On failure after the record was marked `PROCESSING` it is marked `FAILED` and the
    /// error is returned so the queue can retry.
    #[tracing::instrument(skip(self), fields(media_id = %media_id))]
    pub async fn process(&self, media_id: Uuid) -> Result<TransformOutcome, AppError> {
        let Some(record) = self.media.find_by_id(media_id).await? else {
            tracing::warn!("Media record not found, discarding job");
            return Ok(TransformOutcome::Discarded);
        };

        if record.is_settled() {
            tracing::info!("Media already processed, skipping");
            self.metrics.record_transform_skipped();
            return Ok(TransformOutcome::AlreadyCompleted);
        }

        self.media.update(media_id, MediaUpdate::Processing).await?;
        self.metrics.record_transform_started();
        let started = Instant::now();

        let keys = match self.render_outputs(&record).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(error = %e, "Media processing failed");
                self.metrics.record_transform_failed();
                if let Err(mark_err) = self.media.update(media_id, MediaUpdate::Failed).await {
                    tracing::error!(error = %mark_err, "Failed to mark media as failed");
                }
                return Err(e);
            }
        };

        self.media
            .update(media_id, MediaUpdate::Completed(keys.clone()))
            .await?;

        let elapsed = started.elapsed();
        self.metrics.record_transform_completed(elapsed);
        tracing::info!(
            optimized_key = %keys.optimized_key,
            thumbnail_key = %keys.thumbnail_key,
            duration_ms = elapsed.as_millis() as u64,
            "Media processing completed"
        );

        Ok(TransformOutcome::Completed(keys))
    }

    /// Mark a record `FAILED` after its attempt was cancelled mid-flight.
    ///
    /// Only a record still in `PROCESSING` is touched; one that completed just before
    /// the cancellation keeps its outputs.
    #[tracing::instrument(skip(self), fields(media_id = %media_id))]
    pub async fn abandon(&self, media_id: Uuid) -> Result<(), AppError> {
        let Some(record) = self.media.find_by_id(media_id).await? else {
            return Ok(());
        };
        if record.status != MediaStatus::Processing {
            return Ok(());
        }

        self.metrics.record_transform_failed();
        self.media.update(media_id, MediaUpdate::Failed).await?;
        tracing::warn!("Media processing abandoned, marked as failed");
        Ok(())
    }

    /// Fetch the original, encode both outputs and store them.
    async fn render_outputs(&self, record: &MediaRecord) -> Result<DerivedKeys, AppError> {
        let original = self.storage.get(&record.original_key).await?;

        let options = record
            .transform_options()
            .map_err(|e| AppError::InvalidInput(format!("Stored transform options are invalid: {}", e)))?;
        let resolved = TransformOptions::resolve(options.as_ref());

        let optimized = self
            .codec
            .resize_and_encode(original.clone(), ResizeSpec::from(resolved.optimized))
            .await?;
        let thumbnail = self
            .codec
            .resize_and_encode(original, ResizeSpec::from(resolved.thumbnail))
            .await?;

        let keys = DerivedKeys {
            optimized_key: keys::optimized_key(),
            thumbnail_key: keys::thumbnail_key(),
        };

        self.store_output(&keys.optimized_key, optimized).await?;
        self.store_output(&keys.thumbnail_key, thumbnail).await?;

        Ok(keys)
    }

    async fn store_output(&self, key: &str, data: Bytes) -> Result<(), AppError> {
        let size_bytes = data.len();
        self.storage.put(key, data, DERIVED_CONTENT_TYPE).await?;
        tracing::debug!(key = %key, size_bytes, "Output stored");
        Ok(())
    }
}

#[async_trait]
impl JobHandler for TransformWorker {
    fn job_name(&self) -> &'static str {
        TRANSFORM_JOB_NAME
    }

    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        let payload: TransformJobPayload = job
            .decode_payload()
            .context("Invalid transform job payload")
            .map_err(TaskError::unrecoverable)?;

        self.process(payload.media_id).await?;
        Ok(())
    }

    async fn on_timeout(&self, job: &Job) {
        let Ok(payload) = job.decode_payload::<TransformJobPayload>() else {
            return;
        };
        if let Err(e) = self.abandon(payload.media_id).await {
            tracing::error!(error = %e, media_id = %payload.media_id, "Failed to mark timed out media as failed");
        }
    }
}
