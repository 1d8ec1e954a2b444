use chrono::Utc;
use mediaflow_core::models::MediaRecord;
use mediaflow_core::{AppError, CleanupSettings};
use mediaflow_db::MediaStore;
use mediaflow_storage::Storage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::schedule::next_run_after;
use crate::metrics::PipelineMetrics;

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub candidates: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Objects that could not be deleted although their row was removed
    pub storage_leaks: usize,
}

#[derive(Clone)]
pub struct CleanupService {
    media: Arc<dyn MediaStore>,
    storage: Arc<dyn Storage>,
    settings: CleanupSettings,
    metrics: Arc<PipelineMetrics>,
}

impl CleanupService {
    pub fn new(
        media: Arc<dyn MediaStore>,
        storage: Arc<dyn Storage>,
        settings: CleanupSettings,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            media,
            storage,
            settings,
            metrics,
        }
    }

    /// Start the daily sweep at the configured local hour.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = next_run_after(now, self.settings.timezone, self.settings.hour);
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

                tracing::info!(
                    next_run = %next,
                    timezone = %self.settings.timezone,
                    "Next retention sweep scheduled"
                );
                tokio::time::sleep(wait).await;

                tracing::info!("Starting scheduled retention sweep");
                if let Err(e) = self.run_cleanup().await {
                    tracing::error!(error = %e, "Retention sweep failed");
                }
            }
        })
    }

    /// Delete one batch of expired media: their objects first, then their rows.
    ///
    /// Object deletion failures are counted as storage leaks and the row is still removed.
    /// A row that cannot be deleted counts as failed. No single item aborts the batch.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expire_media"))]
    pub async fn run_cleanup(&self) -> Result<CleanupSummary, AppError> {
        let now = Utc::now();
        let completed_before = now - chrono::Duration::days(self.settings.completed_retention_days);
        let failed_before = now - chrono::Duration::days(self.settings.failed_retention_days);

        let expired = self
            .media
            .find_expired(completed_before, failed_before, self.settings.batch_size)
            .await?;

        let mut summary = CleanupSummary {
            candidates: expired.len(),
            ..CleanupSummary::default()
        };

        for record in expired {
            summary.storage_leaks += self.delete_objects(&record).await;

            match self.media.delete_by_id(record.id).await {
                Ok(removed) => {
                    if !removed {
                        tracing::debug!(media_id = %record.id, "Media row already gone");
                    }
                    summary.deleted += 1;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        media_id = %record.id,
                        "Failed to delete media from database"
                    );
                    summary.failed += 1;
                }
            }
        }

        self.metrics
            .record_cleanup_run(summary.deleted, summary.failed, summary.storage_leaks);

        tracing::info!(
            candidates = summary.candidates,
            deleted = summary.deleted,
            failed = summary.failed,
            storage_leaks = summary.storage_leaks,
            "Retention sweep finished"
        );

        Ok(summary)
    }

    /// Returns the number of objects that could not be deleted.
    async fn delete_objects(&self, record: &MediaRecord) -> usize {
        tracing::info!(
            media_id = %record.id,
            status = %record.status,
            updated_at = %record.updated_at,
            "Deleting expired media"
        );

        let mut leaks = 0;
        for key in record.object_keys() {
            if let Err(e) = self.storage.delete(key).await {
                tracing::error!(
                    error = %e,
                    media_id = %record.id,
                    key = %key,
                    "Failed to delete object from storage, continuing with database deletion"
                );
                leaks += 1;
            }
        }
        leaks
    }
}
