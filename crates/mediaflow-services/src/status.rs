use mediaflow_core::constants::MAX_SIGNED_URL_EXPIRY_SECS;
use mediaflow_core::models::{MediaOutputs, MediaStatus, MediaStatusView};
use mediaflow_core::AppError;
use mediaflow_db::MediaStore;
use mediaflow_storage::UrlSigner;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Read side of the pipeline: current status plus fresh download links.
pub struct StatusService {
    media: Arc<dyn MediaStore>,
    signer: Arc<dyn UrlSigner>,
    url_expiry: Duration,
}

impl StatusService {
    /// `url_expiry` is capped at 15 minutes.
    pub fn new(media: Arc<dyn MediaStore>, signer: Arc<dyn UrlSigner>, url_expiry: Duration) -> Self {
        Self {
            media,
            signer,
            url_expiry: url_expiry.min(Duration::from_secs(MAX_SIGNED_URL_EXPIRY_SECS)),
        }
    }

    pub fn url_expiry(&self) -> Duration {
        self.url_expiry
    }

    /// Links are signed on every call and never cached.
    #[tracing::instrument(skip(self), fields(media_id = %media_id))]
    pub async fn get_status(&self, media_id: Uuid) -> Result<MediaStatusView, AppError> {
        let record = self
            .media
            .find_by_id(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", media_id)))?;

        let outputs = if record.status == MediaStatus::Completed {
            let (optimized, thumbnail) = tokio::try_join!(
                self.sign_output(record.optimized_key.as_deref()),
                self.sign_output(record.thumbnail_key.as_deref()),
            )?;
            MediaOutputs {
                optimized,
                thumbnail,
            }
        } else {
            MediaOutputs::default()
        };

        Ok(MediaStatusView {
            id: record.id,
            status: record.status,
            original_name: record.original_name,
            message: record.status.message(),
            outputs,
        })
    }

    async fn sign_output(&self, key: Option<&str>) -> Result<Option<String>, AppError> {
        match key {
            Some(key) => Ok(Some(self.signer.sign_get_url(key, self.url_expiry).await?)),
            None => Ok(None),
        }
    }
}
