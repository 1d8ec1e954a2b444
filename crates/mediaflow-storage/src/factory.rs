#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::{s3::S3Settings, S3Storage};
use crate::{Storage, StorageBackend, StorageError, StorageResult, UrlSigner};
use mediaflow_core::Config;
use std::sync::Arc;

/// A configured backend, exposed through both capabilities it provides.
#[derive(Clone)]
pub struct StorageHandle {
    pub storage: Arc<dyn Storage>,
    pub signer: Arc<dyn UrlSigner>,
    /// Set for the local backend, whose signed links are served by the API itself
    #[cfg(feature = "storage-local")]
    pub local: Option<Arc<LocalStorage>>,
}

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<StorageHandle> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let storage = Arc::new(
                S3Storage::new(S3Settings {
                    bucket: config.s3_bucket().to_string(),
                    region: config.s3_region().to_string(),
                    endpoint_url: config.s3_endpoint().map(String::from),
                    access_key: config.s3_access_key().map(String::from),
                    secret_key: config.s3_secret_key().map(String::from),
                })
                .await?,
            );
            Ok(StorageHandle {
                storage: storage.clone(),
                signer: storage,
                #[cfg(feature = "storage-local")]
                local: None,
            })
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;
            let secret = config.local_storage_signing_secret().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_SIGNING_SECRET not configured".to_string())
            })?;

            let storage = Arc::new(LocalStorage::new(base_path, base_url, secret));
            Ok(StorageHandle {
                storage: storage.clone(),
                signer: storage.clone(),
                local: Some(storage),
            })
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
