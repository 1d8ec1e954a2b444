//! Storage abstraction traits
//!
//! Backends implement [`Storage`] for object bytes and [`UrlSigner`] for issuing
//! time-limited retrieval links. The pipeline only ever talks to these traits.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use mediaflow_core::AppError;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::InvalidSignature(msg) => AppError::Forbidden(msg),
            StorageError::ConfigError(msg) => AppError::Config(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Object storage capability.
///
/// Keys are opaque strings produced by [`crate::keys`]. Writes of the same key
/// overwrite; deleting a missing key succeeds.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key` with the given content type.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Fetch the full object stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Make sure the bucket (or root directory) exists. Idempotent; called at boot.
    async fn ensure_bucket(&self) -> StorageResult<()>;

    fn backend_type(&self) -> StorageBackend;
}

/// Issues capability-bearing, time-limited GET links for stored objects.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaflow_core::ErrorMetadata;

    #[test]
    fn test_storage_error_maps_to_transient_app_error() {
        let err: AppError = StorageError::UploadFailed("connection reset".to_string()).into();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_invalid_key_maps_to_client_error() {
        let err: AppError = StorageError::InvalidKey("../etc/passwd".to_string()).into();
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_bad_signature_is_forbidden() {
        let err: AppError = StorageError::InvalidSignature("Signature mismatch".to_string()).into();
        assert_eq!(err.http_status_code(), 403);
    }
}
