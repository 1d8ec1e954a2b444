//! Shared key generation for storage backends.
//!
//! Every key gets a fresh random v4 UUID, so a retried job never overwrites an output
//! another attempt may still reference.

use crate::{StorageError, StorageResult};
use mediaflow_core::constants::{
    DERIVED_EXTENSION, OPTIMIZED_PREFIX, ORIGINAL_PREFIX, THUMBNAIL_PREFIX,
};
use uuid::Uuid;

/// Key for an uploaded original: `original/{uuid}`.
pub fn original_key() -> String {
    format!("{}/{}", ORIGINAL_PREFIX, Uuid::new_v4())
}

/// Key for an optimized output: `optimized/{uuid}.webp`.
pub fn optimized_key() -> String {
    format!("{}/{}.{}", OPTIMIZED_PREFIX, Uuid::new_v4(), DERIVED_EXTENSION)
}

/// Key for a thumbnail output: `thumbnails/{uuid}.webp`.
pub fn thumbnail_key() -> String {
    format!("{}/{}.{}", THUMBNAIL_PREFIX, Uuid::new_v4(), DERIVED_EXTENSION)
}

/// Reject keys that could escape the storage namespace.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}
