//! Storage setup and initialization

use anyhow::{Context, Result};
use mediaflow_core::Config;
use mediaflow_storage::{create_storage, StorageHandle};

/// Create the configured backend and make sure its bucket exists.
pub async fn setup_storage(config: &Config) -> Result<StorageHandle> {
    tracing::info!(backend = %config.storage_backend(), "Initializing storage...");
    let handle = create_storage(config)
        .await
        .context("Failed to create storage backend")?;

    handle
        .storage
        .ensure_bucket()
        .await
        .context("Failed to prepare storage bucket")?;

    tracing::info!(
        backend = %handle.storage.backend_type(),
        "Storage initialized successfully"
    );
    Ok(handle)
}
