pub mod files;
pub mod health;
pub mod media_get;
pub mod media_retry;
pub mod media_upload;
pub mod metrics;
