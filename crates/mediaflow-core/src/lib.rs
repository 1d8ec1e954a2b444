//! Mediaflow Core Library
//!
//! This crate provides the domain models, error types, configuration, and constants
//! shared by every Mediaflow component: the ingestion path, the transformation worker,
//! the status service, and the retention sweep.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod task_error;

// Re-export commonly used types
pub use config::{CleanupSettings, Config, MediaflowConfig, QueueSettings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
pub use task_error::{TaskError, TaskResultExt};
// Storage, StorageError and StorageResult live in mediaflow-storage
