//! Mediaflow Storage Library
//!
//! Object storage abstraction for the pipeline: the [`Storage`] trait for bytes and the
//! [`UrlSigner`] trait for time-limited download links, with S3-compatible and local
//! filesystem backends.
//!
//! # Storage key format
//!
//! - Originals: `original/{uuid}`
//! - Optimized outputs: `optimized/{uuid}.webp`
//! - Thumbnails: `thumbnails/{uuid}.webp`
//!
//! Keys never derive from client-supplied filenames and must not contain `..` or a
//! leading `/`. Key generation is centralized in the `keys` module.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, StorageHandle};
#[cfg(feature = "storage-local")]
pub use local::{LocalStorage, LocalUrlSigner};
pub use mediaflow_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult, UrlSigner};
