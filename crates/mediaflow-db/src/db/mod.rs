//! Database repositories
//!
//! `media` owns the `media` table; `job` owns the `jobs` table that backs the queue.

pub mod job;
pub mod media;

pub use job::JobRepository;
pub use media::MediaRepository;
