//! Mediaflow Database Layer
//!
//! Postgres repositories for media records and the durable job queue, plus the
//! store traits the services depend on so they can be exercised without a database.

pub mod db;
pub mod traits;

pub use db::{JobRepository, MediaRepository};
pub use traits::{JobStore, MediaStore};
