//! Mediaflow HTTP API
//!
//! Thin axum layer over the pipeline services: upload, status, retry, signed file
//! downloads for the local backend, health and metrics.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
