//! Application state shared by every handler.

use mediaflow_services::{IngestionService, PipelineMetrics, StatusService};
use mediaflow_storage::{LocalUrlSigner, Storage};
use prometheus::Registry;
use sqlx::PgPool;
use std::sync::Arc;

use crate::telemetry::HttpMetrics;

#[derive(Clone)]
pub struct AppState {
    /// `None` when the API runs against in-memory stores
    pub pool: Option<PgPool>,
    pub storage: Arc<dyn Storage>,
    /// Verifies `/files` links; only set for the local storage backend
    pub file_signer: Option<LocalUrlSigner>,
    pub ingestion: Arc<IngestionService>,
    pub status: Arc<StatusService>,
    /// Everything `/metrics` exports
    pub registry: Registry,
    pub metrics: Arc<PipelineMetrics>,
    pub http_metrics: HttpMetrics,
    pub max_upload_bytes: usize,
}
