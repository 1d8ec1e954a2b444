//! Mediaflow Services Layer
//!
//! Business services of the pipeline: ingestion of uploads, the transformation worker,
//! status lookups with signed links, and the retention sweep. Collaborators are injected
//! as trait objects so each service can run against in-memory doubles. Keep thin HTTP
//! handling in mediaflow-api.

pub mod cleanup;
pub mod ingestion;
pub mod metrics;
pub mod status;
pub mod transform;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(test)]
mod pipeline_tests;

pub use cleanup::{next_run_after, CleanupService, CleanupSummary};
pub use ingestion::{IngestionService, UploadLimits, UploadRequest};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use status::StatusService;
pub use transform::{TransformOutcome, TransformWorker};
