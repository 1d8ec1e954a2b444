//! Pipeline counters
//!
//! Registered on a [`Registry`] built at startup and shared by the services through an
//! `Arc`. The HTTP layer exports that registry in Prometheus text format.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::time::Duration;

/// Buckets for transform durations, in milliseconds
const TRANSFORM_DURATION_BUCKETS_MS: &[f64] = &[
    25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0,
];

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uploads_accepted: u64,
    pub uploads_rejected: u64,
    pub jobs_enqueued: u64,
    pub jobs_duplicate: u64,
    pub transforms_started: u64,
    pub transforms_completed: u64,
    pub transforms_failed: u64,
    /// Redeliveries of records that were already completed
    pub transforms_skipped: u64,
    pub transform_duration_ms_total: u64,
    pub cleanup_runs: u64,
    pub cleanup_deleted: u64,
    pub cleanup_failed: u64,
    pub cleanup_storage_leaks: u64,
}

#[derive(Clone)]
pub struct PipelineMetrics {
    uploads_accepted: IntCounter,
    uploads_rejected: IntCounter,
    jobs_enqueued: IntCounter,
    jobs_duplicate: IntCounter,
    transforms_started: IntCounter,
    transforms_completed: IntCounter,
    transforms_failed: IntCounter,
    transforms_skipped: IntCounter,
    transform_duration_ms: Histogram,
    cleanup_runs: IntCounter,
    cleanup_deleted: IntCounter,
    cleanup_failed: IntCounter,
    cleanup_storage_leaks: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl PipelineMetrics {
    /// Create the pipeline metrics and register them on `registry`.
    ///
    /// Fails if `registry` already holds metrics with the same names.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let transform_duration_ms = Histogram::with_opts(
            HistogramOpts::new(
                "mediaflow_transform_duration_ms",
                "Duration of successful transforms in ms",
            )
            .buckets(TRANSFORM_DURATION_BUCKETS_MS.to_vec()),
        )?;
        registry.register(Box::new(transform_duration_ms.clone()))?;

        Ok(Self {
            uploads_accepted: counter(
                registry,
                "mediaflow_uploads_accepted_total",
                "Uploads stored and queued for processing",
            )?,
            uploads_rejected: counter(
                registry,
                "mediaflow_uploads_rejected_total",
                "Uploads rejected by validation",
            )?,
            jobs_enqueued: counter(
                registry,
                "mediaflow_jobs_enqueued_total",
                "Transform jobs created",
            )?,
            jobs_duplicate: counter(
                registry,
                "mediaflow_jobs_duplicate_total",
                "Enqueues skipped because a live job with the same key existed",
            )?,
            transforms_started: counter(
                registry,
                "mediaflow_transforms_started_total",
                "Transform attempts that marked a record PROCESSING",
            )?,
            transforms_completed: counter(
                registry,
                "mediaflow_transforms_completed_total",
                "Transforms that stored both outputs",
            )?,
            transforms_failed: counter(
                registry,
                "mediaflow_transforms_failed_total",
                "Transform attempts that failed or timed out",
            )?,
            transforms_skipped: counter(
                registry,
                "mediaflow_transforms_skipped_total",
                "Redelivered jobs for records that were already completed",
            )?,
            transform_duration_ms,
            cleanup_runs: counter(
                registry,
                "mediaflow_cleanup_runs_total",
                "Retention sweeps run",
            )?,
            cleanup_deleted: counter(
                registry,
                "mediaflow_cleanup_deleted_total",
                "Expired records deleted by the retention sweep",
            )?,
            cleanup_failed: counter(
                registry,
                "mediaflow_cleanup_failed_total",
                "Expired records the retention sweep could not delete",
            )?,
            cleanup_storage_leaks: counter(
                registry,
                "mediaflow_cleanup_storage_leaks_total",
                "Objects left behind after their record was deleted",
            )?,
        })
    }

    pub fn record_upload_accepted(&self) {
        self.uploads_accepted.inc();
    }

    pub fn record_upload_rejected(&self) {
        self.uploads_rejected.inc();
    }

    pub fn record_enqueue(&self, enqueued: bool) {
        if enqueued {
            self.jobs_enqueued.inc();
        } else {
            self.jobs_duplicate.inc();
        }
    }

    pub fn record_transform_started(&self) {
        self.transforms_started.inc();
    }

    pub fn record_transform_completed(&self, duration: Duration) {
        self.transforms_completed.inc();
        self.transform_duration_ms
            .observe(duration.as_millis() as f64);
    }

    pub fn record_transform_failed(&self) {
        self.transforms_failed.inc();
    }

    pub fn record_transform_skipped(&self) {
        self.transforms_skipped.inc();
    }

    pub fn record_cleanup_run(&self, deleted: usize, failed: usize, storage_leaks: usize) {
        self.cleanup_runs.inc();
        self.cleanup_deleted.inc_by(deleted as u64);
        self.cleanup_failed.inc_by(failed as u64);
        self.cleanup_storage_leaks.inc_by(storage_leaks as u64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_accepted: self.uploads_accepted.get(),
            uploads_rejected: self.uploads_rejected.get(),
            jobs_enqueued: self.jobs_enqueued.get(),
            jobs_duplicate: self.jobs_duplicate.get(),
            transforms_started: self.transforms_started.get(),
            transforms_completed: self.transforms_completed.get(),
            transforms_failed: self.transforms_failed.get(),
            transforms_skipped: self.transforms_skipped.get(),
            transform_duration_ms_total: self.transform_duration_ms.get_sample_sum() as u64,
            cleanup_runs: self.cleanup_runs.get(),
            cleanup_deleted: self.cleanup_deleted.get(),
            cleanup_failed: self.cleanup_failed.get(),
            cleanup_storage_leaks: self.cleanup_storage_leaks.get(),
        }
    }
}
