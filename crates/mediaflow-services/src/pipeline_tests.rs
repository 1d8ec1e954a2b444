//! End-to-end behavior of the pipeline against in-memory collaborators.

use chrono::Utc;
use image::{GenericImageView, ImageFormat};
use mediaflow_core::models::{
    DerivedKeys, JobOptions, JobStatus, MediaOutputs, MediaStatus, MediaUpdate,
    TransformOptions,
};
use mediaflow_core::AppError;
use mediaflow_db::MediaStore;
use mediaflow_worker::FailureOutcome;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::test_helpers::*;
use crate::{StatusService, TransformOutcome};

fn webp_dimensions(storage: &MockStorage, key: &str) -> (u32, u32) {
    let data = storage.object(key).expect("output stored");
    image::load_from_memory_with_format(&data, ImageFormat::WebP)
        .unwrap()
        .dimensions()
}

async fn submit_png(pipeline: &TestPipeline, width: u32, height: u32) -> Uuid {
    pipeline.ingestion.submit(png_upload(width, height)).await.unwrap()
}

#[tokio::test]
async fn submit_creates_pending_record_and_one_job() {
    let pipeline = TestPipeline::new();
    let id = submit_png(&pipeline, 64, 64).await;

    let record = pipeline.media.get(id).unwrap();
    assert_eq!(record.status, MediaStatus::Pending);
    assert_eq!(record.original_name, "photo.png");
    assert!(record.original_key.starts_with("original/"));
    assert!(!record.original_key.contains("photo"));
    assert!(record.optimized_key.is_none() && record.thumbnail_key.is_none());
    assert_eq!(
        pipeline.storage.content_type(&record.original_key).as_deref(),
        Some("image/png")
    );

    let jobs = pipeline.jobs.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_key, id.to_string());
    assert_eq!(jobs[0].payload["media_id"], serde_json::json!(id.to_string()));
    assert_eq!(jobs[0].max_attempts, 3);
    assert_eq!(jobs[0].backoff_delay_ms, 2000);
    assert_eq!(jobs[0].remove_on_complete_secs, 3600);
    assert_eq!(jobs[0].remove_on_fail_secs, 86_400);
}

#[tokio::test]
async fn invalid_upload_has_no_side_effects() {
    let pipeline = TestPipeline::new();
    let mut upload = png_upload(8, 8);
    upload.mimetype = "application/pdf".to_string();

    let err = pipeline.ingestion.submit(upload).await.unwrap_err();
    assert!(matches!(err, AppError::UnsupportedMediaType(_)));
    assert_eq!(pipeline.storage.calls(), 0);
    assert!(pipeline.media.is_empty());
    assert!(pipeline.jobs.jobs().is_empty());
    assert_eq!(pipeline.metrics.snapshot().uploads_rejected, 1);
}

#[tokio::test]
async fn enqueue_failure_surfaces_and_leaves_record_pending() {
    let pipeline = TestPipeline::new();
    pipeline.jobs.set_fail_enqueue(true);

    let err = pipeline.ingestion.submit(png_upload(8, 8)).await.unwrap_err();
    assert!(matches!(err, AppError::Queue(_)));
    assert_eq!(pipeline.media.len(), 1);
    assert_eq!(pipeline.storage.keys().len(), 1);
    assert_eq!(pipeline.metrics.snapshot().uploads_accepted, 0);

    // The stranded record is recovered once the queue is back
    let id = pipeline.media.ids()[0];
    assert_eq!(pipeline.media.get(id).unwrap().status, MediaStatus::Pending);
    pipeline.jobs.set_fail_enqueue(false);
    assert!(pipeline.ingestion.resubmit(id).await.unwrap());

    assert_eq!(pipeline.run_next_job().await.unwrap(), None);
    assert_eq!(pipeline.media.get(id).unwrap().status, MediaStatus::Completed);
}

#[tokio::test]
async fn record_failure_leaves_orphaned_original() {
    let pipeline = TestPipeline::new();
    pipeline.media.set_fail_create(true);

    assert!(pipeline.ingestion.submit(png_upload(8, 8)).await.is_err());
    assert_eq!(pipeline.storage.keys().len(), 1);
    assert!(pipeline.jobs.jobs().is_empty());
}

#[tokio::test]
async fn worker_completes_with_default_sizes() {
    let pipeline = TestPipeline::new();
    let id = submit_png(&pipeline, 2000, 1000).await;

    assert_eq!(pipeline.run_next_job().await.unwrap(), None);

    let record = pipeline.media.get(id).unwrap();
    assert_eq!(record.status, MediaStatus::Completed);
    let keys = record.derived_keys().expect("both keys set");
    assert!(keys.optimized_key.starts_with("optimized/") && keys.optimized_key.ends_with(".webp"));
    assert!(keys.thumbnail_key.starts_with("thumbnails/") && keys.thumbnail_key.ends_with(".webp"));

    assert_eq!(webp_dimensions(&pipeline.storage, &keys.optimized_key), (1280, 640));
    assert_eq!(webp_dimensions(&pipeline.storage, &keys.thumbnail_key), (320, 160));
    assert_eq!(
        pipeline.storage.content_type(&keys.optimized_key).as_deref(),
        Some("image/webp")
    );
    assert_eq!(
        pipeline.jobs.job_by_key(&id.to_string()).unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn small_image_is_never_upscaled() {
    let pipeline = TestPipeline::new();
    let mut upload = png_upload(100, 100);
    upload.transform = TransformOptions::parse_field(Some(
        r#"{"optimized":{"width":500},"thumbnail":{"width":400,"quality":50}}"#,
    ))
    .unwrap();
    let id = pipeline.ingestion.submit(upload).await.unwrap();

    pipeline.run_next_job().await.unwrap();

    let keys = pipeline.media.get(id).unwrap().derived_keys().unwrap();
    assert_eq!(webp_dimensions(&pipeline.storage, &keys.optimized_key), (100, 100));
    assert_eq!(webp_dimensions(&pipeline.storage, &keys.thumbnail_key), (100, 100));
}

#[tokio::test]
async fn redelivery_of_completed_record_writes_nothing() {
    let pipeline = TestPipeline::new();
    let id = submit_png(&pipeline, 64, 64).await;
    pipeline.run_next_job().await.unwrap();

    let before = pipeline.media.get(id).unwrap();
    let updates = pipeline.media.update_calls();
    let objects = pipeline.storage.keys();

    let outcome = pipeline.worker.process(id).await.unwrap();
    assert_eq!(outcome, TransformOutcome::AlreadyCompleted);

    let after = pipeline.media.get(id).unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.optimized_key, before.optimized_key);
    assert_eq!(pipeline.media.update_calls(), updates);
    assert_eq!(pipeline.storage.keys(), objects);
    assert_eq!(pipeline.metrics.snapshot().transforms_skipped, 1);
}

#[tokio::test]
async fn missing_record_is_discarded() {
    let pipeline = TestPipeline::new();
    let outcome = pipeline.worker.process(Uuid::new_v4()).await.unwrap();
    assert_eq!(outcome, TransformOutcome::Discarded);
    assert_eq!(pipeline.storage.calls(), 0);
}

#[tokio::test]
async fn codec_failure_marks_failed_and_retries_with_backoff() {
    let codec = Arc::new(FailingCodec::new());
    let pipeline = TestPipeline::with_codec(codec.clone());
    let id = submit_png(&pipeline, 64, 64).await;
    let key = id.to_string();

    let first = pipeline.run_next_job().await.unwrap();
    assert_eq!(
        first,
        Some(FailureOutcome::Retrying {
            delay: Duration::from_secs(2)
        })
    );
    let record = pipeline.media.get(id).unwrap();
    assert_eq!(record.status, MediaStatus::Failed);
    assert!(record.optimized_key.is_none() && record.thumbnail_key.is_none());
    assert_eq!(pipeline.jobs.job_by_key(&key).unwrap().status, JobStatus::Delayed);

    pipeline.jobs.make_due(&key);
    let second = pipeline.run_next_job().await.unwrap();
    assert_eq!(
        second,
        Some(FailureOutcome::Retrying {
            delay: Duration::from_secs(4)
        })
    );

    pipeline.jobs.make_due(&key);
    let third = pipeline.run_next_job().await.unwrap();
    assert_eq!(third, Some(FailureOutcome::Failed));

    let job = pipeline.jobs.job_by_key(&key).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts_made, 3);
    assert_eq!(codec.calls(), 3);
    assert_eq!(pipeline.media.get(id).unwrap().status, MediaStatus::Failed);
    assert_eq!(pipeline.metrics.snapshot().transforms_failed, 3);
}

#[tokio::test]
async fn failure_to_record_failed_still_returns_original_error() {
    let pipeline = TestPipeline::with_codec(Arc::new(FailingCodec::new()));
    let id = submit_png(&pipeline, 64, 64).await;
    pipeline.media.set_fail_update_to(Some(MediaStatus::Failed));

    let err = pipeline.worker.process(id).await.unwrap_err();
    assert!(matches!(err, AppError::ImageProcessing(_)));
    assert_eq!(pipeline.media.get(id).unwrap().status, MediaStatus::Processing);
}

#[tokio::test]
async fn timed_out_attempt_marks_record_failed() {
    let options = JobOptions {
        attempts: 1,
        timeout: Duration::from_secs(1),
        ..JobOptions::default()
    };
    let codec = Arc::new(SlowCodec::new(Duration::from_secs(5)));
    let pipeline = TestPipeline::with_job_options(codec, options);
    let id = submit_png(&pipeline, 16, 16).await;
    let key = id.to_string();

    pipeline.queue.start(pipeline.worker.clone(), None);

    let mut failed_job = None;
    for _ in 0..150 {
        if let Some(job) = pipeline.jobs.job_by_key(&key) {
            if job.status == JobStatus::Failed {
                failed_job = Some(job);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    pipeline.queue.shutdown();

    let job = failed_job.expect("job never failed");
    assert!(job.last_error.unwrap().contains("timed out"));
    let record = pipeline.media.get(id).unwrap();
    assert_eq!(record.status, MediaStatus::Failed);
    assert!(record.derived_keys().is_none());
    assert_eq!(pipeline.metrics.snapshot().transforms_failed, 1);
}

#[tokio::test]
async fn abandon_leaves_finished_records_alone() {
    let pipeline = TestPipeline::new();
    let completed = media_record(MediaStatus::Completed);
    let pending = media_record(MediaStatus::Pending);
    pipeline.media.insert(completed.clone());
    pipeline.media.insert(pending.clone());

    pipeline.worker.abandon(completed.id).await.unwrap();
    pipeline.worker.abandon(pending.id).await.unwrap();
    pipeline.worker.abandon(Uuid::new_v4()).await.unwrap();

    assert_eq!(pipeline.media.get(completed.id).unwrap().status, MediaStatus::Completed);
    assert_eq!(pipeline.media.get(pending.id).unwrap().status, MediaStatus::Pending);
    assert_eq!(pipeline.media.update_calls(), 0);
}

#[tokio::test]
async fn store_rejects_outputs_on_unfinished_record() {
    let pipeline = TestPipeline::new();
    let completed = media_record(MediaStatus::Completed);
    pipeline.media.insert(completed.clone());

    // Keys stay behind on a non-completed status
    assert!(pipeline.media.update(completed.id, MediaUpdate::Failed).await.is_err());
    assert_eq!(pipeline.media.get(completed.id).unwrap().status, MediaStatus::Completed);

    let pending = media_record(MediaStatus::Pending);
    pipeline.media.insert(pending.clone());
    let keys = DerivedKeys {
        optimized_key: "optimized/a.webp".to_string(),
        thumbnail_key: "thumbnails/a.webp".to_string(),
    };
    let updated = pipeline
        .media
        .update(pending.id, MediaUpdate::Completed(keys.clone()))
        .await
        .unwrap();
    assert_eq!(updated.derived_keys(), Some(keys));
}

#[tokio::test]
async fn storage_failure_on_output_marks_failed() {
    let pipeline = TestPipeline::new();
    let id = submit_png(&pipeline, 64, 64).await;
    pipeline.storage.set_fail_put(true);

    let err = pipeline.worker.process(id).await.unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    let record = pipeline.media.get(id).unwrap();
    assert_eq!(record.status, MediaStatus::Failed);
    assert!(record.derived_keys().is_none());
}

#[tokio::test]
async fn status_of_completed_media_has_fresh_signed_links() {
    let pipeline = TestPipeline::new();
    let id = submit_png(&pipeline, 64, 64).await;
    pipeline.run_next_job().await.unwrap();

    let first = pipeline.status.get_status(id).await.unwrap();
    let second = pipeline.status.get_status(id).await.unwrap();

    assert_eq!(first.status, MediaStatus::Completed);
    assert_eq!(first.message, "File processing completed successfully");
    let first_optimized = first.outputs.optimized.expect("optimized link");
    let first_thumbnail = first.outputs.thumbnail.expect("thumbnail link");
    assert_ne!(first_optimized, first_thumbnail);
    assert_ne!(Some(first_optimized.clone()), second.outputs.optimized);
    assert!(first_optimized.contains("optimized/"));
    assert!(first_thumbnail.contains("thumbnails/"));
    assert!(pipeline
        .storage
        .signed_expiries()
        .iter()
        .all(|expiry| *expiry <= Duration::from_secs(900)));
}

#[tokio::test]
async fn status_of_pending_media_has_no_links() {
    let pipeline = TestPipeline::new();
    let id = submit_png(&pipeline, 64, 64).await;

    let view = pipeline.status.get_status(id).await.unwrap();
    assert_eq!(view.status, MediaStatus::Pending);
    assert_eq!(view.message, "File uploaded and queued for processing");
    assert_eq!(view.outputs, MediaOutputs::default());
    assert!(pipeline.storage.signed_expiries().is_empty());
}

#[tokio::test]
async fn status_of_unknown_media_is_not_found_without_storage_calls() {
    let pipeline = TestPipeline::new();

    let err = pipeline.status.get_status(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(pipeline.storage.calls(), 0);
}

#[tokio::test]
async fn signed_link_expiry_is_capped() {
    let pipeline = TestPipeline::new();
    let status = StatusService::new(
        pipeline.media.clone(),
        pipeline.storage.clone(),
        Duration::from_secs(3600),
    );
    assert_eq!(status.url_expiry(), Duration::from_secs(900));
}

#[tokio::test]
async fn cleanup_respects_retention_windows() {
    let pipeline = TestPipeline::new();
    let now = Utc::now();

    let mut seeded = Vec::new();
    for (status, age_days) in [
        (MediaStatus::Completed, 31),
        (MediaStatus::Completed, 29),
        (MediaStatus::Failed, 8),
        (MediaStatus::Failed, 6),
        (MediaStatus::Pending, 90),
        (MediaStatus::Processing, 90),
    ] {
        let record = media_record(status);
        for key in record.object_keys() {
            pipeline.storage.set_object(key, png_bytes(2, 2), "image/png");
        }
        pipeline.media.insert(record.clone());
        pipeline
            .media
            .set_updated_at(record.id, now - chrono::Duration::days(age_days));
        seeded.push(record);
    }

    let summary = pipeline.cleanup.run_cleanup().await.unwrap();
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.storage_leaks, 0);

    let old_completed = &seeded[0];
    let old_failed = &seeded[2];
    assert!(pipeline.media.get(old_completed.id).is_none());
    assert!(pipeline.media.get(old_failed.id).is_none());
    for key in old_completed.object_keys() {
        assert!(!pipeline.storage.has_object(key));
    }
    for kept in [&seeded[1], &seeded[3], &seeded[4], &seeded[5]] {
        assert!(pipeline.media.get(kept.id).is_some());
        assert!(pipeline.storage.has_object(&kept.original_key));
    }
}

#[tokio::test]
async fn cleanup_continues_past_individual_failures() {
    let pipeline = TestPipeline::new();
    let old = Utc::now() - chrono::Duration::days(60);

    let leaky = media_record(MediaStatus::Completed);
    let stuck = media_record(MediaStatus::Failed);
    let clean = media_record(MediaStatus::Completed);
    for record in [&leaky, &stuck, &clean] {
        pipeline.media.insert(record.clone());
        pipeline.media.set_updated_at(record.id, old);
    }
    pipeline.storage.fail_delete_of(&leaky.original_key);
    pipeline.media.fail_delete_of(stuck.id);

    let summary = pipeline.cleanup.run_cleanup().await.unwrap();
    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.storage_leaks, 1);

    // Row goes even when an object could not be removed
    assert!(pipeline.media.get(leaky.id).is_none());
    assert!(pipeline.media.get(stuck.id).is_some());
    assert!(pipeline.media.get(clean.id).is_none());
    assert_eq!(pipeline.metrics.snapshot().cleanup_storage_leaks, 1);
}

#[tokio::test]
async fn resubmit_requeues_failed_or_stranded_media() {
    let pipeline = TestPipeline::with_codec(Arc::new(FailingCodec::new()));
    let id = submit_png(&pipeline, 64, 64).await;

    // Pending with a live job: nothing new is queued
    assert!(!pipeline.ingestion.resubmit(id).await.unwrap());
    assert_eq!(pipeline.jobs.jobs().len(), 1);

    let completed = media_record(MediaStatus::Completed);
    let completed_id = completed.id;
    pipeline.media.insert(completed);
    let err = pipeline.ingestion.resubmit(completed_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let unknown = pipeline.ingestion.resubmit(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(unknown, AppError::NotFound(_)));

    // Fail the job for good, then the record can be resubmitted once
    let key = id.to_string();
    pipeline.run_next_job().await.unwrap();
    for _ in 0..2 {
        pipeline.jobs.make_due(&key);
        pipeline.run_next_job().await.unwrap();
    }
    assert_eq!(pipeline.jobs.job_by_key(&key).unwrap().status, JobStatus::Failed);

    assert!(pipeline.ingestion.resubmit(id).await.unwrap());
    assert!(!pipeline.ingestion.resubmit(id).await.unwrap());
    assert_eq!(pipeline.jobs.jobs().len(), 2);
}
