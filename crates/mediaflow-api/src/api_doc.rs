//! OpenAPI documentation, served at `/api-docs/openapi.json` with RapiDoc at `/docs`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use mediaflow_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mediaflow API",
        version = "0.1.0",
        description = "Image upload pipeline: uploads are stored as originals and transformed asynchronously into an optimized WebP image and a thumbnail, retrievable through short-lived signed links."
    ),
    paths(
        handlers::media_upload::upload_media,
        handlers::media_get::get_media,
        handlers::media_retry::retry_media,
        handlers::health::health_check,
        handlers::metrics::get_metrics,
    ),
    components(
        schemas(
            handlers::media_upload::UploadResponse,
            handlers::media_upload::UploadData,
            handlers::media_get::MediaResponse,
            handlers::media_retry::RetryResponse,
            handlers::media_retry::RetryData,
            handlers::health::HealthResponse,
            models::MediaStatus,
            models::MediaStatusView,
            models::MediaOutputs,
            models::TransformOptions,
            models::OutputOptions,
            models::OutputFormat,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "media", description = "Upload, status and retry of media items"),
        (name = "operations", description = "Health and pipeline metrics")
    )
)]
pub struct ApiDoc;
