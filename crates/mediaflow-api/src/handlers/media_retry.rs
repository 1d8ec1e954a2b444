use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryData {
    pub media_id: Uuid,
    /// False when a transform job for this media was already queued
    pub enqueued: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RetryResponse {
    pub success: bool,
    pub message: String,
    pub data: RetryData,
}

/// Queue another transform attempt for a failed or stuck pending media item
#[utoipa::path(
    post,
    path = "/media/{id}/retry",
    tag = "media",
    params(
        ("id" = Uuid, Path, description = "Media ID")
    ),
    responses(
        (status = 202, description = "Transform queued", body = RetryResponse),
        (status = 400, description = "Media is processing or already completed", body = ErrorResponse),
        (status = 404, description = "Media not found", body = ErrorResponse),
        (status = 503, description = "Queue unavailable", body = ErrorResponse)
    )
)]
pub async fn retry_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let enqueued = state.ingestion.resubmit(id).await?;

    let message = if enqueued {
        "Processing restarted"
    } else {
        "Processing is already queued"
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(RetryResponse {
            success: true,
            message: message.to_string(),
            data: RetryData {
                media_id: id,
                enqueued,
            },
        }),
    ))
}
