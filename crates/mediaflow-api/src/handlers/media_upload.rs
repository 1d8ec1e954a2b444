use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use mediaflow_core::models::{MediaStatus, TransformOptions};
use mediaflow_core::AppError;
use mediaflow_services::UploadRequest;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    pub media_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub data: UploadData,
}

/// Fields of the upload form, before validation.
struct UploadForm {
    bytes: Bytes,
    file_name: String,
    content_type: String,
    options: Option<String>,
}

/// Strip parameters: `image/jpeg; charset=binary` becomes `image/jpeg`.
fn normalize_mime_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or(content_type)
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, HttpAppError> {
    let mut file: Option<(Bytes, String, String)> = None;
    let mut options: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Send exactly one field named 'file'".to_string(),
                    )
                    .into());
                }
                let file_name = field.file_name().unwrap_or("unknown").to_string();
                let content_type = field
                    .content_type()
                    .map(normalize_mime_type)
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                file = Some((data, file_name, content_type));
            }
            "options" => {
                options = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let (bytes, file_name, content_type) =
        file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    Ok(UploadForm {
        bytes,
        file_name,
        content_type,
        options,
    })
}

/// Upload an image for asynchronous processing
///
/// Form fields: `file` (required) and `options` (optional JSON object with
/// `optimized` / `thumbnail` output settings).
#[utoipa::path(
    post,
    path = "/media/upload",
    tag = "media",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Upload accepted, processing queued", body = UploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Unsupported content type", body = ErrorResponse),
        (status = 503, description = "Queue unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_media"))]
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let form = read_upload_form(multipart).await?;
    let transform = TransformOptions::parse_field(form.options.as_deref())?;

    let media_id = state
        .ingestion
        .submit(UploadRequest {
            bytes: form.bytes,
            mimetype: form.content_type,
            original_name: form.file_name,
            transform,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            message: MediaStatus::Pending.message().to_string(),
            data: UploadData { media_id },
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mime_type() {
        assert_eq!(normalize_mime_type("image/png"), "image/png");
        assert_eq!(normalize_mime_type("image/jpeg; charset=binary"), "image/jpeg");
    }
}
