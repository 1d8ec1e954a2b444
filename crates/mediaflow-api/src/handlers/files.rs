//! Signed file route for the local storage backend.
//!
//! Links issued by `LocalUrlSigner` point here; the signature and expiry are checked
//! before any storage access.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use mediaflow_core::constants::{DERIVED_CONTENT_TYPE, DERIVED_EXTENSION};
use mediaflow_core::AppError;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SignedFileQuery {
    pub expires: u64,
    pub signature: String,
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.') {
        Some((_, ext)) if ext.eq_ignore_ascii_case(DERIVED_EXTENSION) => DERIVED_CONTENT_TYPE,
        _ => "application/octet-stream",
    }
}

#[tracing::instrument(skip(state, query), fields(operation = "get_signed_file"))]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<SignedFileQuery>,
) -> Result<Response, HttpAppError> {
    let signer = state
        .file_signer
        .as_ref()
        .ok_or_else(|| AppError::NotFound("File serving is not enabled".to_string()))?;

    signer.verify(&key, query.expires, &query.signature)?;

    let data = state.storage.get(&key).await.map_err(|e| {
        tracing::warn!(error = %e, key = %key, "Failed to read signed file");
        HttpAppError::from(e)
    })?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&key))
        .header(header::CACHE_CONTROL, "private, max-age=900")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_derived_outputs() {
        assert_eq!(content_type_for("optimized/abc.webp"), "image/webp");
        assert_eq!(content_type_for("original/abc"), "application/octet-stream");
    }
}
