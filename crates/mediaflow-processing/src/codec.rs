//! Image codec capability.

use async_trait::async_trait;
use bytes::Bytes;
use image::GenericImageView;
use mediaflow_core::models::ResolvedOutput;
use mediaflow_core::AppError;
use thiserror::Error;

use crate::image::{ImageResize, WebpEncoder};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unsupported or unrecognized image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Codec task failed: {0}")]
    Task(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        AppError::ImageProcessing(err.to_string())
    }
}

/// Bounding box and quality for one encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: u8,
}

impl From<ResolvedOutput> for ResizeSpec {
    fn from(output: ResolvedOutput) -> Self {
        Self {
            max_width: output.max_width,
            max_height: output.max_height,
            quality: output.quality,
        }
    }
}

/// Resize-and-encode capability. Output is always WebP.
#[async_trait]
pub trait ImageCodec: Send + Sync {
    async fn resize_and_encode(&self, input: Bytes, spec: ResizeSpec) -> CodecResult<Bytes>;
}

/// Codec backed by `image` for decoding and resizing and libwebp for encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpCodec;

impl WebpCodec {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous pipeline: decode, shrink to fit, encode.
    pub fn process(input: &[u8], spec: ResizeSpec) -> CodecResult<Bytes> {
        let img = WebpEncoder::decode(input)?;
        let (orig_width, orig_height) = img.dimensions();
        let resized = ImageResize::resize_to_fit(img, spec.max_width, spec.max_height);
        let (width, height) = resized.dimensions();

        tracing::debug!(
            orig_width,
            orig_height,
            width,
            height,
            quality = spec.quality,
            "Encoding WebP output"
        );

        WebpEncoder::encode(&resized, spec.quality)
    }
}

#[async_trait]
impl ImageCodec for WebpCodec {
    async fn resize_and_encode(&self, input: Bytes, spec: ResizeSpec) -> CodecResult<Bytes> {
        // Decode and encode are CPU-bound; keep them off the async workers
        tokio::task::spawn_blocking(move || Self::process(&input, spec))
            .await
            .map_err(|e| CodecError::Task(e.to_string()))?
    }
}
