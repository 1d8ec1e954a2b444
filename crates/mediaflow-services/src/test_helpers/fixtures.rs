//! Test fixtures

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use mediaflow_core::models::{MediaRecord, MediaStatus};
use mediaflow_processing::{CodecError, CodecResult, ImageCodec, ResizeSpec};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::ingestion::UploadRequest;

/// Solid-color PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([40, 90, 200, 255])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    Bytes::from(out.into_inner())
}

pub fn png_upload(width: u32, height: u32) -> UploadRequest {
    UploadRequest {
        bytes: png_bytes(width, height),
        mimetype: "image/png".to_string(),
        original_name: "photo.png".to_string(),
        transform: None,
    }
}

/// A record in `status` with keys consistent with it
pub fn media_record(status: MediaStatus) -> MediaRecord {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let completed = status == MediaStatus::Completed;
    MediaRecord {
        id,
        original_name: "photo.png".to_string(),
        mimetype: "image/png".to_string(),
        size: 1024,
        status,
        original_key: format!("original/{}", Uuid::new_v4()),
        optimized_key: completed.then(|| format!("optimized/{}.webp", Uuid::new_v4())),
        thumbnail_key: completed.then(|| format!("thumbnails/{}.webp", Uuid::new_v4())),
        transform: None,
        created_at: now,
        updated_at: now,
    }
}

/// Codec that rejects every input
#[derive(Default)]
pub struct FailingCodec {
    calls: AtomicUsize,
}

impl FailingCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageCodec for FailingCodec {
    async fn resize_and_encode(&self, _input: Bytes, _spec: ResizeSpec) -> CodecResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CodecError::Decode("corrupt image data".to_string()))
    }
}

/// Codec that sleeps before producing a tiny output
pub struct SlowCodec {
    delay: Duration,
}

impl SlowCodec {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ImageCodec for SlowCodec {
    async fn resize_and_encode(&self, _input: Bytes, _spec: ResizeSpec) -> CodecResult<Bytes> {
        tokio::time::sleep(self.delay).await;
        Ok(Bytes::from_static(b"RIFFwebp"))
    }
}
