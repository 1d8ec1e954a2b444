//! Mediaflow Processing Library
//!
//! The image codec capability used by the transformation worker: decode an uploaded
//! image, shrink it to fit a bounding box without ever enlarging it, and re-encode it
//! as WebP at a given quality.

pub mod codec;
pub mod image;

pub use codec::{CodecError, CodecResult, ImageCodec, ResizeSpec, WebpCodec};
pub use crate::image::{ImageResize, WebpEncoder};
