//! Image operations: bounding-box resize and WebP encoding.

pub mod encoder;
pub mod resize;

pub use encoder::WebpEncoder;
pub use resize::ImageResize;
