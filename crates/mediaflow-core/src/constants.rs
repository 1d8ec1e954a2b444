//! Pipeline-wide constants

/// Object key namespace for uploaded originals.
pub const ORIGINAL_PREFIX: &str = "original";
/// Object key namespace for optimized derived outputs.
pub const OPTIMIZED_PREFIX: &str = "optimized";
/// Object key namespace for thumbnail derived outputs.
pub const THUMBNAIL_PREFIX: &str = "thumbnails";

/// Every derived output is WebP.
pub const DERIVED_CONTENT_TYPE: &str = "image/webp";
pub const DERIVED_EXTENSION: &str = "webp";

pub const DEFAULT_OPTIMIZED_WIDTH: u32 = 1280;
pub const DEFAULT_OPTIMIZED_QUALITY: u8 = 80;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 320;
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 70;

/// Signed download links never outlive this many seconds.
pub const MAX_SIGNED_URL_EXPIRY_SECS: u64 = 900;

/// Name of the only job kind the pipeline enqueues.
pub const TRANSFORM_JOB_NAME: &str = "transform";

/// Postgres NOTIFY channel used to wake job consumers.
pub const JOB_NOTIFY_CHANNEL: &str = "mediaflow_new_job";
