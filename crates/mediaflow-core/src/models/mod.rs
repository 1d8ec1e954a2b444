pub mod job;
pub mod media;
pub mod transform;

pub use job::{EnqueueOutcome, Job, JobOptions, JobStatus, TransformJobPayload};
pub use media::{
    DerivedKeys, MediaOutputs, MediaRecord, MediaStatus, MediaStatusView,
    MediaUpdate, NewMediaRecord,
};
pub use transform::{
    OutputFormat, OutputOptions, ResolvedOutput, ResolvedTransform, TransformOptions,
};
