use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::transform::TransformOptions;

/// Processing state of one upload.
///
/// Transitions are forward-only: `Pending -> Processing -> {Completed, Failed}`,
/// plus `Failed -> Processing` when a job is retried or re-submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Pending => "PENDING",
            MediaStatus::Processing => "PROCESSING",
            MediaStatus::Completed => "COMPLETED",
            MediaStatus::Failed => "FAILED",
        }
    }

    /// Human-readable description shown to clients polling for status.
    pub fn message(&self) -> &'static str {
        match self {
            MediaStatus::Pending => "File uploaded and queued for processing",
            MediaStatus::Processing => "File is currently being processed",
            MediaStatus::Completed => "File processing completed successfully",
            MediaStatus::Failed => "File processing failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MediaStatus::Completed | MediaStatus::Failed)
    }
}

impl Display for MediaStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(MediaStatus::Pending),
            "PROCESSING" => Ok(MediaStatus::Processing),
            "COMPLETED" => Ok(MediaStatus::Completed),
            "FAILED" => Ok(MediaStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid media status: {}", s)),
        }
    }
}

/// Object keys of both derived outputs. They only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedKeys {
    pub optimized_key: String,
    pub thumbnail_key: String,
}

/// Persisted row tracking one upload's lifecycle and artifact keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct MediaRecord {
    pub id: Uuid,
    pub original_name: String,
    pub mimetype: String,
    pub size: i64,
    pub status: MediaStatus,
    pub original_key: String,
    pub optimized_key: Option<String>,
    pub thumbnail_key: Option<String>,
    /// Validated transform options captured at ingestion (JSONB)
    pub transform: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Both derived keys, if the record has them.
    pub fn derived_keys(&self) -> Option<DerivedKeys> {
        match (&self.optimized_key, &self.thumbnail_key) {
            (Some(optimized), Some(thumbnail)) => Some(DerivedKeys {
                optimized_key: optimized.clone(),
                thumbnail_key: thumbnail.clone(),
            }),
            _ => None,
        }
    }

    /// True once the worker has finished this record for good.
    pub fn is_settled(&self) -> bool {
        self.status == MediaStatus::Completed && self.derived_keys().is_some()
    }

    pub fn transform_options(&self) -> Result<Option<TransformOptions>, serde_json::Error> {
        self.transform
            .clone()
            .map(serde_json::from_value)
            .transpose()
    }

    /// Every object key the record currently references.
    pub fn object_keys(&self) -> Vec<&str> {
        let mut keys = vec![self.original_key.as_str()];
        keys.extend(self.optimized_key.as_deref());
        keys.extend(self.thumbnail_key.as_deref());
        keys
    }
}

/// Fields captured at ingestion.
#[derive(Debug, Clone)]
pub struct NewMediaRecord {
    pub id: Uuid,
    pub original_name: String,
    pub mimetype: String,
    pub size: i64,
    pub original_key: String,
    pub transform: Option<TransformOptions>,
}

/// The only mutations the worker performs on a record.
///
/// Completion carries both derived keys so status and keys land in a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaUpdate {
    Processing,
    Failed,
    Completed(DerivedKeys),
}

impl MediaUpdate {
    pub fn status(&self) -> MediaStatus {
        match self {
            MediaUpdate::Processing => MediaStatus::Processing,
            MediaUpdate::Failed => MediaStatus::Failed,
            MediaUpdate::Completed(_) => MediaStatus::Completed,
        }
    }
}

/// Freshly signed download links for the derived outputs.
///
/// Always serialized as an object; a link is present only once the record is
/// `COMPLETED` with that output's key set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaOutputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// What a client sees when polling one upload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatusView {
    pub id: Uuid,
    pub status: MediaStatus,
    pub original_name: String,
    #[serde(skip)]
    pub message: &'static str,
    pub outputs: MediaOutputs,
}
