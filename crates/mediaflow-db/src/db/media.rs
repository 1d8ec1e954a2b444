use chrono::{DateTime, Utc};
use mediaflow_core::models::{MediaRecord, MediaStatus, MediaUpdate, NewMediaRecord};
use mediaflow_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const MEDIA_COLUMNS: &str = "id, original_name, mimetype, size, status, original_key, \
     optimized_key, thumbnail_key, transform, created_at, updated_at";

#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "media", db.operation = "insert", db.record_id = %record.id))]
    pub async fn create(&self, record: NewMediaRecord) -> Result<MediaRecord, AppError> {
        let transform = record
            .transform
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let query = format!(
            "INSERT INTO media (id, original_name, mimetype, size, status, original_key, transform) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {MEDIA_COLUMNS}"
        );

        let created = sqlx::query_as::<Postgres, MediaRecord>(&query)
            .bind(record.id)
            .bind(&record.original_name)
            .bind(&record.mimetype)
            .bind(record.size)
            .bind(MediaStatus::Pending)
            .bind(&record.original_key)
            .bind(transform)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(media_id = %created.id, "Media record created");
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select", db.record_id = %id))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaRecord>, AppError> {
        let query = format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1");

        let record = sqlx::query_as::<Postgres, MediaRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Status and derived keys change in one statement.
    ///
    /// `Processing` and `Failed` leave the keys untouched; `Completed` sets both.
    #[tracing::instrument(skip(self, update), fields(db.table = "media", db.operation = "update", db.record_id = %id, status = %update.status()))]
    pub async fn update(&self, id: Uuid, update: MediaUpdate) -> Result<MediaRecord, AppError> {
        let status = update.status();
        let (optimized_key, thumbnail_key) = match &update {
            MediaUpdate::Completed(keys) => (
                Some(keys.optimized_key.as_str()),
                Some(keys.thumbnail_key.as_str()),
            ),
            MediaUpdate::Processing | MediaUpdate::Failed => (None, None),
        };

        let query = format!(
            "UPDATE media \
             SET status = $2, \
                 optimized_key = COALESCE($3, optimized_key), \
                 thumbnail_key = COALESCE($4, thumbnail_key), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {MEDIA_COLUMNS}"
        );

        let updated = sqlx::query_as::<Postgres, MediaRecord>(&query)
            .bind(id)
            .bind(status)
            .bind(optimized_key)
            .bind(thumbnail_key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))?;

        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    pub async fn find_expired(
        &self,
        completed_before: DateTime<Utc>,
        failed_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError> {
        let query = format!(
            "SELECT {MEDIA_COLUMNS} FROM media \
             WHERE (status = 'COMPLETED' AND updated_at < $1) \
                OR (status = 'FAILED' AND updated_at < $2) \
             ORDER BY updated_at ASC \
             LIMIT $3"
        );

        let records = sqlx::query_as::<Postgres, MediaRecord>(&query)
            .bind(completed_before)
            .bind(failed_before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
