//! Mock media store for testing without database

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediaflow_core::models::{MediaRecord, MediaStatus, MediaUpdate, NewMediaRecord};
use mediaflow_core::AppError;
use mediaflow_db::MediaStore;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MockMediaRepository {
    records: Mutex<HashMap<Uuid, MediaRecord>>,
    fail_create: AtomicBool,
    /// Updates to this status return an error
    fail_update_to: Mutex<Option<MediaStatus>>,
    fail_delete: Mutex<HashSet<Uuid>>,
    find_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MockMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: MediaRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn get(&self, id: Uuid) -> Option<MediaRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.records.lock().unwrap().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_updated_at(&self, id: Uuid, updated_at: DateTime<Utc>) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.updated_at = updated_at;
        }
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_update_to(&self, status: Option<MediaStatus>) {
        *self.fail_update_to.lock().unwrap() = status;
    }

    pub fn fail_delete_of(&self, id: Uuid) {
        self.fail_delete.lock().unwrap().insert(id);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaStore for MockMediaRepository {
    async fn create(&self, record: NewMediaRecord) -> Result<MediaRecord, AppError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::Internal("media store unavailable".to_string()));
        }

        let now = Utc::now();
        let created = MediaRecord {
            id: record.id,
            original_name: record.original_name,
            mimetype: record.mimetype,
            size: record.size,
            status: MediaStatus::Pending,
            original_key: record.original_key,
            optimized_key: None,
            thumbnail_key: None,
            transform: record
                .transform
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
            created_at: now,
            updated_at: now,
        };
        self.insert(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaRecord>, AppError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(id))
    }

    async fn update(&self, id: Uuid, update: MediaUpdate) -> Result<MediaRecord, AppError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_update_to.lock().unwrap() == Some(update.status()) {
            return Err(AppError::Internal("media store unavailable".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))?;

        let mut updated = record.clone();
        updated.status = update.status();
        if let MediaUpdate::Completed(keys) = update {
            updated.optimized_key = Some(keys.optimized_key);
            updated.thumbnail_key = Some(keys.thumbnail_key);
        }

        // Same rule as the media_completed_has_outputs constraint
        if (updated.status == MediaStatus::Completed) != updated.derived_keys().is_some() {
            return Err(AppError::Internal(format!(
                "Media {} would be {} with outputs {:?}",
                id,
                updated.status,
                updated.derived_keys()
            )));
        }

        updated.updated_at = Utc::now();
        *record = updated.clone();
        Ok(updated)
    }

    async fn find_expired(
        &self,
        completed_before: DateTime<Utc>,
        failed_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError> {
        let mut expired: Vec<MediaRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| match record.status {
                MediaStatus::Completed => record.updated_at < completed_before,
                MediaStatus::Failed => record.updated_at < failed_before,
                _ => false,
            })
            .cloned()
            .collect();
        expired.sort_by_key(|record| record.updated_at);
        expired.truncate(limit.max(0) as usize);
        Ok(expired)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        if self.fail_delete.lock().unwrap().contains(&id) {
            return Err(AppError::Internal("media store unavailable".to_string()));
        }
        Ok(self.records.lock().unwrap().remove(&id).is_some())
    }
}
