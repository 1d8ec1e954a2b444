//! Mock Storage implementation for testing

use async_trait::async_trait;
use bytes::Bytes;
use mediaflow_storage::{Storage, StorageBackend, StorageError, StorageResult, UrlSigner};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Mock storage implementation that stores objects in memory
#[derive(Default)]
pub struct MockStorage {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    fail_put: AtomicBool,
    fail_delete: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    signed: AtomicUsize,
    expiries: Mutex<Vec<Duration>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an object exists in the mock storage
    pub fn has_object(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn set_object(&self, key: &str, data: Bytes, content_type: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type.to_string()));
    }

    pub fn set_fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete.lock().unwrap().insert(key.to_string());
    }

    /// Storage and signing calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Expiries requested for signed links, in call order
    pub fn signed_expiries(&self) -> Vec<Duration> {
        self.expiries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!("mock put failed: {}", key)));
        }
        self.set_object(key, data, content_type);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.object(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.lock().unwrap().contains(key) {
            return Err(StorageError::DeleteFailed(format!("mock delete failed: {}", key)));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn ensure_bucket(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[async_trait]
impl UrlSigner for MockStorage {
    async fn sign_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let nonce = self.signed.fetch_add(1, Ordering::SeqCst);
        self.expiries.lock().unwrap().push(expires_in);

        let expires = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            + expires_in.as_secs();
        Ok(format!(
            "https://storage.test/{}?expires={}&signature=sig{}",
            key, expires, nonce
        ))
    }
}
