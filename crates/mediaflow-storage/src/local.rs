use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult, UrlSigner};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies download links for files served by the API.
///
/// URL format: `{base_url}/{key}?expires={unix_ts}&signature={hex(HMAC-SHA256(secret, "{key}:{expires}"))}`.
#[derive(Clone)]
pub struct LocalUrlSigner {
    base_url: String,
    secret: Vec<u8>,
}

impl LocalUrlSigner {
    pub fn new(base_url: impl Into<String>, secret: impl AsRef<[u8]>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, key: &str, expires: u64) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| StorageError::ConfigError(format!("Invalid signing secret: {}", e)))?;
        mac.update(key.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Build a signed URL for `key` valid until now + `expires_in`.
    pub fn sign(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        validate_key(key)?;
        let expires = unix_now().saturating_add(expires_in.as_secs());
        let signature = hex::encode(self.mac(key, expires)?.finalize().into_bytes());
        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.base_url, key, expires, signature
        ))
    }

    /// Check a signature produced by [`LocalUrlSigner::sign`].
    pub fn verify(&self, key: &str, expires: u64, signature: &str) -> StorageResult<()> {
        validate_key(key)?;
        let provided = hex::decode(signature)
            .map_err(|_| StorageError::InvalidSignature("Malformed signature".to_string()))?;
        self.mac(key, expires)?
            .verify_slice(&provided)
            .map_err(|_| StorageError::InvalidSignature("Signature mismatch".to_string()))?;
        if unix_now() > expires {
            return Err(StorageError::InvalidSignature(
                "Signed URL has expired".to_string(),
            ));
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    signer: LocalUrlSigner,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for objects (e.g., "/var/lib/mediaflow")
    /// * `base_url` - Base URL of the API's file route (e.g., "http://localhost:3000/files")
    /// * `signing_secret` - HMAC key for download links
    pub fn new(
        base_path: impl Into<PathBuf>,
        base_url: impl Into<String>,
        signing_secret: impl AsRef<[u8]>,
    ) -> Self {
        LocalStorage {
            base_path: base_path.into(),
            signer: LocalUrlSigner::new(base_url, signing_secret),
        }
    }

    pub fn signer(&self) -> &LocalUrlSigner {
        &self.signer
    }

    /// Convert storage key to filesystem path with security validation
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        let path = self.base_path.join(storage_key);
        if !path.starts_with(&self.base_path) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }
        Ok(path)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();
        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %key,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), key = %key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn ensure_bucket(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                self.base_path.display(),
                e
            ))
        })
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[async_trait]
impl UrlSigner for LocalStorage {
    async fn sign_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.signer.sign(key, expires_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    async fn storage() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000/files", SECRET);
        storage.ensure_bucket().await.unwrap();
        (dir, storage)
    }

    fn parse_query(url: &str) -> (u64, String) {
        let query = url.split_once('?').unwrap().1;
        let mut expires = 0;
        let mut signature = String::new();
        for pair in query.split('&') {
            let (name, value) = pair.split_once('=').unwrap();
            match name {
                "expires" => expires = value.parse().unwrap(),
                "signature" => signature = value.to_string(),
                _ => {}
            }
        }
        (expires, signature)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_dir, storage) = storage().await;
        storage
            .put("original/abc", Bytes::from_static(b"hello"), "image/png")
            .await
            .unwrap();
        assert_eq!(storage.get("original/abc").await.unwrap(), Bytes::from_static(b"hello"));

        storage.delete("original/abc").await.unwrap();
        assert!(matches!(
            storage.get("original/abc").await,
            Err(StorageError::NotFound(_))
        ));
        // Deleting twice is fine
        storage.delete("original/abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (_dir, storage) = storage().await;
        let result = storage
            .put("../escape", Bytes::from_static(b"x"), "image/png")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_signed_url_verifies() {
        let (_dir, storage) = storage().await;
        let url = storage
            .sign_get_url("optimized/a.webp", Duration::from_secs(900))
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:3000/files/optimized/a.webp?expires="));

        let (expires, signature) = parse_query(&url);
        assert!(storage.signer().verify("optimized/a.webp", expires, &signature).is_ok());
        assert!(storage.signer().verify("thumbnails/a.webp", expires, &signature).is_err());
        assert!(storage.signer().verify("optimized/a.webp", expires + 1, &signature).is_err());
    }

    #[test]
    fn test_expired_signature_rejected() {
        let signer = LocalUrlSigner::new("http://localhost/files", SECRET);
        let expires = unix_now() - 10;
        let signature = hex::encode(
            signer
                .mac("optimized/a.webp", expires)
                .unwrap()
                .finalize()
                .into_bytes(),
        );
        let err = signer.verify("optimized/a.webp", expires, &signature).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }
}
