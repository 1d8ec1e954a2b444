//! Configuration module
//!
//! Reads the pipeline's settings from the environment (optionally seeded from a `.env`
//! file). Missing or malformed required settings abort startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::constants::MAX_SIGNED_URL_EXPIRY_SECS;
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: usize = 10;
const DEFAULT_S3_BUCKET: &str = "uploads";
const DEFAULT_S3_REGION: &str = "us-east-1";

const JOB_ATTEMPTS: u32 = 3;
const JOB_BACKOFF_DELAY_MS: u64 = 2000;
const JOB_REMOVE_ON_COMPLETE_SECS: u64 = 3600;
const JOB_REMOVE_ON_FAIL_SECS: u64 = 86_400;
const JOB_TIMEOUT_SECS: u64 = 300;
const WORKER_CONCURRENCY: usize = 4;
const WORKER_POLL_INTERVAL_MS: u64 = 1000;
const STALLED_JOB_CHECK_INTERVAL_SECS: u64 = 60;
const STALLED_JOB_GRACE_PERIOD_SECS: u64 = 60;

const COMPLETED_RETENTION_DAYS: i64 = 30;
const FAILED_RETENTION_DAYS: i64 = 7;
const CLEANUP_BATCH_SIZE: i64 = 500;
const CLEANUP_TIMEZONE: &str = "Europe/Kyiv";
const CLEANUP_HOUR: u32 = 0;

/// Queue and worker settings.
#[derive(Clone, Debug)]
pub struct QueueSettings {
    /// Total attempts per job, including the first one
    pub attempts: u32,
    /// Base delay of the exponential backoff between attempts
    pub backoff_delay_ms: u64,
    pub remove_on_complete_secs: u64,
    pub remove_on_fail_secs: u64,
    pub job_timeout_secs: u64,
    pub worker_enabled: bool,
    pub worker_concurrency: usize,
    pub poll_interval_ms: u64,
    /// 0 disables the stalled-job reaper and the janitor
    pub stalled_check_interval_secs: u64,
    pub stalled_grace_period_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            attempts: JOB_ATTEMPTS,
            backoff_delay_ms: JOB_BACKOFF_DELAY_MS,
            remove_on_complete_secs: JOB_REMOVE_ON_COMPLETE_SECS,
            remove_on_fail_secs: JOB_REMOVE_ON_FAIL_SECS,
            job_timeout_secs: JOB_TIMEOUT_SECS,
            worker_enabled: true,
            worker_concurrency: WORKER_CONCURRENCY,
            poll_interval_ms: WORKER_POLL_INTERVAL_MS,
            stalled_check_interval_secs: STALLED_JOB_CHECK_INTERVAL_SECS,
            stalled_grace_period_secs: STALLED_JOB_GRACE_PERIOD_SECS,
        }
    }
}

/// Retention sweep settings.
#[derive(Clone, Debug)]
pub struct CleanupSettings {
    pub enabled: bool,
    pub completed_retention_days: i64,
    pub failed_retention_days: i64,
    pub batch_size: i64,
    pub timezone: Tz,
    /// Local hour (0-23) at which the daily sweep runs
    pub hour: u32,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            completed_retention_days: COMPLETED_RETENTION_DAYS,
            failed_retention_days: FAILED_RETENTION_DAYS,
            batch_size: CLEANUP_BATCH_SIZE,
            timezone: chrono_tz::Europe::Kyiv,
            hour: CLEANUP_HOUR,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MediaflowConfig {
    pub environment: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub log_format: String,
    // Storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: String,
    pub s3_region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub local_storage_signing_secret: Option<String>,
    pub signed_url_expiry_secs: u64,
    // Upload validation
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub queue: QueueSettings,
    pub cleanup: CleanupSettings,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<MediaflowConfig>);

impl Config {
    fn inner(&self) -> &MediaflowConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = MediaflowConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.inner().environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn log_format(&self) -> &str {
        &self.inner().log_format
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> &str {
        &self.inner().s3_bucket
    }

    pub fn s3_region(&self) -> &str {
        &self.inner().s3_region
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn s3_access_key(&self) -> Option<&str> {
        self.inner().s3_access_key.as_deref()
    }

    pub fn s3_secret_key(&self) -> Option<&str> {
        self.inner().s3_secret_key.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn local_storage_signing_secret(&self) -> Option<&str> {
        self.inner().local_storage_signing_secret.as_deref()
    }

    /// Expiry applied to every signed download link, capped at 15 minutes.
    pub fn signed_url_expiry(&self) -> Duration {
        Duration::from_secs(
            self.inner()
                .signed_url_expiry_secs
                .min(MAX_SIGNED_URL_EXPIRY_SECS),
        )
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.inner().max_file_size_bytes
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.inner().allowed_content_types
    }

    pub fn queue(&self) -> &QueueSettings {
        &self.inner().queue
    }

    pub fn cleanup(&self) -> &CleanupSettings {
        &self.inner().cleanup
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl MediaflowConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let allowed_content_types = env::var("ALLOWED_CONTENT_TYPES")
            .unwrap_or_else(|_| "image/jpeg,image/png,image/webp,image/gif".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let max_file_size_mb: usize = env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB);

        let queue = QueueSettings {
            attempts: env_or("JOB_ATTEMPTS", JOB_ATTEMPTS),
            backoff_delay_ms: env_or("JOB_BACKOFF_DELAY_MS", JOB_BACKOFF_DELAY_MS),
            remove_on_complete_secs: env_or(
                "JOB_REMOVE_ON_COMPLETE_SECS",
                JOB_REMOVE_ON_COMPLETE_SECS,
            ),
            remove_on_fail_secs: env_or("JOB_REMOVE_ON_FAIL_SECS", JOB_REMOVE_ON_FAIL_SECS),
            job_timeout_secs: env_or("JOB_TIMEOUT_SECS", JOB_TIMEOUT_SECS),
            worker_enabled: env_or("WORKER_ENABLED", true),
            worker_concurrency: env_or("WORKER_CONCURRENCY", WORKER_CONCURRENCY),
            poll_interval_ms: env_or("WORKER_POLL_INTERVAL_MS", WORKER_POLL_INTERVAL_MS),
            stalled_check_interval_secs: env_or(
                "STALLED_JOB_CHECK_INTERVAL_SECS",
                STALLED_JOB_CHECK_INTERVAL_SECS,
            ),
            stalled_grace_period_secs: env_or(
                "STALLED_JOB_GRACE_PERIOD_SECS",
                STALLED_JOB_GRACE_PERIOD_SECS,
            ),
        };

        let timezone_name =
            env::var("CLEANUP_TIMEZONE").unwrap_or_else(|_| CLEANUP_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| anyhow::anyhow!("CLEANUP_TIMEZONE is not a valid IANA zone: {}", timezone_name))?;

        let cleanup = CleanupSettings {
            enabled: env_or("CLEANUP_ENABLED", true),
            completed_retention_days: env_or(
                "CLEANUP_COMPLETED_RETENTION_DAYS",
                COMPLETED_RETENTION_DAYS,
            ),
            failed_retention_days: env_or("CLEANUP_FAILED_RETENTION_DAYS", FAILED_RETENTION_DAYS),
            batch_size: env_or("CLEANUP_BATCH_SIZE", CLEANUP_BATCH_SIZE),
            timezone,
            hour: env_or("CLEANUP_HOUR", CLEANUP_HOUR),
        };

        let config = MediaflowConfig {
            environment,
            server_port,
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").unwrap_or_else(|_| DEFAULT_S3_BUCKET.to_string()),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            s3_access_key: env_opt("S3_ACCESS_KEY"),
            s3_secret_key: env_opt("S3_SECRET_KEY"),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            local_storage_base_url: env_opt("LOCAL_STORAGE_BASE_URL"),
            local_storage_signing_secret: env_opt("LOCAL_STORAGE_SIGNING_SECRET"),
            signed_url_expiry_secs: env_or("SIGNED_URL_EXPIRY_SECS", MAX_SIGNED_URL_EXPIRY_SECS),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_content_types,
            queue,
            cleanup,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_access_key.is_some() != self.s3_secret_key.is_some() {
                    return Err(anyhow::anyhow!(
                        "S3_ACCESS_KEY and S3_SECRET_KEY must be set together"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
                match &self.local_storage_signing_secret {
                    Some(secret) if secret.len() >= 32 => {}
                    _ => {
                        return Err(anyhow::anyhow!(
                            "LOCAL_STORAGE_SIGNING_SECRET must be at least 32 characters long"
                        ))
                    }
                }
            }
        }

        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES must not be empty"));
        }
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.signed_url_expiry_secs == 0 {
            return Err(anyhow::anyhow!("SIGNED_URL_EXPIRY_SECS must be greater than 0"));
        }
        if self.queue.attempts == 0 {
            return Err(anyhow::anyhow!("JOB_ATTEMPTS must be at least 1"));
        }
        if self.queue.worker_concurrency == 0 {
            return Err(anyhow::anyhow!("WORKER_CONCURRENCY must be at least 1"));
        }
        if self.cleanup.hour > 23 {
            return Err(anyhow::anyhow!("CLEANUP_HOUR must be between 0 and 23"));
        }
        if self.cleanup.batch_size <= 0 {
            return Err(anyhow::anyhow!("CLEANUP_BATCH_SIZE must be positive"));
        }
        if self.cleanup.completed_retention_days < 0 || self.cleanup.failed_retention_days < 0 {
            return Err(anyhow::anyhow!("Cleanup retention days must not be negative"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> MediaflowConfig {
        MediaflowConfig {
            environment: "test".to_string(),
            server_port: SERVER_PORT,
            database_url: "postgres://localhost/mediaflow".to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            log_format: "compact".to_string(),
            storage_backend: StorageBackend::S3,
            s3_bucket: DEFAULT_S3_BUCKET.to_string(),
            s3_region: DEFAULT_S3_REGION.to_string(),
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            local_storage_path: None,
            local_storage_base_url: None,
            local_storage_signing_secret: None,
            signed_url_expiry_secs: 3600,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_content_types: vec!["image/png".to_string()],
            queue: QueueSettings::default(),
            cleanup: CleanupSettings::default(),
        }
    }

    #[test]
    fn test_valid_s3_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let mut config = base_config();
        config.database_url = "mysql://localhost/db".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_backend_requires_signing_secret() {
        let mut config = base_config();
        config.storage_backend = StorageBackend::Local;
        config.local_storage_path = Some("/tmp/media".to_string());
        config.local_storage_base_url = Some("http://localhost:3000/files".to_string());
        assert!(config.validate().is_err());

        config.local_storage_signing_secret = Some("x".repeat(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_s3_credentials_rejected() {
        let mut config = base_config();
        config.s3_access_key = Some("minio".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_signed_url_expiry_is_capped() {
        let config = Config(Box::new(base_config()));
        assert_eq!(config.signed_url_expiry(), Duration::from_secs(900));
    }

    #[test]
    fn test_queue_defaults() {
        let queue = QueueSettings::default();
        assert_eq!(queue.attempts, 3);
        assert_eq!(queue.backoff_delay_ms, 2000);
        assert_eq!(queue.remove_on_complete_secs, 3600);
        assert_eq!(queue.remove_on_fail_secs, 86_400);
    }

    #[test]
    fn test_cleanup_defaults() {
        let cleanup = CleanupSettings::default();
        assert_eq!(cleanup.timezone, chrono_tz::Europe::Kyiv);
        assert_eq!(cleanup.hour, 0);
        assert!(cleanup.completed_retention_days > cleanup.failed_retention_days);
    }
}
