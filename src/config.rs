use std::time::Duration;

use thiserror::Error;

use crate::hierarchy::HierarchyConfig;

/// GCS and S3 both refuse presigned URLs that live longer than a week.
const MAX_CAPABILITY_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub storage: StorageConfig,
    pub capabilities: CapabilityConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC).
    /// Signed URLs on GCS need it.
    pub gcs_credentials_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CapabilityConfig {
    /// Base of locally-signed URLs, e.g. `https://files.example.com`.
    pub public_base_url: String,
    /// HMAC key for locally-signed URLs. `None` means a random per-process key,
    /// so URLs do not survive a restart.
    pub signing_secret: Option<String>,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub search_window: usize,
    pub mutation_concurrency: usize,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./objects".to_string(),
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8080".to_string(),
            signing_secret: None,
            ttl_seconds: 3600,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            search_window: 1000,
            mutation_concurrency: 8,
            max_upload_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            "local" => StorageBackend::Local,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "STORAGE_BACKEND must be 'local' or 'gcs', got '{other}'"
                )))
            }
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./objects".to_string());
        let gcs_bucket = std::env::var("GCS_BUCKET").ok();
        let gcs_credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| default_public_base_url(&bind_address));
        let signing_secret = std::env::var("SIGNING_SECRET").ok();

        let defaults = LimitsConfig::default();
        let config = Config {
            bind_address,
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                gcs_bucket,
                gcs_credentials_file,
            },
            capabilities: CapabilityConfig {
                public_base_url,
                signing_secret,
                ttl_seconds: parse_env("CAPABILITY_TTL", 3600)?,
            },
            limits: LimitsConfig {
                search_window: parse_env("SEARCH_WINDOW", defaults.search_window)?,
                mutation_concurrency: parse_env(
                    "MUTATION_CONCURRENCY",
                    defaults.mutation_concurrency,
                )?,
                max_upload_size: parse_env("MAX_UPLOAD_SIZE", defaults.max_upload_size)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Gcs && self.storage.gcs_bucket.is_none() {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        if self.capabilities.ttl_seconds == 0
            || self.capabilities.ttl_seconds > MAX_CAPABILITY_TTL_SECS
        {
            return Err(ConfigError::ValidationError(format!(
                "CAPABILITY_TTL must be between 1 and {MAX_CAPABILITY_TTL_SECS} seconds"
            )));
        }

        if self.limits.search_window == 0 {
            return Err(ConfigError::ValidationError(
                "SEARCH_WINDOW must be greater than 0".to_string(),
            ));
        }

        if self.limits.mutation_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "MUTATION_CONCURRENCY must be greater than 0".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Gcs && self.storage.gcs_credentials_file.is_none()
        {
            tracing::warn!(
                "GCS_CREDENTIALS_FILE not set; download and upload URLs cannot be signed"
            );
        }

        Ok(())
    }

    pub fn hierarchy(&self) -> HierarchyConfig {
        HierarchyConfig {
            search_window: self.limits.search_window,
            mutation_concurrency: self.limits.mutation_concurrency,
            capability_ttl: Duration::from_secs(self.capabilities.ttl_seconds),
        }
    }
}

/// Clients cannot reach a wildcard listen address, so signed URLs point at
/// `localhost` on the bound port.
fn default_public_base_url(bind_address: &str) -> String {
    match bind_address.rsplit_once(':') {
        Some((_, port)) if !port.is_empty() => format!("http://localhost:{port}"),
        _ => "http://localhost:8080".to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::ValidationError(format!("{name} must be a non-negative integer"))
        }),
        Err(_) => Ok(default),
    }
}
