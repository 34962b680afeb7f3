//! Archive configuration types.

use std::path::PathBuf;

use ledgerline_shared::config::ImageStorageConfig;
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Archive backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, MinIO
    S3 {
        /// S3 endpoint URL. Empty means the AWS default.
        endpoint: Option<String>,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: Option<String>,
        /// Secret access key.
        secret_access_key: Option<String>,
        /// Region.
        region: String,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
    /// In-process memory; contents vanish with the process.
    Memory,
}

impl StorageProvider {
    /// Create local filesystem provider.
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Get the provider name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::LocalFs { .. } => "fs",
            Self::Memory => "memory",
        }
    }
}

/// Archive configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backend.
    pub provider: StorageProvider,
    /// Maximum image size in bytes.
    pub max_file_size: u64,
}

impl StorageConfig {
    /// Default max image size: 10MB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

    /// Create a config with the default size limit.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Set maximum image size.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Builds the archive config from the `receipts.storage` section.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown provider or an `s3` section without a bucket.
    pub fn from_settings(settings: &ImageStorageConfig, max_file_size: u64) -> Result<Self, StorageError> {
        let provider = match settings.provider.trim().to_lowercase().as_str() {
            "fs" | "local" => StorageProvider::local_fs(&settings.root),
            "memory" => StorageProvider::Memory,
            "s3" => StorageProvider::S3 {
                endpoint: settings.endpoint.clone(),
                bucket: settings
                    .bucket
                    .clone()
                    .ok_or_else(|| StorageError::configuration("s3 storage requires a bucket"))?,
                access_key_id: settings.access_key_id.clone(),
                secret_access_key: settings.secret_access_key.clone(),
                region: settings.region.clone().unwrap_or_else(|| "auto".to_string()),
            },
            other => {
                return Err(StorageError::configuration(format!(
                    "unknown storage provider '{other}'"
                )));
            }
        };
        Ok(Self::new(provider).with_max_file_size(max_file_size))
    }
}
