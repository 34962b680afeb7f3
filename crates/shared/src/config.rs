//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Receipt ingestion configuration.
    #[serde(default)]
    pub receipts: ReceiptConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "ledgerline=info,sea_orm=warn".to_string()
}

/// Receipt ingestion configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptConfig {
    /// Parser provider used when the caller does not pick one.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Largest accepted image upload in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    /// Where receipt images are archived.
    #[serde(default)]
    pub storage: ImageStorageConfig,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            max_image_bytes: default_max_image_bytes(),
            storage: ImageStorageConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}

/// Backend for the receipt image archive.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageStorageConfig {
    /// One of `fs`, `s3`, `memory`.
    #[serde(default = "default_storage_provider")]
    pub provider: String,
    /// Root directory for the `fs` backend.
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Bucket for the `s3` backend.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Endpoint for S3-compatible services.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Region for the `s3` backend.
    #[serde(default)]
    pub region: Option<String>,
    /// Access key for the `s3` backend.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret key for the `s3` backend.
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl Default for ImageStorageConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            root: default_storage_root(),
            bucket: None,
            endpoint: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

fn default_storage_provider() -> String {
    "fs".to_string()
}

fn default_storage_root() -> String {
    "./data/receipts".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// `config/local`, then `LEDGERLINE__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("LEDGERLINE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
