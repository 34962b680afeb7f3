//! Image archive implementation using Apache OpenDAL.

use opendal::{ErrorKind, Operator, services};
use sha2::{Digest, Sha256};

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;

/// Where an image was archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedImage {
    /// Lowercase hex SHA-256 of the image.
    pub sha256: String,
    /// Archive key.
    pub key: String,
    /// Image size in bytes.
    pub size: u64,
}

/// Content-addressed store for receipt images.
#[derive(Debug, Clone)]
pub struct ReceiptImageStore {
    operator: Operator,
    config: StorageConfig,
}

impl ReceiptImageStore {
    /// Create a new archive from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// In-memory archive with the default size limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory backend cannot be initialized.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_config(StorageConfig::new(StorageProvider::Memory))
    }

    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        let operator = match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let mut builder = services::S3::default().bucket(bucket).region(region);
                if let Some(endpoint) = endpoint {
                    builder = builder.endpoint(endpoint);
                }
                if let Some(key) = access_key_id {
                    builder = builder.access_key_id(key);
                }
                if let Some(secret) = secret_access_key {
                    builder = builder.secret_access_key(secret);
                }
                Operator::new(builder).map(|b| b.finish())
            }
            StorageProvider::LocalFs { root } => {
                let root = root
                    .to_str()
                    .ok_or_else(|| StorageError::configuration("invalid path"))?;
                Operator::new(services::Fs::default().root(root)).map(|b| b.finish())
            }
            StorageProvider::Memory => {
                Operator::new(services::Memory::default()).map(|b| b.finish())
            }
        };

        operator.map_err(|e| StorageError::configuration(e.to_string()))
    }

    /// Checks size limits before any I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty or too large.
    pub fn validate_image(&self, size: u64) -> Result<(), StorageError> {
        if size == 0 {
            return Err(StorageError::EmptyImage);
        }
        if size > self.config.max_file_size {
            return Err(StorageError::file_too_large(size, self.config.max_file_size));
        }
        Ok(())
    }

    /// Writes the image under its content-derived key.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or the backend write fails.
    pub async fn store(&self, image: &[u8], filename: &str) -> Result<ArchivedImage, StorageError> {
        let size = u64::try_from(image.len()).unwrap_or(u64::MAX);
        self.validate_image(size)?;

        let sha256 = sha256_hex(image);
        let key = image_key(&sha256, filename);
        self.operator.write(&key, image.to_vec()).await?;

        tracing::debug!(key = %key, size, "archived receipt image");
        Ok(ArchivedImage { sha256, key, size })
    }

    /// Reads an archived image.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the key is absent.
    pub async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let buffer = self.operator.read(key).await?;
        Ok(buffer.to_vec())
    }

    /// Delete an archived image.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.operator.delete(key).await.map_err(StorageError::from)
    }

    /// Check if an image exists in the archive.
    pub async fn exists(&self, key: &str) -> bool {
        match self.operator.stat(key).await {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(_) => false,
        }
    }

    /// Get the backend name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Archive key for an image: `receipts/<2 hex>/<digest>/<sanitized filename>`.
#[must_use]
pub fn image_key(sha256: &str, filename: &str) -> String {
    let prefix = sha256.get(..2).unwrap_or("00");
    let name = sanitize_filename(filename);
    let name = if name.is_empty() { "image".to_string() } else { name };
    format!("receipts/{prefix}/{sha256}/{name}")
}

/// Sanitize filename for storage key.
///
/// Only allows ASCII alphanumeric characters, dots, hyphens, and underscores.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    // Sanitized filenames only contain safe characters
    proptest! {
        #[test]
        fn prop_sanitized_filename_safe_chars(filename in ".*") {
            let sanitized = sanitize_filename(&filename);

            for c in sanitized.chars() {
                let is_safe = c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_';
                prop_assert!(is_safe, "Unexpected character in sanitized filename: {}", c);
            }
        }
    }

    // Keys have four segments and are a pure function of content and name
    proptest! {
        #[test]
        fn prop_image_key_format(
            bytes in prop::collection::vec(any::<u8>(), 1..256),
            filename in "[a-zA-Z0-9 _-]{1,30}\\.[a-z]{2,4}",
        ) {
            let digest = sha256_hex(&bytes);
            let key = image_key(&digest, &filename);
            let parts: Vec<&str> = key.split('/').collect();

            prop_assert_eq!(parts.len(), 4);
            prop_assert_eq!(parts[0], "receipts");
            prop_assert_eq!(parts[1], &digest[..2]);
            prop_assert_eq!(parts[2], digest.as_str());
            prop_assert_eq!(key, image_key(&sha256_hex(&bytes), &filename));
        }
    }
}
