//! Content-addressed receipt image archive using Apache OpenDAL.
//!
//! Supported backends:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, MinIO
//! - Local filesystem (development only)
//! - In-process memory (tests)
//!
//! # Key layout
//!
//! ```text
//! receipts/<first two hex of sha256>/<sha256>/<sanitized filename>
//! ```
//!
//! The same image uploaded twice lands on the same key.

mod config;
mod error;
mod service;

pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::{ArchivedImage, ReceiptImageStore, image_key, sanitize_filename, sha256_hex};
