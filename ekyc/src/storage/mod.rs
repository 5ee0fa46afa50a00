//! Upload gateway: writes incoming images to the object store under unique keys.
//!
//! The store itself sits behind [`ObjectStore`] so handlers can run against S3 in production
//! and an in-memory store in tests.

pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error as ThisError;
use tracing::{error, info, instrument};
use uuid::Uuid;

pub use s3::S3ObjectStore;

/// Trait for object store backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` to `bucket` under `key`, replacing any existing object
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> Result<(), StoreError>;
}

/// Error reported by an object store backend.
///
/// `code` carries the service error code when the store returned one; transport failures
/// only have a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub code: Option<String>,
    pub message: String,
}

impl StoreError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(ThisError, Debug)]
pub enum UploadError {
    #[error("file name must not be empty")]
    EmptyName,

    #[error("failed to upload {key} to bucket {bucket}: {source}")]
    Store {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },
}

/// An image waiting to be uploaded. Lives for one upload call.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Original file name of the multipart part
    pub display_name: String,
    pub content: Bytes,
    pub content_type: Option<String>,
}

/// Key of an uploaded object, `<uuid>-<display name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Build a fresh key for `display_name`. Every call yields a different key.
    pub fn generate(display_name: &str) -> Self {
        Self(format!("{}-{}", Uuid::new_v4(), display_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload one image to `bucket` and return the key it was stored under.
///
/// Performs a single write with no read-back and no retry. A failed write is returned to the
/// caller, which decides how to report it.
#[instrument(skip(store, request), fields(display_name = %request.display_name, size = request.content.len()))]
pub async fn upload(store: &dyn ObjectStore, bucket: &str, request: UploadRequest) -> Result<StorageKey, UploadError> {
    if request.display_name.is_empty() {
        return Err(UploadError::EmptyName);
    }

    let key = StorageKey::generate(&request.display_name);

    store
        .put_object(bucket, key.as_str(), request.content, request.content_type.as_deref())
        .await
        .map_err(|source| {
            error!(bucket = bucket, key = %key, code = ?source.code, error = %source.message, "Object store rejected upload");
            UploadError::Store {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            }
        })?;

    info!(bucket = bucket, key = %key, "Uploaded image");
    Ok(key)
}
