//! Face comparison: request/result types, the collaborator seam and the vendor error table.

pub mod rekognition;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::Level;

use crate::storage::StorageKey;

pub use rekognition::RekognitionComparator;

/// Reference to an image stored in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub bucket: String,
    pub key: String,
}

impl ImageRef {
    pub fn new(bucket: impl Into<String>, key: StorageKey) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into_inner(),
        }
    }
}

/// One comparison call, built fresh for each HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRequest {
    pub source: ImageRef,
    pub target: ImageRef,
    /// Minimum similarity, in percent, for a face to count as a match
    pub similarity_threshold: f32,
}

/// Raw result from the comparison service. Relayed to the client without reshaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComparisonResult(pub serde_json::Value);

#[async_trait]
pub trait FaceComparator: Send + Sync {
    async fn compare_faces(&self, request: &ComparisonRequest) -> Result<ComparisonResult, ComparisonError>;
}

/// Error reported by the comparison service.
///
/// `code` is the vendor error code when one was returned. Transport failures and other errors
/// without a structured code leave it empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonError {
    pub code: Option<String>,
    pub message: String,
}

impl ComparisonError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Table entry for this error's code, if it is one we recognize
    pub fn recognized(&self) -> Option<&'static RecognizedError> {
        self.code.as_deref().and_then(recognize)
    }

    pub fn status_code(&self) -> StatusCode {
        self.recognized()
            .map(|entry| entry.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Log the error at the level its table entry asks for
    pub fn log(&self) {
        let Some(entry) = self.recognized() else {
            tracing::error!(code = ?self.code, error = %self.message, "Face comparison failed");
            return;
        };

        match entry.level {
            Level::ERROR => tracing::error!(code = entry.code, error = %self.message, "Face comparison rejected"),
            Level::WARN => tracing::warn!(code = entry.code, error = %self.message, "Face comparison rejected"),
            _ => tracing::info!(code = entry.code, error = %self.message, "Face comparison rejected"),
        }
    }
}

impl fmt::Display for ComparisonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ComparisonError {}

/// A vendor error code with the log level and HTTP status it maps to.
#[derive(Debug)]
pub struct RecognizedError {
    pub code: &'static str,
    pub level: Level,
    pub status: StatusCode,
}

const fn entry(code: &'static str, level: Level) -> RecognizedError {
    RecognizedError {
        code,
        level,
        status: StatusCode::BAD_REQUEST,
    }
}

/// Vendor error codes reported back to the client as 400. Anything else is a 500.
pub static RECOGNIZED_ERRORS: &[RecognizedError] = &[
    entry("InvalidParameterException", Level::INFO),
    entry("InvalidS3ObjectException", Level::INFO),
    entry("ImageTooLargeException", Level::INFO),
    entry("InvalidImageFormatException", Level::INFO),
    entry("AccessDeniedException", Level::ERROR),
    entry("InternalServerError", Level::ERROR),
    entry("ThrottlingException", Level::WARN),
    entry("ProvisionedThroughputExceededException", Level::WARN),
];

pub fn recognize(code: &str) -> Option<&'static RecognizedError> {
    RECOGNIZED_ERRORS.iter().find(|entry| entry.code == code)
}
