use crate::comparison::ComparisonError;
use crate::storage::UploadError;
use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data, e.g. a missing or malformed multipart part
    #[error("{message}")]
    BadRequest { message: String },

    /// Request body exceeded the configured upload limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// An image could not be written to the object store
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The face comparison service rejected or failed the request
    #[error(transparent)]
    Comparison(#[from] ComparisonError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Upload(UploadError::EmptyName) => StatusCode::BAD_REQUEST,
            Error::Upload(UploadError::Store { .. }) => StatusCode::BAD_GATEWAY,
            Error::Comparison(err) => err.status_code(),
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a multipart parsing failure, keeping the body-limit case distinguishable.
    pub fn from_multipart(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::PayloadTooLarge { message: err.body_text() }
        } else {
            Error::BadRequest {
                message: format!("Failed to parse multipart data: {}", err.body_text()),
            }
        }
    }

    /// Map a request the multipart extractor refused outright, e.g. a missing boundary.
    pub fn from_multipart_rejection(rejection: MultipartRejection) -> Self {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details - different log levels based on severity
        match &self {
            Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Upload(UploadError::EmptyName) => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Upload(err) => {
                tracing::error!(error = %err, "Image upload failed, comparison aborted");
            }
            Error::Comparison(err) => err.log(),
            Error::BadRequest { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        // The body is the error string encoded as a JSON string
        (self.status_code(), Json(self.to_string())).into_response()
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    #[test]
    fn test_status_codes() {
        let bad = Error::BadRequest {
            message: "missing fileSource".to_string(),
        };
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);

        let upload = Error::Upload(UploadError::Store {
            bucket: "b".to_string(),
            key: "k".to_string(),
            source: StoreError::new(Some("NoSuchBucket"), "The specified bucket does not exist"),
        });
        assert_eq!(upload.status_code(), StatusCode::BAD_GATEWAY);

        let recognized = Error::Comparison(ComparisonError::new(Some("ThrottlingException"), "Rate exceeded"));
        assert_eq!(recognized.status_code(), StatusCode::BAD_REQUEST);

        let transport = Error::Comparison(ComparisonError::new(None, "dispatch failure"));
        assert_eq!(transport.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let internal = Error::Internal {
            operation: "validate configuration".to_string(),
        };
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Error::Upload(UploadError::EmptyName).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_display_is_error_string() {
        let err = Error::Comparison(ComparisonError::new(Some("InvalidParameterException"), "Request has invalid parameters"));
        assert_eq!(err.to_string(), "InvalidParameterException: Request has invalid parameters");
    }
}
