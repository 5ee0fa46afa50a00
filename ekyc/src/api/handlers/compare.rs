//! `POST /compare`: upload two images and compare the faces in them.

use crate::AppState;
use crate::api::models::compare::{CompareFacesForm, SOURCE_FIELD, TARGET_FIELD};
use crate::comparison::{ComparisonRequest, ComparisonResult, ImageRef};
use crate::errors::{Error, Result};
use crate::storage::{self, UploadRequest};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use tracing::{debug, info};

#[utoipa::path(
    post,
    path = "/compare",
    tag = "compare",
    summary = "Compare faces",
    description = "Uploads `fileSource` and `fileTarget` to the object store, then asks the face comparison service \
whether the face in the source image appears in the target image. The service response is returned unchanged.",
    request_body(content = CompareFacesForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Raw comparison result from the face comparison service", body = Object),
        (status = 400, description = "Missing file part, or the comparison service rejected the request", body = String),
        (status = 413, description = "Request body exceeds the upload limit", body = String),
        (status = 500, description = "Comparison failed without a recognized error code", body = String),
        (status = 502, description = "An image could not be written to the object store", body = String),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn compare_faces(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ComparisonResult>> {
    let mut multipart = multipart.map_err(Error::from_multipart_rejection)?;
    let mut source: Option<UploadRequest> = None;
    let mut target: Option<UploadRequest> = None;

    while let Some(field) = multipart.next_field().await.map_err(Error::from_multipart)? {
        let field_name = field.name().unwrap_or("").to_string();
        let slot = match field_name.as_str() {
            SOURCE_FIELD => &mut source,
            TARGET_FIELD => &mut target,
            _ => {
                debug!(field = %field_name, "Ignoring unexpected multipart field");
                continue;
            }
        };
        if slot.is_some() {
            debug!(field = %field_name, "Ignoring repeated multipart field");
            continue;
        }

        let display_name = field.file_name().map(str::to_string).ok_or_else(|| Error::BadRequest {
            message: format!("{field_name} must be a file"),
        })?;
        if display_name.is_empty() {
            return Err(Error::BadRequest {
                message: format!("{field_name} must have a file name"),
            });
        }
        let content_type = field.content_type().map(str::to_string);
        let content = field.bytes().await.map_err(Error::from_multipart)?;

        debug!(field = %field_name, display_name = %display_name, size = content.len(), "Received image");
        *slot = Some(UploadRequest {
            display_name,
            content,
            content_type,
        });
    }

    let source = source.ok_or_else(|| missing(SOURCE_FIELD))?;
    let target = target.ok_or_else(|| missing(TARGET_FIELD))?;

    let bucket = state.config.storage.bucket.as_str();
    let store = state.object_store.as_ref();
    let source_key = storage::upload(store, bucket, source).await?;
    let target_key = storage::upload(store, bucket, target).await?;

    let request = ComparisonRequest {
        source: ImageRef::new(bucket, source_key),
        target: ImageRef::new(bucket, target_key),
        similarity_threshold: state.config.comparison.similarity_threshold,
    };

    let result = state.comparator.compare_faces(&request).await?;
    info!(source = %request.source.key, target = %request.target.key, "Faces compared");

    Ok(Json(result))
}

fn missing(field: &str) -> Error {
    Error::BadRequest {
        message: format!("{field} is required"),
    }
}
