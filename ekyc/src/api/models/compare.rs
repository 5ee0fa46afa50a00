use utoipa::ToSchema;

/// Multipart field carrying the reference image (e.g. the ID document photo)
pub const SOURCE_FIELD: &str = "fileSource";
/// Multipart field carrying the image compared against the source (e.g. a selfie)
pub const TARGET_FIELD: &str = "fileTarget";

/// Multipart body of `POST /compare`. Only used for the OpenAPI document; the handler reads
/// the parts as a stream.
#[derive(ToSchema)]
#[allow(unused)]
pub struct CompareFacesForm {
    /// Source image. Its file name becomes part of the storage key.
    #[schema(rename = "fileSource", value_type = String, format = Binary)]
    pub file_source: Vec<u8>,
    /// Target image
    #[schema(rename = "fileTarget", value_type = String, format = Binary)]
    pub file_target: Vec<u8>,
}
