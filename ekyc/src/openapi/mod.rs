//! OpenAPI documentation for the HTTP API.
//!
//! The document is served as JSON at `/api-docs/openapi.json` and rendered with Scalar at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "eKYC face comparison",
        description = "Uploads two images to the object store and compares the faces in them."
    ),
    paths(
        api::handlers::health::welcome,
        api::handlers::compare::compare_faces,
    ),
    components(schemas(
        api::models::health::WelcomeResponse,
        api::models::compare::CompareFacesForm,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "compare", description = "Face comparison"),
    )
)]
pub struct ApiDoc;
