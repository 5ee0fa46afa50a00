use crate::api::models::health::WelcomeResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    summary = "Welcome",
    description = "Liveness check. Always answers, without touching the object store or the comparison service.",
    responses(
        (status = 200, description = "Service is up", body = WelcomeResponse),
    )
)]
pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse::default())
}
