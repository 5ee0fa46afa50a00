//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers (`GET /`, `POST /compare`)
//! - **[`models`]**: Request/response data structures
//!
//! Endpoints are documented with `utoipa`; the rendered docs are served at `/docs`.

pub mod handlers;
pub mod models;
