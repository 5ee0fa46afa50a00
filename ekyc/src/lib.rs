//! # ekyc: face comparison gateway
//!
//! `ekyc` is a small HTTP service for electronic know-your-customer checks. A client posts two
//! images (typically an ID document photo and a selfie); the service stores both in an S3
//! bucket and asks AWS Rekognition whether the faces match, relaying Rekognition's answer as-is.
//!
//! ## Request Flow
//!
//! `POST /compare` carries two multipart file parts, `fileSource` and `fileTarget`. Each is
//! written to the configured bucket under a fresh `<uuid>-<file name>` key by the upload gateway
//! ([`storage`]). A `CompareFaces` request referencing both objects and the configured similarity
//! threshold is then sent through the [`comparison`] module. Vendor error codes are mapped to
//! HTTP statuses through a static table; successful results are returned unchanged.
//!
//! The object store and the comparison service are both behind traits
//! ([`storage::ObjectStore`], [`comparison::FaceComparator`]). Their clients are created once in
//! [`Application::new`] and shared by every request through [`AppState`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use ekyc::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = ekyc::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     ekyc::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod comparison;
pub mod config;
pub mod errors;
mod openapi;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use crate::comparison::{FaceComparator, RekognitionComparator};
use crate::config::{AwsConfig, CorsOrigin};
use crate::openapi::ApiDoc;
use crate::storage::{ObjectStore, S3ObjectStore};
use anyhow::Context;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Json, Router,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// Built once at startup and never reinitialised. The collaborator handles are immutable and safe
/// to share between concurrent requests.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .object_store(Arc::new(store))
///     .comparator(Arc::new(comparator))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub object_store: Arc<dyn ObjectStore>,
    pub comparator: Arc<dyn FaceComparator>,
}

/// Resolve the shared AWS SDK configuration and make sure it is usable.
///
/// Fails if no region can be determined or no credentials can be resolved, so the process never
/// starts serving without a working AWS session.
pub async fn load_sdk_config(config: &AwsConfig) -> anyhow::Result<SdkConfig> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;

    let region = sdk_config
        .region()
        .context("No AWS region configured. Set aws.region in the config file or AWS_REGION.")?;
    let credentials = sdk_config
        .credentials_provider()
        .context("No AWS credentials provider available")?;
    credentials
        .provide_credentials()
        .await
        .context("Failed to resolve AWS credentials")?;

    info!(region = %region, "AWS session established");
    Ok(sdk_config)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let allow_origin = if cors_config
        .allowed_origins
        .iter()
        .any(|origin| matches!(origin, CorsOrigin::Wildcard))
    {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_LENGTH, header::CONTENT_TYPE]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `GET /` welcome message and `GET /healthz` for probes
/// - `POST /compare` with the configured upload limit
/// - OpenAPI JSON at `/api-docs/openapi.json` and docs UI at `/docs`
/// - CORS and request tracing
/// - Prometheus metrics at `/internal/metrics` when enabled
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/", get(api::handlers::health::welcome))
        .route("/compare", post(api::handlers::compare::compare_faces))
        .layer(DefaultBodyLimit::max(state.config.limits.max_upload_size))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns the router and configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] establishes the AWS session and builds the clients
/// 2. **Serve**: [`Application::serve`] binds to the configured address and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests drain and telemetry is flushed
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance backed by S3 and Rekognition
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting eKYC service with configuration: {:#?}", config);

        let sdk_config = load_sdk_config(&config.aws).await?;

        let state = AppState::builder()
            .config(config.clone())
            .object_store(Arc::new(S3ObjectStore::from_sdk_config(&sdk_config, &config.storage)))
            .comparator(Arc::new(RekognitionComparator::from_sdk_config(&sdk_config, &config.comparison)))
            .build();

        Self::with_state(state)
    }

    /// Create an application around already constructed collaborators
    pub fn with_state(state: AppState) -> anyhow::Result<Self> {
        let router = build_router(&state)?;
        Ok(Self {
            router,
            config: state.config,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "eKYC service listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
