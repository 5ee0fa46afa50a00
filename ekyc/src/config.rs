//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `EKYC_CONFIG`
//! environment variable. A missing file is not an error: every field has a default except
//! `storage.bucket`, which must be supplied somewhere.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `EKYC_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `EKYC_STORAGE__BUCKET=kyc-uploads` sets the `storage.bucket` field.
//!
//! AWS region and credentials are resolved by the AWS SDK default chain (`AWS_REGION`,
//! `AWS_ACCESS_KEY_ID`, profiles, instance metadata, ...). `aws.region` pins the region explicitly.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! EKYC_PORT=9090
//! EKYC_STORAGE__BUCKET=kyc-test-11571204
//! EKYC_COMPARISON__SIMILARITY_THRESHOLD=85
//! EKYC_AWS__REGION=ap-southeast-1
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "EKYC_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation, apart from the bucket name
/// which is validated as required.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// AWS settings shared by the S3 and Rekognition clients
    pub aws: AwsConfig,
    /// Object store that receives the uploaded images
    pub storage: StorageConfig,
    /// Face comparison settings
    pub comparison: ComparisonConfig,
    /// Request size limits
    pub limits: LimitsConfig,
    /// CORS settings for browser clients
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    /// Region override. When unset the SDK default provider chain decides.
    pub region: Option<String>,
}

/// Object store configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Bucket receiving both uploaded images. Also referenced in the comparison request.
    pub bucket: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack, ...)
    pub endpoint_url: Option<Url>,
    /// Address buckets as `/{bucket}/{key}` instead of virtual-hosted style
    pub force_path_style: bool,
}

/// Face comparison configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparisonConfig {
    /// Minimum similarity (percent) for a face to be reported as a match
    pub similarity_threshold: f32,
    /// Custom Rekognition endpoint
    pub endpoint_url: Option<Url>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 90.0,
            endpoint_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum size in bytes of a `/compare` request body, both images included
    pub max_upload_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            // Rekognition accepts S3 images up to 15 MiB
            max_upload_size: 15 * 1024 * 1024,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            max_age: Some(12 * 60 * 60),
        }
    }
}

/// Allowed CORS origin: either `*` or a URL.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard", serialize_with = "serialize_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn serialize_wildcard<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("*")
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            aws: AwsConfig::default(),
            storage: StorageConfig::default(),
            comparison: ComparisonConfig::default(),
            limits: LimitsConfig::default(),
            cors: CorsConfig::default(),
            enable_metrics: false,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.storage.bucket.trim().is_empty() {
            return Err(Error::Internal {
                operation: "validate configuration: storage.bucket is not set. Set it in the config file or via EKYC_STORAGE__BUCKET."
                    .to_string(),
            });
        }

        let threshold = self.comparison.similarity_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(Error::Internal {
                operation: format!("validate configuration: comparison.similarity_threshold ({threshold}) must be between 0 and 100"),
            });
        }

        if self.limits.max_upload_size == 0 {
            return Err(Error::Internal {
                operation: "validate configuration: limits.max_upload_size cannot be 0".to_string(),
            });
        }

        if self.aws.region.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(Error::Internal {
                operation: "validate configuration: aws.region cannot be empty. Remove it to use the SDK default chain.".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("EKYC_").split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
