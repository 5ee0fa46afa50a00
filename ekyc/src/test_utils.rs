//! Test utilities: in-memory collaborators and a ready-made test server.

use crate::comparison::{ComparisonError, ComparisonRequest, ComparisonResult, FaceComparator};
use crate::config::Config;
use crate::storage::{ObjectStore, StoreError};
use crate::{AppState, build_router};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig, retry::RetryConfig};
use aws_credential_types::{Credentials, provider::SharedCredentialsProvider};
use axum_test::TestServer;
use bytes::Bytes;
use std::sync::{Arc, Mutex};

pub const TEST_BUCKET: &str = "kyc-test-bucket";

/// A single recorded `put_object` call
#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Object store that keeps every write in memory, or rejects every write with a fixed error
#[derive(Default)]
pub struct MemoryObjectStore {
    puts: Mutex<Vec<RecordedPut>>,
    failure: Option<StoreError>,
}

impl MemoryObjectStore {
    pub fn failing(error: StoreError) -> Self {
        Self {
            puts: Mutex::default(),
            failure: Some(error),
        }
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> Result<(), StoreError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.puts.lock().unwrap().push(RecordedPut {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_type: content_type.map(str::to_string),
        });
        Ok(())
    }
}

/// Comparator returning a canned response and remembering what it was asked
pub struct StubComparator {
    response: Result<ComparisonResult, ComparisonError>,
    requests: Mutex<Vec<ComparisonRequest>>,
}

impl StubComparator {
    pub fn returning(result: serde_json::Value) -> Self {
        Self {
            response: Ok(ComparisonResult(result)),
            requests: Mutex::default(),
        }
    }

    pub fn failing(error: ComparisonError) -> Self {
        Self {
            response: Err(error),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<ComparisonRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FaceComparator for StubComparator {
    async fn compare_faces(&self, request: &ComparisonRequest) -> Result<ComparisonResult, ComparisonError> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone()
    }
}

pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.storage.bucket = TEST_BUCKET.to_string();
    config
}

/// Build a test server around the given collaborators
pub fn create_test_app(config: Config, store: Arc<MemoryObjectStore>, comparator: Arc<StubComparator>) -> TestServer {
    let state = AppState::builder()
        .config(config)
        .object_store(store)
        .comparator(comparator)
        .build();
    let router = build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// SDK config with static credentials and no retries, for pointing clients at a mock server
pub fn test_sdk_config() -> SdkConfig {
    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
            "AKIDTEST",
            "test-secret",
            None,
            None,
            "test",
        )))
        .retry_config(RetryConfig::disabled())
        .build()
}
