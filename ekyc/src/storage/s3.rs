//! S3 (and S3-compatible) object store backend.

use super::{ObjectStore, StoreError};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
};
use bytes::Bytes;

use crate::config::StorageConfig;

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the shared SDK config, applying the store-specific endpoint settings
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, config: &StorageConfig) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint.as_str());
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

fn store_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.as_service_error() {
        Some(service) => StoreError::new(
            service.code(),
            service.message().map(str::to_string).unwrap_or_else(|| service.to_string()),
        ),
        None => StoreError::new(None, DisplayErrorContext(&err).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_sdk_config;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_for(server: &MockServer) -> S3ObjectStore {
        let config = StorageConfig {
            bucket: "kyc-bucket".to_string(),
            endpoint_url: Some(server.uri().parse().unwrap()),
            force_path_style: true,
        };
        S3ObjectStore::from_sdk_config(&test_sdk_config(), &config)
    }

    #[test_log::test(tokio::test)]
    async fn test_put_object_sends_body_to_bucket_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/kyc-bucket/abc-a.jpg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        store
            .put_object("kyc-bucket", "abc-a.jpg", Bytes::from_static(b"jpeg-bytes"), Some("image/jpeg"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        // the SDK may wrap the payload in aws-chunked framing for its checksum trailer
        let body = &requests[0].body;
        assert!(body.windows(10).any(|w| w == b"jpeg-bytes"));
    }

    #[test_log::test(tokio::test)]
    async fn test_service_error_keeps_code() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex("^/missing-bucket/.*"))
            .respond_with(ResponseTemplate::new(404).set_body_raw(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchBucket</Code><Message>The specified bucket does not exist</Message></Error>"#,
                "application/xml",
            ))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let err = store
            .put_object("missing-bucket", "abc-a.jpg", Bytes::from_static(b"x"), None)
            .await
            .unwrap_err();

        assert_eq!(err.code.as_deref(), Some("NoSuchBucket"));
        assert_eq!(err.message, "The specified bucket does not exist");
    }
}
