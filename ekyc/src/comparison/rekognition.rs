//! AWS Rekognition `CompareFaces` backend.
//!
//! The SDK output types are not serializable, so the response is rendered back into the
//! service's own JSON shape (`SourceImageFace`, `FaceMatches`, `UnmatchedFaces`, ...). Fields the
//! service did not return are left out rather than emitted as `null`.

use super::{ComparisonError, ComparisonRequest, ComparisonResult, FaceComparator, ImageRef};
use async_trait::async_trait;
use aws_sdk_rekognition::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::compare_faces::CompareFacesOutput,
    types::{
        BoundingBox, CompareFacesMatch, ComparedFace, ComparedSourceImageFace, Emotion, Image, ImageQuality, Landmark, Pose, S3Object,
        Smile,
    },
};
use serde_json::{Map, Number, Value};
use tracing::{debug, instrument};

use crate::config::ComparisonConfig;

pub struct RekognitionComparator {
    client: Client,
}

impl RekognitionComparator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, config: &ComparisonConfig) -> Self {
        let mut builder = aws_sdk_rekognition::config::Builder::from(sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint.as_str());
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl FaceComparator for RekognitionComparator {
    #[instrument(skip_all, fields(source = %request.source.key, target = %request.target.key))]
    async fn compare_faces(&self, request: &ComparisonRequest) -> Result<ComparisonResult, ComparisonError> {
        let output = self
            .client
            .compare_faces()
            .source_image(s3_image(&request.source))
            .target_image(s3_image(&request.target))
            .similarity_threshold(request.similarity_threshold)
            .send()
            .await
            .map_err(comparison_error)?;

        debug!(
            matches = output.face_matches().len(),
            unmatched = output.unmatched_faces().len(),
            "Face comparison completed"
        );
        Ok(ComparisonResult(result_document(&output)))
    }
}

fn s3_image(image: &ImageRef) -> Image {
    Image::builder()
        .s3_object(S3Object::builder().bucket(&image.bucket).name(&image.key).build())
        .build()
}

fn comparison_error<E, R>(err: SdkError<E, R>) -> ComparisonError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.as_service_error() {
        Some(service) => ComparisonError::new(
            service.code(),
            service.message().map(str::to_string).unwrap_or_else(|| service.to_string()),
        ),
        None => ComparisonError::new(None, DisplayErrorContext(&err).to_string()),
    }
}

/// JSON object builder that skips absent fields
#[derive(Default)]
struct Doc(Map<String, Value>);

impl Doc {
    fn field(mut self, name: &str, value: Option<Value>) -> Self {
        if let Some(value) = value {
            self.0.insert(name.to_string(), value);
        }
        self
    }

    fn list<T>(self, name: &str, items: &[T], render: fn(&T) -> Value) -> Self {
        self.field(name, Some(Value::Array(items.iter().map(render).collect())))
    }

    fn build(self) -> Value {
        Value::Object(self.0)
    }
}

/// Render an `f32` through its shortest decimal form so `99.2` stays `99.2` instead of
/// widening to `99.19999694824219`.
fn number(value: f32) -> Value {
    value
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn string(value: &str) -> Value {
    Value::String(value.to_string())
}

fn bounding_box(b: &BoundingBox) -> Value {
    Doc::default()
        .field("Width", b.width().map(number))
        .field("Height", b.height().map(number))
        .field("Left", b.left().map(number))
        .field("Top", b.top().map(number))
        .build()
}

fn landmark(l: &Landmark) -> Value {
    Doc::default()
        .field("Type", l.r#type().map(|t| string(t.as_str())))
        .field("X", l.x().map(number))
        .field("Y", l.y().map(number))
        .build()
}

fn pose(p: &Pose) -> Value {
    Doc::default()
        .field("Roll", p.roll().map(number))
        .field("Yaw", p.yaw().map(number))
        .field("Pitch", p.pitch().map(number))
        .build()
}

fn quality(q: &ImageQuality) -> Value {
    Doc::default()
        .field("Brightness", q.brightness().map(number))
        .field("Sharpness", q.sharpness().map(number))
        .build()
}

fn emotion(e: &Emotion) -> Value {
    Doc::default()
        .field("Type", e.r#type().map(|t| string(t.as_str())))
        .field("Confidence", e.confidence().map(number))
        .build()
}

fn smile(s: &Smile) -> Value {
    Doc::default()
        .field("Value", Some(Value::Bool(s.value())))
        .field("Confidence", s.confidence().map(number))
        .build()
}

fn compared_face(face: &ComparedFace) -> Value {
    let mut doc = Doc::default()
        .field("BoundingBox", face.bounding_box().map(bounding_box))
        .field("Confidence", face.confidence().map(number));
    if !face.landmarks().is_empty() {
        doc = doc.list("Landmarks", face.landmarks(), landmark);
    }
    doc = doc
        .field("Pose", face.pose().map(pose))
        .field("Quality", face.quality().map(quality));
    if !face.emotions().is_empty() {
        doc = doc.list("Emotions", face.emotions(), emotion);
    }
    doc.field("Smile", face.smile().map(smile)).build()
}

fn source_face(face: &ComparedSourceImageFace) -> Value {
    Doc::default()
        .field("BoundingBox", face.bounding_box().map(bounding_box))
        .field("Confidence", face.confidence().map(number))
        .build()
}

fn face_match(m: &CompareFacesMatch) -> Value {
    Doc::default()
        .field("Similarity", m.similarity().map(number))
        .field("Face", m.face().map(compared_face))
        .build()
}

fn result_document(output: &CompareFacesOutput) -> Value {
    Doc::default()
        .field("SourceImageFace", output.source_image_face().map(source_face))
        .list("FaceMatches", output.face_matches(), face_match)
        .list("UnmatchedFaces", output.unmatched_faces(), compared_face)
        .field(
            "SourceImageOrientationCorrection",
            output.source_image_orientation_correction().map(|o| string(o.as_str())),
        )
        .field(
            "TargetImageOrientationCorrection",
            output.target_image_orientation_correction().map(|o| string(o.as_str())),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_sdk_config;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AMZ_JSON: &str = "application/x-amz-json-1.1";

    fn comparator(endpoint: &str) -> RekognitionComparator {
        let config = ComparisonConfig {
            similarity_threshold: 90.0,
            endpoint_url: Some(endpoint.parse().unwrap()),
        };
        RekognitionComparator::from_sdk_config(&test_sdk_config(), &config)
    }

    fn request() -> ComparisonRequest {
        ComparisonRequest {
            source: ImageRef {
                bucket: "kyc-bucket".to_string(),
                key: "id1-a.jpg".to_string(),
            },
            target: ImageRef {
                bucket: "kyc-bucket".to_string(),
                key: "id2-b.jpg".to_string(),
            },
            similarity_threshold: 90.0,
        }
    }

    async fn mount_compare(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", "RekognitionService.CompareFaces"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[test_log::test(tokio::test)]
    async fn test_result_is_relayed_in_service_shape() {
        let server = MockServer::start().await;
        let body = json!({
            "SourceImageFace": {
                "BoundingBox": {"Width": 0.5, "Height": 0.625, "Left": 0.125, "Top": 0.25},
                "Confidence": 99.9
            },
            "FaceMatches": [{
                "Similarity": 99.2,
                "Face": {
                    "BoundingBox": {"Width": 0.4, "Height": 0.5, "Left": 0.3, "Top": 0.1},
                    "Confidence": 99.8,
                    "Landmarks": [{"Type": "eyeLeft", "X": 0.35, "Y": 0.2}],
                    "Pose": {"Roll": 1.5, "Yaw": -2.25, "Pitch": 0.5},
                    "Quality": {"Brightness": 80.5, "Sharpness": 92.25}
                }
            }],
            "UnmatchedFaces": [],
            "SourceImageOrientationCorrection": "ROTATE_0"
        });
        mount_compare(&server, ResponseTemplate::new(200).set_body_raw(body.to_string(), AMZ_JSON)).await;

        let result = comparator(&server.uri()).compare_faces(&request()).await.unwrap();

        assert_eq!(result.0, body);

        let sent = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&sent[0].body).unwrap();
        assert_eq!(sent["SourceImage"]["S3Object"], json!({"Bucket": "kyc-bucket", "Name": "id1-a.jpg"}));
        assert_eq!(sent["TargetImage"]["S3Object"], json!({"Bucket": "kyc-bucket", "Name": "id2-b.jpg"}));
        assert_eq!(sent["SimilarityThreshold"].as_f64(), Some(90.0));
    }

    #[test_log::test(tokio::test)]
    async fn test_vendor_error_code_is_kept() {
        let server = MockServer::start().await;
        let body = json!({"__type": "InvalidParameterException", "Message": "Request has invalid parameters"});
        mount_compare(&server, ResponseTemplate::new(400).set_body_raw(body.to_string(), AMZ_JSON)).await;

        let err = comparator(&server.uri()).compare_faces(&request()).await.unwrap_err();

        assert_eq!(err.code.as_deref(), Some("InvalidParameterException"));
        assert_eq!(err.message, "Request has invalid parameters");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_transport_failure_has_no_code() {
        // nothing listens on port 1
        let err = comparator("http://127.0.0.1:1").compare_faces(&request()).await.unwrap_err();

        assert!(err.code.is_none());
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_smile_renders_value_and_confidence() {
        let rendered = smile(&Smile::builder().value(true).confidence(98.5).build());
        assert_eq!(rendered, json!({"Value": true, "Confidence": 98.5}));
    }

    #[test]
    fn test_number_keeps_short_decimal_form() {
        assert_eq!(number(99.2).to_string(), "99.2");
        assert_eq!(number(0.5), json!(0.5));
        assert_eq!(number(f32::NAN), Value::Null);
    }
}
