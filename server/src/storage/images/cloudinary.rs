//! Cloudinary backed image storage using signed upload and destroy calls.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use super::{ImageStore, ImageStoreError, ImageUpload};
use crate::config::CloudinaryConfig;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const SIGNATURE_ALGORITHM: &str = "sha256";

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

pub struct CloudinaryImageStore {
    client: Client,
    config: CloudinaryConfig,
    api_base: String,
}

impl CloudinaryImageStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, ImageStoreError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Points the client at a different API root, e.g. a local mock.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", self.api_base, self.config.cloud_name, action)
    }

    /// Signs `params` the way the upload API expects: sorted `key=value`
    /// pairs joined by `&`, followed by the API secret.
    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl ImageStore for CloudinaryImageStore {
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    async fn store(&self, upload: ImageUpload) -> Result<String, ImageStoreError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", self.config.folder.clone()),
            ("timestamp", timestamp.clone()),
        ]);

        let part = || Part::bytes(upload.bytes.to_vec()).file_name(upload.file_name.clone());
        // The host sniffs the format itself, so a malformed content type is dropped.
        let file = match upload.content_type.as_deref() {
            Some(content_type) => part().mime_str(content_type).unwrap_or_else(|_| part()),
            None => part(),
        };

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.config.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", SIGNATURE_ALGORITHM);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadResponse = ensure_success(response).await?.json().await?;
        debug!(url = %uploaded.secure_url, "Uploaded image to media host");
        Ok(uploaded.secure_url)
    }

    #[instrument(skip(self))]
    async fn delete(&self, reference: &str) -> Result<(), ImageStoreError> {
        let public_id = public_id_from_url(reference)
            .ok_or_else(|| ImageStoreError::InvalidReference(reference.to_string()))?;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id.clone()),
            ("timestamp", timestamp.clone()),
        ]);

        let params = [
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.config.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", SIGNATURE_ALGORITHM),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await?;

        let destroyed: DestroyResponse = ensure_success(response).await?.json().await?;
        match destroyed.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                debug!(%public_id, "Image already absent from media host");
                Ok(())
            }
            other => {
                warn!(%public_id, result = %other, "Unexpected destroy result");
                Err(ImageStoreError::Rejected {
                    status: 200,
                    message: other.to_string(),
                })
            }
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, ImageStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error.message)
        .unwrap_or(text);

    Err(ImageStoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Derives the media host's public id from a delivery URL:
/// `.../image/upload/[transformations/]v123/events/abc.jpg` gives
/// `events/abc`. Without a version segment, leading transformation
/// segments are skipped instead.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/upload/")?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let start = match segments.iter().position(|s| is_version_segment(s)) {
        Some(index) => index + 1,
        None => segments
            .iter()
            .take(segments.len().saturating_sub(1))
            .take_while(|s| is_transformation_segment(s))
            .count(),
    };
    let segments = &segments[start..];
    let (last, folders) = segments.split_last()?;

    let stem = match last.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => last,
    };

    let mut public_id = folders.join("/");
    if !public_id.is_empty() {
        public_id.push('/');
    }
    public_id.push_str(stem);
    Some(public_id)
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

/// `c_fill,w_200` style: every comma separated component is a short
/// lowercase parameter key, an underscore and a value.
fn is_transformation_segment(segment: &str) -> bool {
    segment.split(',').all(|component| match component.split_once('_') {
        Some((key, value)) => {
            (1..=3).contains(&key.len())
                && key.chars().all(|c| c.is_ascii_lowercase())
                && !value.is_empty()
        }
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "events".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_public_id_from_url() {
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/v1712345/events/abc123.jpg")
                .as_deref(),
            Some("events/abc123")
        );
        assert_eq!(
            public_id_from_url(
                "https://res.cloudinary.com/demo/image/upload/c_fill,w_200/v9/events/a.b.png?x=1"
            )
            .as_deref(),
            Some("events/a.b")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/sample.jpg").as_deref(),
            Some("sample")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/c_fill,w_200/events/a.png")
                .as_deref(),
            Some("events/a")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/w_100/q_auto/posters/b.jpg")
                .as_deref(),
            Some("posters/b")
        );
        assert_eq!(public_id_from_url("/uploads/1.png"), None);
        assert_eq!(public_id_from_url("https://res.cloudinary.com/demo/image/upload/"), None);
    }

    #[test]
    fn test_signature_ignores_parameter_order() {
        let store = CloudinaryImageStore::new(config()).unwrap();
        let a = store.sign(&[("timestamp", "1".into()), ("folder", "events".into())]);
        let b = store.sign(&[("folder", "events".into()), ("timestamp", "1".into())]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut hasher = Sha256::new();
        hasher.update(b"folder=events&timestamp=1secret");
        assert_eq!(a, hex::encode(hasher.finalize()));
    }

    #[tokio::test]
    async fn test_store_returns_secure_url() {
        let server = MockServer::start().await;
        let url = "https://res.cloudinary.com/demo/image/upload/v1/events/abc.png";
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .and(body_string_contains("name=\"signature_algorithm\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "events/abc",
                "secure_url": url,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = CloudinaryImageStore::new(config()).unwrap().with_api_base(server.uri());
        let reference = store
            .store(ImageUpload {
                file_name: "abc.png".to_string(),
                content_type: Some("image/png".to_string()),
                bytes: Bytes::from_static(b"png"),
            })
            .await
            .unwrap();

        assert_eq!(reference, url);
        assert_eq!(store.resolve(&reference, "http://localhost:3001"), url);
    }

    #[tokio::test]
    async fn test_store_surfaces_host_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Invalid Signature"}})),
            )
            .mount(&server)
            .await;

        let store = CloudinaryImageStore::new(config()).unwrap().with_api_base(server.uri());
        let err = store
            .store(ImageUpload {
                file_name: "abc.png".to_string(),
                content_type: None,
                bytes: Bytes::from_static(b"png"),
            })
            .await
            .unwrap_err();

        match err {
            ImageStoreError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid Signature");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_destroys_derived_public_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .and(body_string_contains("public_id=events%2Fabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = CloudinaryImageStore::new(config()).unwrap().with_api_base(server.uri());
        store
            .delete("https://res.cloudinary.com/demo/image/upload/v1/events/abc.png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_treats_not_found_as_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "not found"})))
            .mount(&server)
            .await;

        let store = CloudinaryImageStore::new(config()).unwrap().with_api_base(server.uri());
        store
            .delete("https://res.cloudinary.com/demo/image/upload/v1/events/gone.png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_slow_host_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"secure_url": "https://res.cloudinary.com/x.png"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let store = CloudinaryImageStore::new(CloudinaryConfig {
            timeout: Duration::from_millis(200),
            ..config()
        })
        .unwrap()
        .with_api_base(server.uri());
        let err = store
            .store(ImageUpload {
                file_name: "abc.png".to_string(),
                content_type: None,
                bytes: Bytes::from_static(b"png"),
            })
            .await
            .unwrap_err();

        match err {
            ImageStoreError::Http(e) => assert!(e.is_timeout(), "{:?}", e),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
