//! Google Cloud Vision provider
//!
//! Calls the `images:annotate` REST method with `TEXT_DETECTION` and returns
//! the full text annotation for the page.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::auth::{ServiceAccountKey, TokenSource, VISION_SCOPE};
use super::provider::OcrProvider;
use super::types::{OcrError, PageText};
use crate::raster::PageImage;

const ENGINE: &str = "Vision API";

/// Credentials for the Vision API
///
/// Built once at startup from the `GOOGLE_CREDENTIALS_JSON` secret and never
/// mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub enum VisionCredentials {
    /// Sent as the `key` query parameter
    ApiKey(String),
    /// Sent as a bearer token
    AccessToken(String),
    /// Exchanged for bearer tokens as needed
    ServiceAccount(ServiceAccountKey),
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("credential secret is empty")]
    Empty,

    #[error("credential JSON is malformed: {0}")]
    Malformed(String),

    #[error("service account key is unusable: {0}")]
    ServiceAccount(String),

    #[error("credential JSON is neither a service account key nor carries \"api_key\" or \"access_token\"")]
    NoUsableField,
}

#[derive(Deserialize)]
struct CredentialsJson {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, alias = "apiKey", alias = "key")]
    api_key: Option<String>,
    #[serde(default, alias = "accessToken", alias = "token")]
    access_token: Option<String>,
    #[serde(default)]
    client_email: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

impl VisionCredentials {
    /// Interpret the secret: a service account key file, a JSON object
    /// carrying `api_key` or `access_token`, or a bare API key.
    pub fn from_secret(secret: &str) -> Result<Self, CredentialsError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(CredentialsError::Empty);
        }
        if !secret.starts_with('{') {
            return Ok(Self::ApiKey(secret.to_string()));
        }

        let parsed: CredentialsJson =
            serde_json::from_str(secret).map_err(|e| CredentialsError::Malformed(e.to_string()))?;

        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        if let Some(token) = non_empty(parsed.access_token) {
            return Ok(Self::AccessToken(token));
        }
        if let Some(key) = non_empty(parsed.api_key) {
            return Ok(Self::ApiKey(key));
        }
        if parsed.kind.as_deref() != Some("service_account") {
            return Err(CredentialsError::NoUsableField);
        }

        let missing = |field: &str| CredentialsError::ServiceAccount(format!("\"{}\" is missing", field));
        let client_email = non_empty(parsed.client_email).ok_or_else(|| missing("client_email"))?;
        let private_key = non_empty(parsed.private_key).ok_or_else(|| missing("private_key"))?;
        let key = ServiceAccountKey::new(
            client_email,
            private_key,
            non_empty(parsed.private_key_id),
            non_empty(parsed.token_uri),
        )
        .map_err(|e| CredentialsError::ServiceAccount(e.to_string()))?;
        Ok(Self::ServiceAccount(key))
    }
}

// Never print the secret itself
impl fmt::Debug for VisionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Self::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
        }
    }
}

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: [Feature<'a>; 1],
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Status,
}

enum Auth {
    ApiKey(String),
    Bearer(String),
    ServiceAccount(TokenSource),
}

/// Google Cloud Vision OCR provider
pub struct GoogleVisionProvider {
    client: reqwest::Client,
    endpoint: String,
    auth: Auth,
}

impl GoogleVisionProvider {
    pub fn new(endpoint: &str, credentials: VisionCredentials, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let auth = match credentials {
            VisionCredentials::ApiKey(key) => Auth::ApiKey(key),
            VisionCredentials::AccessToken(token) => Auth::Bearer(token),
            VisionCredentials::ServiceAccount(key) => {
                Auth::ServiceAccount(TokenSource::new(client.clone(), key, VISION_SCOPE))
            }
        };
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn annotate_url(&self) -> String {
        format!("{}/v1/images:annotate", self.endpoint)
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, OcrError> {
        Ok(match &self.auth {
            Auth::ApiKey(key) => request.query(&[("key", key)]),
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::ServiceAccount(source) => {
                let token = source.token().await.map_err(|e| OcrError::Unavailable {
                    engine: ENGINE,
                    reason: format!("authentication failed: {}", e),
                })?;
                request.bearer_auth(token)
            }
        })
    }
}

#[async_trait]
impl OcrProvider for GoogleVisionProvider {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn recognize(&self, image: &PageImage, _scratch_dir: &Path) -> Result<PageText, OcrError> {
        let body = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageContent {
                    content: base64::engine::general_purpose::STANDARD.encode(&image.data),
                },
                features: [Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        };

        let response = self
            .authorize(self.client.post(self.annotate_url()))
            .await?
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Unavailable {
                engine: ENGINE,
                reason: e.to_string(),
            })?;

        let status = response.status();
        let payload = response.text().await.map_err(|e| OcrError::Unavailable {
            engine: ENGINE,
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorEnvelope>(&payload) {
                Ok(envelope) if !envelope.error.message.is_empty() => OcrError::EngineReported {
                    engine: ENGINE,
                    message: envelope.error.message,
                },
                _ => OcrError::Unavailable {
                    engine: ENGINE,
                    reason: format!("HTTP {}", status),
                },
            });
        }

        let parsed: AnnotateResponse = serde_json::from_str(&payload).map_err(|e| OcrError::InvalidResponse {
            engine: ENGINE,
            reason: e.to_string(),
        })?;
        let result = parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::InvalidResponse {
                engine: ENGINE,
                reason: "no annotation in response".to_string(),
            })?;

        if let Some(error) = result.error {
            if !error.message.is_empty() {
                return Err(OcrError::EngineReported {
                    engine: ENGINE,
                    message: error.message,
                });
            }
        }

        // Blank pages come back without an annotation
        let text = result.full_text_annotation.map(|a| a.text).unwrap_or_default();

        Ok(PageText {
            page: image.page,
            text,
        })
    }
}
