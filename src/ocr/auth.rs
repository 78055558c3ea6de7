//! Service account authentication for Google APIs
//!
//! Signs a short-lived JWT with the account's private key and exchanges it for
//! an OAuth access token at the key's `token_uri`. Tokens are cached and
//! refreshed shortly before they expire.

use std::fmt;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Scope granting access to the Vision API
pub const VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
/// Cached tokens this close to expiry are refreshed
const REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("token endpoint unreachable: {0}")]
    Request(#[from] reqwest::Error),

    #[error("token request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected token response: {0}")]
    InvalidResponse(String),
}

/// A parsed service account key
#[derive(Clone)]
pub struct ServiceAccountKey {
    client_email: String,
    private_key_id: Option<String>,
    token_uri: String,
    private_key: String,
    encoding_key: EncodingKey,
}

impl ServiceAccountKey {
    /// Fails when `private_key` is not an RSA key in PEM form.
    pub fn new(
        client_email: String,
        private_key: String,
        private_key_id: Option<String>,
        token_uri: Option<String>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key.as_bytes())?;
        Ok(Self {
            client_email,
            private_key_id,
            token_uri: token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            private_key,
            encoding_key,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    fn assertion(&self, scope: &str, now: u64) -> Result<String, jsonwebtoken::errors::Error> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = Claims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
    }
}

impl PartialEq for ServiceAccountKey {
    fn eq(&self, other: &Self) -> bool {
        self.client_email == other.client_email
            && self.private_key_id == other.private_key_id
            && self.token_uri == other.token_uri
            && self.private_key == other.private_key
    }
}

impl Eq for ServiceAccountKey {}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: u64,
}

/// Hands out access tokens for one service account and scope
pub struct TokenSource {
    client: reqwest::Client,
    key: ServiceAccountKey,
    scope: &'static str,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(client: reqwest::Client, key: ServiceAccountKey, scope: &'static str) -> Self {
        Self {
            client,
            key,
            scope,
            cached: Mutex::new(None),
        }
    }

    /// Current access token, exchanging a fresh assertion when the cached one
    /// is missing or about to expire.
    pub async fn token(&self) -> Result<String, AuthError> {
        // Held across the exchange so concurrent pages share one request
        let mut cached = self.cached.lock().await;
        let now = jsonwebtoken::get_current_timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at > now + REFRESH_MARGIN_SECS {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.exchange(now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self, now: u64) -> Result<CachedToken, AuthError> {
        tracing::debug!("Requesting access token for {}", self.key.client_email);
        let assertion = self.key.assertion(self.scope, now)?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let payload = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<TokenErrorResponse>(&payload) {
                Ok(body) => body.error_description.filter(|d| !d.is_empty()).unwrap_or(body.error),
                Err(_) => String::new(),
            };
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: if message.is_empty() {
                    status.to_string()
                } else {
                    message
                },
            });
        }

        let body: TokenResponse =
            serde_json::from_str(&payload).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        Ok(CachedToken {
            value: body.access_token,
            expires_at: now + body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS),
        })
    }
}
