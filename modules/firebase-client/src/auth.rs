// OAuth2 access tokens for Google APIs, cached until shortly before expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::credentials::{AuthorizedUser, Credentials, ServiceAccountKey, GOOGLE_TOKEN_URI};
use crate::error::{FirebaseError, Result};

/// Covers both Firestore and Cloud Storage.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Hands out bearer tokens for one set of credentials.
pub struct TokenSource {
    http: reqwest::Client,
    credentials: Credentials,
    token_uri_override: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            token_uri_override: None,
            cached: Mutex::new(None),
        }
    }

    /// Send refresh-token exchanges somewhere other than Google's token endpoint.
    pub fn with_token_uri(mut self, token_uri: &str) -> Self {
        self.token_uri_override = Some(token_uri.to_string());
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn access_token(&self) -> Result<String> {
        if let Credentials::StaticToken(token) = &self.credentials {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let response = match &self.credentials {
            Credentials::ServiceAccount(key) => self.exchange_assertion(key).await?,
            Credentials::AuthorizedUser(user) => self.exchange_refresh_token(user).await?,
            Credentials::StaticToken(token) => return Ok(token.clone()),
        };

        let expires_in = response.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        tracing::debug!(
            kind = self.credentials.kind(),
            expires_in,
            "Obtained Google access token"
        );
        let value = response.access_token.clone();
        *cached = Some(CachedToken {
            value: response.access_token,
            expires_at: now + Duration::seconds(expires_in),
        });
        Ok(value)
    }

    async fn exchange_assertion(&self, key: &ServiceAccountKey) -> Result<TokenResponse> {
        let token_uri = self.token_uri_override.as_deref().unwrap_or(&key.token_uri);
        let assertion = sign_assertion(key, token_uri, Utc::now())?;
        let resp = self
            .http
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        read_token_response(resp).await
    }

    async fn exchange_refresh_token(&self, user: &AuthorizedUser) -> Result<TokenResponse> {
        let token_uri = self.token_uri_override.as_deref().unwrap_or(GOOGLE_TOKEN_URI);
        let resp = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", user.client_id.as_str()),
                ("client_secret", user.client_secret.as_str()),
                ("refresh_token", user.refresh_token.as_str()),
            ])
            .send()
            .await?;
        read_token_response(resp).await
    }
}

async fn read_token_response(resp: reqwest::Response) -> Result<TokenResponse> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FirebaseError::Token(format!("status {}: {body}", status.as_u16())));
    }
    Ok(resp.json().await?)
}

/// Build the RS256-signed JWT a service account trades for an access token.
pub fn sign_assertion(
    key: &ServiceAccountKey,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        scope: CLOUD_PLATFORM_SCOPE.to_string(),
        aud: audience.to_string(),
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| FirebaseError::Credentials(format!("invalid private key: {e}")))?;

    encode(&header, &claims, &encoding_key).map_err(|e| FirebaseError::Token(e.to_string()))
}
