//! Bearer-token acquisition for the loading API.
//!
//! Tokens are short-lived and fetched fresh for every call; there is no
//! cache. The token endpoint takes the four credential components both as
//! query parameters and as a Basic credential built from
//! `user:pass:client_id:client_secret`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::OdsConfig;
use crate::error::OdsError;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Fetches a fresh bearer token per call.
#[derive(Clone)]
pub struct TokenProvider {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    client_id: String,
    client_secret: String,
}

impl TokenProvider {
    pub fn new(http: Client, config: &OdsConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// The Basic credential: base64 of `user:pass:client_id:client_secret`.
    pub fn basic_credential(&self) -> String {
        let joined = format!(
            "{}:{}:{}:{}",
            self.username, self.password, self.client_id, self.client_secret
        );
        BASE64.encode(joined.as_bytes())
    }

    /// The token request. Credentials go through `.query` so reserved
    /// characters in a password survive as percent-encoded.
    fn token_request(&self) -> Result<reqwest::Request, OdsError> {
        self.http
            .get(format!("{}api/auth/token", self.base_url))
            .query(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .header("Authorization", format!("Basic {}", self.basic_credential()))
            .build()
            .map_err(|e| OdsError::AuthFailed(describe_request_error(&e)))
    }

    /// Exchange the credential for a bearer token.
    ///
    /// Failure here is fatal for whatever higher-level call triggered it.
    pub async fn fetch(&self) -> Result<String, OdsError> {
        let request = self.token_request()?;
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| OdsError::AuthFailed(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(OdsError::AuthFailed(format!(
                "token endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| OdsError::AuthFailed(format!("malformed token response: {}", e)))?;

        debug!("Acquired loading-API token");
        Ok(body.token)
    }
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish()
    }
}

/// Human-readable classification of a reqwest failure.
pub(crate) fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_connect() {
        format!("connection failed - loading API may be down: {}", e)
    } else if e.is_timeout() {
        format!("request timed out: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}
