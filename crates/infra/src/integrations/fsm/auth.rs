//! OAuth client-credentials token management.
//!
//! A single cached credential guarded by a freshness check. Concurrent
//! callers racing past an expired token may each refresh; the grant is
//! idempotent so last-writer-wins is acceptable.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use fieldsync_domain::constants::TOKEN_EXPIRY_SKEW_SECS;
use fieldsync_domain::{FieldSyncError, Result};
use tokio::sync::Mutex;
use tracing::debug;

use super::client::AccessTokenProvider;
use super::types::TokenResponse;

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Fetches and caches OAuth access tokens via the client-credentials grant.
///
/// Tokens are cached until `now + ttl - 60s` so a token is never handed out
/// within a minute of its server-side expiry. No internal retry: an auth
/// failure surfaces immediately and the caller decides.
pub struct TokenManager {
    http: reqwest::Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        auth_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self { http, auth_url, client_id, client_secret, cached: Mutex::new(None) }
    }

    /// Return the cached token if unexpired, otherwise perform a
    /// client-credentials grant and cache the result.
    pub async fn authenticate(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.expires_at > Instant::now() {
                return Ok(entry.token.clone());
            }
            debug!("cached access token expired, refreshing");
        }

        let token = self.fetch_token().await?;
        let result = token.access_token.clone();

        let ttl = token.expires_in.saturating_sub(TOKEN_EXPIRY_SKEW_SECS);
        *cached = Some(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });

        Ok(result)
    }

    async fn fetch_token(&self) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.auth_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| FieldSyncError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FieldSyncError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| FieldSyncError::Auth(format!("malformed token response: {e}")))
    }
}

#[async_trait]
impl AccessTokenProvider for TokenManager {
    async fn access_token(&self) -> Result<String> {
        self.authenticate().await
    }
}
