//! Bearer tokens for the GCS backend.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;

const METADATA_HOST: &str = "http://metadata.google.internal";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A bearer token valid for at least the next request.
    async fn token(&self) -> Result<String, StoreError>;

    /// Drop any cached token, e.g. after the backend answered 401.
    async fn invalidate(&self) {}
}

/// A fixed token. Once it expires every request fails with
/// [`StoreError::Unauthorized`].
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Service-account tokens from the GCE metadata server, cached until shortly
/// before they expire.
pub struct MetadataServerToken {
    client: reqwest::Client,
    host: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            host: METADATA_HOST.to_string(),
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self) -> Result<TokenResponse, StoreError> {
        let response = self
            .client
            .get(format!("{}{TOKEN_PATH}", self.host))
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(500).collect();
            return Err(StoreError::Unauthorized(format!(
                "metadata server returned {status}: {excerpt}"
            )));
        }
        Ok(response.json().await?)
    }
}

impl Default for MetadataServerToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    async fn token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        info!(expires_in = fresh.expires_in, "Fetched GCS access token");
        *cached = Some(CachedToken {
            token: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(fresh.access_token)
    }

    async fn invalidate(&self) {
        debug!("Discarding cached GCS access token");
        *self.cached.lock().await = None;
    }
}
