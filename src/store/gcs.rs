//! Google Cloud Storage bucket accessed through the JSON API.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{validate_key, ObjectStore, TokenSource};
use crate::error::StoreError;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

pub struct GcsStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ListItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

impl GcsStore {
    pub fn new(bucket: String, tokens: Arc<dyn TokenSource>) -> Self {
        info!("GCS store for bucket {bucket}");
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bucket,
            tokens,
        }
    }

    /// Point the store at a different API endpoint, e.g. an emulator.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, prefix: &[&str], segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| StoreError::Backend(format!("invalid endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Backend("endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(prefix)
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o"])
            .extend(segments);
        Ok(url)
    }

    fn upload_url(&self, key: &str) -> Result<Url, StoreError> {
        let mut url = self.url(&["upload"], &[])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }

    fn object_url(&self, key: &str) -> Result<Url, StoreError> {
        self.url(&[], &[key])
    }

    fn list_url(&self, page_token: Option<&str>) -> Result<Url, StoreError> {
        let mut url = self.url(&[], &[])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("fields", "items(name),nextPageToken");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    /// Authorize and send `request`. A 401 discards the cached token.
    async fn send(&self, request: RequestBuilder, key: &str) -> Result<reqwest::Response, StoreError> {
        let token = self.tokens.token().await?;
        let response = request.bearer_auth(token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(bucket = %self.bucket, "GCS rejected the access token");
            self.tokens.invalidate().await;
        }
        check(response, key).await
    }
}

async fn check(response: reqwest::Response, key: &str) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(key.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(500).collect();
    if status == StatusCode::UNAUTHORIZED {
        return Err(StoreError::Unauthorized(format!("GCS returned {status}: {excerpt}")));
    }
    Err(StoreError::Backend(format!("GCS error {status}: {excerpt}")))
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let len = data.len();
        let request = self
            .client
            .post(self.upload_url(key)?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        self.send(request, key).await?;
        debug!(key, bytes = len, bucket = %self.bucket, "gcs put");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        validate_key(key)?;
        let mut url = self.object_url(key)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let response = self.send(self.client.get(url), key).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let request = self.client.get(self.list_url(page_token.as_deref())?);
            let page: ListPage = self.send(request, &self.bucket).await?.json().await?;
            keys.extend(page.items.into_iter().map(|item| item.name));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let request = self.client.delete(self.object_url(key)?);
        match self.send(request, key).await {
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "gcs"
    }
}
