//! Key-addressed byte storage for images and their sidecar records.

mod credentials;
mod gcs;
mod local;
mod memory;

pub use credentials::{MetadataServerToken, StaticToken, TokenSource};
pub use gcs::GcsStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{GcsCredentials, StorageConfig};
use crate::error::StoreError;

pub const SIDECAR_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Flat object store. Keys are plain filenames.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    /// Fetch the object stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// All keys in the store, sorted.
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Human readable backend name for logs.
    fn name(&self) -> &str;
}

/// Build the store selected by configuration.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let store: Arc<dyn ObjectStore> = match config {
        StorageConfig::Local { root } => Arc::new(LocalStore::open(root).await?),
        StorageConfig::Memory => Arc::new(MemoryStore::new()),
        StorageConfig::Gcs {
            bucket,
            credentials,
        } => {
            let tokens: Arc<dyn TokenSource> = match credentials {
                GcsCredentials::Static(token) => Arc::new(StaticToken::new(token.clone())),
                GcsCredentials::MetadataServer => Arc::new(MetadataServerToken::new()),
            };
            Arc::new(GcsStore::new(bucket.clone(), tokens))
        }
    };
    Ok(store)
}

/// Whether `key` names a gallery image (`.jpg` / `.jpeg`, any case).
pub fn is_image_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

/// Key of the caption record belonging to the image `key`.
pub fn sidecar_key(key: &str) -> String {
    let stem = match key.rfind('.') {
        Some(idx) if idx > 0 => &key[..idx],
        _ => key,
    };
    format!("{stem}.txt")
}

/// Content type implied by a key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => SIDECAR_CONTENT_TYPE,
        _ => "application/octet-stream",
    }
}

/// Reject keys that could escape a flat namespace.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty()
        || key.starts_with('.')
        || key.contains(&['/', '\\', '\0'][..])
        || key.contains("..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
