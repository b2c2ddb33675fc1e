//! AI captioning: call a multimodal model, parse its answer into a title and
//! description, and keep the result as a sidecar record next to the image.

mod gemini;
mod parse;

pub use gemini::GeminiCaptioner;
pub use parse::{
    decode_record, encode_record, parse_caption_or_fallback, parse_caption_text, ParseError,
    DESCRIPTION_MARKER, TITLE_MARKER,
};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::store::{sidecar_key, ObjectStore, SIDECAR_CONTENT_TYPE};

/// External captioning API failures.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("caption request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("caption API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid caption response: {0}")]
    InvalidResponse(String),
}

/// A model that turns image bytes into free text.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Describe the image. `Ok(None)` means the model produced no text.
    async fn caption(&self, image: &[u8], mime_type: &str) -> Result<Option<String>, CaptionError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub title: String,
    pub description: String,
}

impl Caption {
    pub const FALLBACK_TITLE: &'static str = "Unknown Title";
    pub const FALLBACK_DESCRIPTION: &'static str = "No description available.";

    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Terminal state of the captioning step of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    Captioned(Caption),
    /// The model returned no text; nothing was stored.
    Skipped,
    /// Invoking the model or storing the record failed.
    Failed(String),
}

#[derive(Clone)]
pub struct CaptionPipeline {
    captioner: Arc<dyn Captioner>,
    store: Arc<dyn ObjectStore>,
}

impl CaptionPipeline {
    pub fn new(captioner: Arc<dyn Captioner>, store: Arc<dyn ObjectStore>) -> Self {
        Self { captioner, store }
    }

    pub fn model_name(&self) -> &str {
        self.captioner.model_name()
    }

    /// Caption the image stored under `key` and persist the record.
    pub async fn run(&self, key: &str, image: &[u8], mime_type: &str) -> CaptionOutcome {
        let caption = match self.generate(image, mime_type).await {
            Ok(Some(caption)) => caption,
            Ok(None) => {
                warn!(key, "Captioner returned no text, skipping caption");
                return CaptionOutcome::Skipped;
            }
            Err(e) => {
                error!(key, error = %e, "Caption request failed");
                return CaptionOutcome::Failed(e.to_string());
            }
        };

        if let Err(e) = self.persist(key, &caption).await {
            error!(key, error = %e, "Failed to store caption record");
            return CaptionOutcome::Failed(e.to_string());
        }

        info!(key, title = %caption.title, "Captioned");
        CaptionOutcome::Captioned(caption)
    }

    /// Invoke the model and parse its answer.
    pub async fn generate(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Option<Caption>, CaptionError> {
        let Some(text) = self.captioner.caption(image, mime_type).await? else {
            return Ok(None);
        };
        let caption = parse_caption_text(&text).unwrap_or_else(|e| {
            warn!("{e}; using fallback values");
            e.into_fallback()
        });
        Ok(Some(caption))
    }

    /// Write the sidecar record for the image `key`, replacing any previous one.
    pub async fn persist(&self, key: &str, caption: &Caption) -> Result<(), StoreError> {
        self.store
            .put(
                &sidecar_key(key),
                encode_record(caption).into_bytes(),
                SIDECAR_CONTENT_TYPE,
            )
            .await
    }
}

/// Read the caption record of the image `key`, if one exists.
pub async fn load_caption(store: &dyn ObjectStore, key: &str) -> Result<Option<Caption>, StoreError> {
    let record_key = sidecar_key(key);
    let bytes = match store.get(&record_key).await {
        Ok(bytes) => bytes,
        Err(StoreError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let text = String::from_utf8_lossy(&bytes);
    let caption = decode_record(&text).unwrap_or_else(|e| {
        warn!(key = %record_key, "Malformed caption record: {e}");
        e.into_fallback()
    });
    Ok(Some(caption))
}
