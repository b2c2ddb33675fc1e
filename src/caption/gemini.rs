// Captioning through the Google Gemini generateContent API.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, info};

use super::{CaptionError, Captioner};
use crate::config::CaptionConfig;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

const INSTRUCTION: &str = "Provide a title and description for this image. \
Answer with exactly two lines: \"**Title:** <title>\" and \"**Description:** <description>\".";

pub struct GeminiCaptioner {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiCaptioner {
    pub fn new(config: &CaptionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

fn request_payload(image: &[u8], mime_type: &str) -> serde_json::Value {
    let image_base64 = general_purpose::STANDARD.encode(image);
    serde_json::json!({
        "contents": [{
            "parts": [
                { "text": INSTRUCTION },
                {
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": image_base64
                    }
                }
            ]
        }]
    })
}

/// Concatenated text parts of the first candidate, if any.
fn response_text(result: &serde_json::Value) -> Option<String> {
    let parts = result["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.trim().is_empty()).then_some(text)
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl Captioner for GeminiCaptioner {
    async fn caption(&self, image: &[u8], mime_type: &str) -> Result<Option<String>, CaptionError> {
        let payload = request_payload(image, mime_type);

        info!("Sending {} byte image to {}", image.len(), self.model);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(%status, body = excerpt(&body), "Gemini response");

        if !status.is_success() {
            return Err(CaptionError::Status {
                status: status.as_u16(),
                body: excerpt(&body).to_string(),
            });
        }

        let result: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| CaptionError::InvalidResponse(e.to_string()))?;

        Ok(response_text(&result))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
