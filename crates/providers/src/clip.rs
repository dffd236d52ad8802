//! Client for multimodal (CLIP-style) embedding servers.
//!
//! Speaks the `/v1/embeddings` dialect where each input is an object carrying
//! either `text` or a base64 `image`, so text and image vectors come out of the
//! same model and share one coordinate space.

use crate::http::post_json;
use crate::openai::EmbeddingApiResponse;
use crate::{EmbedResponse, ImageEmbeddingProvider, ImageInput, ProviderError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ClipConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: usize,
}

#[derive(Clone)]
pub struct ClipProvider {
    client: Client,
    cfg: Arc<ClipConfig>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ClipInput {
    Text { text: String },
    Image { image: String },
}

#[derive(Serialize)]
struct ClipRequest<'a> {
    model: &'a str,
    input: Vec<ClipInput>,
}

impl ClipProvider {
    pub fn new(cfg: ClipConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            cfg: Arc::new(cfg),
        })
    }

    async fn request(&self, input: Vec<ClipInput>) -> Result<EmbedResponse, ProviderError> {
        if input.is_empty() {
            return Ok(EmbedResponse { vectors: vec![] });
        }
        let expected = input.len();
        let body = ClipRequest {
            model: &self.cfg.model,
            input,
        };
        let url = format!("{}/v1/embeddings", self.cfg.base_url.trim_end_matches('/'));
        let resp = post_json(
            &self.client,
            &url,
            &body,
            self.cfg.api_key.as_deref(),
            self.cfg.max_retries,
        )
        .await?;
        let parsed: EmbeddingApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(EmbedResponse {
            vectors: parsed.into_vectors(expected)?,
        })
    }
}

#[async_trait::async_trait]
impl ImageEmbeddingProvider for ClipProvider {
    async fn embed_images(&self, images: &[ImageInput]) -> Result<EmbedResponse, ProviderError> {
        let input = images
            .iter()
            .map(|img| ClipInput::Image {
                image: BASE64.encode(&img.bytes),
            })
            .collect();
        self.request(input).await
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        let input = texts
            .iter()
            .map(|t| ClipInput::Text { text: t.clone() })
            .collect();
        self.request(input).await
    }
}
