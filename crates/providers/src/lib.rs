//! Provider abstractions for text and image embeddings, plus the HTTP clients
//! that back them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod clip;
pub mod hashing;
mod http;
pub mod openai;
pub mod qdrant;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("unsupported input: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Transient failures worth another attempt: throttling, server errors and
    /// transport problems.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RequestFailed(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

/// Encoded image handed to an image embedding backend.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let resp = self.embed(&[text.to_string()]).await?;
        resp.vectors.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("provider returned no vector".to_string())
        })
    }
}

/// Encoders whose text and image outputs share one coordinate space (CLIP-like).
#[async_trait::async_trait]
pub trait ImageEmbeddingProvider: Send + Sync {
    async fn embed_images(&self, images: &[ImageInput]) -> Result<EmbedResponse, ProviderError>;

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    embeddings: HashMap<String, Arc<dyn EmbeddingProvider>>,
    images: HashMap<String, Arc<dyn ImageEmbeddingProvider>>,
    pub preferred_embedding: Option<String>,
    pub preferred_image: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(mut self, name: &str, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings.insert(name.to_string(), provider);
        self
    }

    pub fn with_image(mut self, name: &str, provider: Arc<dyn ImageEmbeddingProvider>) -> Self {
        self.images.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_embedding(mut self, name: &str) -> Self {
        self.preferred_embedding = Some(name.to_string());
        self
    }

    pub fn set_preferred_image(mut self, name: &str) -> Self {
        self.preferred_image = Some(name.to_string());
        self
    }

    pub fn embedding(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_embedding.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no embedding provider configured".into())
            })?;
        self.embeddings
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }

    pub fn image(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn ImageEmbeddingProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_image.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no image embedding provider configured".into())
            })?;
        self.images
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_falls_back_to_preferred() {
        let reg = ProviderRegistry::new()
            .with_embedding("hashing", Arc::new(hashing::HashingProvider::default()))
            .set_preferred_embedding("hashing");
        assert!(reg.embedding(None).is_ok());
        assert!(matches!(
            reg.embedding(Some("openai")),
            Err(ProviderError::UnknownProvider(name)) if name == "openai"
        ));
        assert!(reg.image(None).is_err());
    }

    #[test]
    fn retryable_statuses() {
        let throttled = ProviderError::Status { status: 429, body: String::new() };
        let bad_request = ProviderError::Status { status: 400, body: String::new() };
        assert!(throttled.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(ProviderError::RequestFailed("timeout".into()).is_retryable());
    }
}
