use crate::http::post_json;
use crate::{EmbedResponse, EmbeddingProvider, ProviderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Settings for any OpenAI-compatible `/v1/embeddings` endpoint (OpenAI,
/// LM Studio, Ollama, vLLM).
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub timeout: Duration,
    pub max_retries: usize,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiProvider {
    pub fn new(cfg: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            cfg: Arc::new(cfg),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
pub(crate) struct EmbeddingApiResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
pub(crate) struct EmbeddingData {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

impl EmbeddingApiResponse {
    /// Orders vectors by their `index` and checks one came back per input.
    pub(crate) fn into_vectors(mut self, expected: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.data.sort_by_key(|d| d.index);
        if self.data.len() != expected {
            return Err(ProviderError::InvalidResponse(format!(
                "{} embeddings returned for {} inputs",
                self.data.len(),
                expected
            )));
        }
        Ok(self.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        if texts.is_empty() {
            return Ok(EmbedResponse { vectors: vec![] });
        }
        let body = EmbedRequest {
            model: &self.cfg.embedding_model,
            input: texts,
        };

        let resp = post_json(
            &self.client,
            &self.endpoint(),
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
            vectors: parsed.into_vectors(texts.len())?,
        })
    }
}
