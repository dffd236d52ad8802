use crate::error::{Error, Result};
use crate::vectorstore::l2_normalize;
use providers::{ImageEmbeddingProvider, ProviderError};
use std::sync::Arc;
use tracing::debug;

/// Turns a free-text picture query into a unit vector in the image space.
pub struct CrossModalQueryBuilder {
    provider: Arc<dyn ImageEmbeddingProvider>,
    prefix: String,
    template: String,
}

impl CrossModalQueryBuilder {
    pub fn new(
        provider: Arc<dyn ImageEmbeddingProvider>,
        prefix: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            prefix: prefix.into(),
            template: template.into(),
        }
    }

    /// `"dog"` becomes `"a photo of a dog"`; queries already phrased that way
    /// pass through unchanged.
    pub fn canonical_query(&self, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::input("image query must not be empty"));
        }
        let prefix = self.prefix.trim().to_lowercase();
        if !prefix.is_empty() && query.to_lowercase().starts_with(&prefix) {
            return Ok(query.to_string());
        }
        Ok(self.template.replace("{query}", query))
    }

    pub async fn build(&self, query: &str) -> Result<Vec<f32>> {
        let phrase = self.canonical_query(query)?;
        debug!(phrase = %phrase, "encoding image query");
        let resp = self.provider.embed_texts(&[phrase]).await?;
        let mut vector = resp.vectors.into_iter().next().ok_or_else(|| {
            Error::Model(ProviderError::InvalidResponse(
                "image provider returned no text vector".into(),
            ))
        })?;
        l2_normalize(&mut vector)?;
        Ok(vector)
    }
}
