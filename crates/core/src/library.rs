//! The query surface used by the front ends.

use crate::classifier::{Classification, TopicClassifier};
use crate::config::AppConfig;
use crate::crossmodal::CrossModalQueryBuilder;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::models::{Collection, LabelSet, QueryResult, TextChunk};
use crate::pipeline::{build_registry, build_vector_store};
use crate::vectorstore::VectorStore;
use providers::ProviderRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Classifier, index and picture search wired from one configuration. Every
/// provider and store is built once here and shared by all calls.
pub struct Library {
    config: AppConfig,
    classifier: TopicClassifier,
    index: VectorIndex,
    crossmodal: Option<CrossModalQueryBuilder>,
}

impl Library {
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let registry = build_registry(&config)?;
        let store = build_vector_store(&config).await?;
        Self::new(config, store, &registry)
    }

    /// Uses the registry's preferred providers; picture search is available
    /// only when a preferred image provider is set.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn VectorStore>,
        registry: &ProviderRegistry,
    ) -> Result<Self> {
        let text = registry.embedding(None)?;
        let image = match registry.preferred_image {
            Some(_) => Some(registry.image(None)?),
            None => None,
        };

        let classifier = TopicClassifier::new(
            text.clone(),
            config.classification.load_descriptors()?,
            config.classification.focus.clone(),
        )?;
        let mut index = VectorIndex::new(store, text)
            .with_collections(&config.vectors.text_collection, &config.vectors.image_collection)
            .with_batch_size(config.embeddings.batch_size);
        let crossmodal = match image {
            Some(provider) => {
                index = index.with_images(provider.clone());
                Some(CrossModalQueryBuilder::new(
                    provider,
                    config.search.image_prefix.clone(),
                    config.search.image_template.clone(),
                ))
            }
            None => None,
        };
        info!(
            store = %config.vectors.provider,
            embeddings = %config.embeddings.provider,
            images = crossmodal.is_some(),
            "library ready"
        );
        Ok(Self {
            config,
            classifier,
            index,
            crossmodal,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn classify(&self, text: &str, labels: &LabelSet) -> Result<String> {
        self.classifier.classify(text, labels).await
    }

    pub async fn classify_scored(&self, text: &str, labels: &LabelSet) -> Result<Classification> {
        self.classifier.score(text, labels).await
    }

    pub async fn index_document(&self, chunks: &[TextChunk]) -> Result<usize> {
        self.index.index_document(chunks).await
    }

    /// Returns whether the image was stored; failures are logged.
    pub async fn index_image(&self, path: &Path) -> bool {
        match self.try_index_image(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to index image");
                false
            }
        }
    }

    pub async fn try_index_image(&self, path: &Path) -> Result<()> {
        self.index.index_image(path).await
    }

    /// Indexes every picture in `paths` and returns how many were stored.
    /// Without an image provider nothing is attempted.
    pub async fn index_images(&self, paths: &[PathBuf]) -> Result<usize> {
        self.index.image_provider()?;
        let mut indexed = 0;
        for path in paths {
            if self.index_image(path).await {
                indexed += 1;
            }
        }
        info!(found = paths.len(), indexed, "indexed images");
        Ok(indexed)
    }

    pub async fn search_text(&self, query: &str, k: usize) -> Result<QueryResult> {
        self.index.search_text(query, k).await
    }

    /// Pictures nearest to a text description.
    pub async fn search_image(&self, query: &str, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(Error::input("k must be at least 1"));
        }
        if self.index.count(Collection::Image).await? == 0 {
            return Ok(Vec::new());
        }
        let builder = self
            .crossmodal
            .as_ref()
            .ok_or_else(|| Error::Config("no image embedding provider configured".into()))?;
        let vector = builder.build(query).await?;
        self.index.query(Collection::Image, &vector, k).await
    }
}
