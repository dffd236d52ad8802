use crate::archiver::Archiver;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::extractor::DocumentLoader;
use crate::library::Library;
use crate::models::{keys, LabelSet};
use crate::vectorstore::{self, VectorStore};
use providers::clip::{ClipConfig, ClipProvider};
use providers::hashing::HashingProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::qdrant::{QdrantClient, QdrantConfig};
use providers::{ProviderError, ProviderRegistry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A document that went all the way through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedItem {
    pub source: PathBuf,
    pub archived_to: PathBuf,
    pub category: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Indexed(IndexedItem),
    Failed {
        path: PathBuf,
        kind: &'static str,
        error: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Indexed(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }
}

/// Load, classify, archive and index documents one after another. A failing
/// item is recorded and the batch moves on; earlier items are not rolled back.
pub struct BatchOrchestrator<'a> {
    library: &'a Library,
    loader: Arc<dyn DocumentLoader>,
    archiver: Arc<dyn Archiver>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        library: &'a Library,
        loader: Arc<dyn DocumentLoader>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            library,
            loader,
            archiver,
        }
    }

    pub async fn process_one(&self, path: &Path, labels: &LabelSet) -> Result<IndexedItem> {
        info!(path = %path.display(), "processing document");
        let document = self.loader.load(path).await?;
        let category = self.library.classify(document.first_page(), labels).await?;
        let archived_to = self.archiver.archive(path, &category).await?;

        let source = archived_to.to_string_lossy().into_owned();
        let chunks: Vec<_> = document
            .chunks
            .into_iter()
            .map(|c| {
                c.with_metadata(keys::SOURCE, source.clone())
                    .with_metadata(keys::CATEGORY, category.clone())
            })
            .collect();
        let stored = self.library.index_document(&chunks).await?;

        Ok(IndexedItem {
            source: path.to_path_buf(),
            archived_to,
            category,
            chunks: stored,
        })
    }

    pub async fn run(&self, paths: &[PathBuf], labels: &LabelSet) -> BatchReport {
        let mut report = BatchReport::default();
        for path in paths {
            let outcome = match self.process_one(path, labels).await {
                Ok(item) => ItemOutcome::Indexed(item),
                Err(e) => {
                    warn!(path = %path.display(), kind = e.kind(), error = %e, "document failed");
                    ItemOutcome::Failed {
                        path: path.clone(),
                        kind: e.kind(),
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }
        info!(
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            "batch complete"
        );
        report
    }
}

/// Registers the configured providers. `hashing` is always available; HTTP
/// providers read their keys from the environment.
pub fn build_registry(config: &AppConfig) -> Result<ProviderRegistry> {
    let emb = &config.embeddings;
    let mut reg = ProviderRegistry::new().with_embedding(
        "hashing",
        Arc::new(HashingProvider::new(emb.dimensions)),
    );

    if emb.provider == "openai" {
        let base_url = emb
            .base_url
            .clone()
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url,
            embedding_model: emb.model.clone(),
            timeout: Duration::from_secs(emb.timeout_secs),
            max_retries: emb.max_retries,
        })?;
        reg = reg.with_embedding("openai", Arc::new(provider));
    }

    let img = &config.images;
    if let Some(name) = img.provider.as_deref() {
        if name != "clip" {
            return Err(Error::Model(ProviderError::UnknownProvider(name.to_string())));
        }
        let base_url = img
            .base_url
            .clone()
            .or_else(|| std::env::var("CLIP_BASE_URL").ok())
            .unwrap_or_else(|| "https://api.jina.ai".to_string());
        let provider = ClipProvider::new(ClipConfig {
            api_key: std::env::var("CLIP_API_KEY").ok(),
            base_url,
            model: img.model.clone(),
            timeout: Duration::from_secs(img.timeout_secs),
            max_retries: img.max_retries,
        })?;
        reg = reg
            .with_image("clip", Arc::new(provider))
            .set_preferred_image("clip");
    }

    Ok(reg.set_preferred_embedding(&emb.provider))
}

pub async fn build_vector_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>> {
    match config.vectors.provider.as_str() {
        "sqlite" => {
            let store = vectorstore::SqliteVectorStore::connect(&config.database.path).await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(vectorstore::InMemoryVectorStore::new())),
        "qdrant" => {
            let url = config
                .vectors
                .url
                .clone()
                .ok_or_else(|| Error::Config("vectors.url is required for qdrant".into()))?;
            let client = QdrantClient::new(QdrantConfig {
                url,
                api_key: std::env::var("QDRANT_API_KEY").ok(),
            });
            Ok(Arc::new(vectorstore::QdrantStore::new(client)))
        }
        other => Err(Error::Config(format!("unknown vector store: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_prefers_hashing() {
        let reg = build_registry(&AppConfig::default()).unwrap();
        assert!(reg.embedding(None).is_ok());
        assert!(reg.preferred_image.is_none());
    }

    #[test]
    fn unknown_embedding_provider_surfaces_on_lookup() {
        let mut cfg = AppConfig::default();
        cfg.embeddings.provider = "word2vec".into();
        let reg = build_registry(&cfg).unwrap();
        assert!(reg.embedding(None).is_err());
    }

    #[tokio::test]
    async fn store_selection() {
        let mut cfg = AppConfig::default();
        cfg.vectors.provider = "memory".into();
        assert!(build_vector_store(&cfg).await.is_ok());
        cfg.vectors.provider = "qdrant".into();
        assert!(matches!(build_vector_store(&cfg).await, Err(Error::Config(_))));
        cfg.vectors.provider = "faiss".into();
        assert!(matches!(build_vector_store(&cfg).await, Err(Error::Config(_))));
    }

    #[test]
    fn report_counts() {
        let report = BatchReport {
            outcomes: vec![
                ItemOutcome::Failed {
                    path: PathBuf::from("a.pdf"),
                    kind: "model",
                    error: "down".into(),
                },
                ItemOutcome::Indexed(IndexedItem {
                    source: PathBuf::from("b.pdf"),
                    archived_to: PathBuf::from("documents/NLP/b.pdf"),
                    category: "NLP".into(),
                    chunks: 3,
                }),
            ],
        };
        assert_eq!((report.attempted(), report.succeeded(), report.failed()), (2, 1, 1));
    }
}
