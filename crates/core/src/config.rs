use crate::error::{Error, Result};
use crate::models::LabelDescriptors;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub embeddings: EmbeddingConfig,
    pub images: ImageEmbeddingConfig,
    pub vectors: VectorConfig,
    pub classification: ClassificationConfig,
    pub chunking: ChunkingConfig,
    pub archive: ArchiveConfig,
    pub scan: ScanConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "db/shelf.db".to_string(),
        }
    }
}

/// Text embedding backend. `provider` is `hashing` (offline) or `openai`
/// (any OpenAI-compatible server, key from `OPENAI_API_KEY`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub batch_size: usize,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            base_url: None,
            batch_size: 64,
            dimensions: 512,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

/// Shared text/image space used for picture search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageEmbeddingConfig {
    pub provider: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for ImageEmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: "jina-clip-v1".to_string(),
            base_url: None,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

/// Vector store backend: `sqlite` (default, uses `database.path`), `memory`
/// or `qdrant` (needs `url`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub provider: String,
    pub url: Option<String>,
    pub text_collection: String,
    pub image_collection: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            url: None,
            text_collection: "text".to_string(),
            image_collection: "image".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub focus: FocusConfig,
    pub descriptors: LabelDescriptors,
    /// Extra TOML table of `label = "descriptor"` pairs merged over `descriptors`.
    pub descriptors_path: Option<String>,
}

impl ClassificationConfig {
    /// Inline descriptors plus the ones from `descriptors_path`, file entries
    /// winning.
    pub fn load_descriptors(&self) -> Result<LabelDescriptors> {
        let mut descriptors = self.descriptors.clone();
        if let Some(path) = &self.descriptors_path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("reading {}: {}", path, e)))?;
            let table: HashMap<String, String> = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("parsing {}: {}", path, e)))?;
            descriptors.extend(LabelDescriptors::new(table));
        }
        Ok(descriptors)
    }
}

/// Which slice of a document the classifier looks at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub anchor: String,
    pub anchor_window: usize,
    pub fallback_offset: usize,
    pub fallback_window: usize,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            anchor: "abstract".to_string(),
            anchor_window: 1200,
            fallback_offset: 200,
            fallback_window: 1300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub root: String,
    pub copy_then_delete: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: "documents".to_string(),
            copy_then_delete: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub document_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            document_extensions: vec!["pdf".into(), "txt".into(), "md".into()],
            image_extensions: vec!["jpg".into(), "jpeg".into(), "png".into(), "bmp".into()],
            exclude: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub text_k: usize,
    pub index_only_k: usize,
    pub image_k: usize,
    /// Queries already starting with this (case-insensitive) are left alone.
    pub image_prefix: String,
    /// `{query}` is replaced with the user's query.
    pub image_template: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            text_k: 3,
            index_only_k: 10,
            image_k: 3,
            image_prefix: "a photo of".to_string(),
            image_template: "a photo of a {query}".to_string(),
        }
    }
}

/// Loads `path` (or the optional `config/default`), then `SHELF_*` environment
/// overrides such as `SHELF_VECTORS__PROVIDER=memory`.
pub fn load(path: Option<&str>) -> Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("SHELF")
            .prefix_separator("_")
            .separator("__"),
    );
    let cfg = settings.build()?;
    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 || self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than a non-zero chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be at least 1".into()));
        }
        if self.vectors.text_collection == self.vectors.image_collection {
            return Err(Error::Config(
                "text and image collections must have different names".into(),
            ));
        }
        if !self.search.image_template.contains("{query}") {
            return Err(Error::Config(
                "search.image_template must contain {query}".into(),
            ));
        }
        Ok(())
    }
}
