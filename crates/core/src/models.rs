use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata keys stamped on stored records.
pub mod keys {
    pub const SOURCE: &str = "source";
    pub const CATEGORY: &str = "category";
    pub const PAGE: &str = "page";
    pub const ORDINAL: &str = "ordinal";
    pub const INDEXED_AT: &str = "indexed_at";
    pub const FILE_PATH: &str = "file_path";
}

/// Ordered, distinct, non-empty candidate labels. Order is the tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    /// Trims each label and drops repeats, keeping the first occurrence.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() {
                return Err(Error::input("labels must not be blank"));
            }
            if !out.iter().any(|l| l == label) {
                out.push(label.to_string());
            }
        }
        if out.is_empty() {
            return Err(Error::input("label set must not be empty"));
        }
        Ok(Self(out))
    }

    /// Parses `"NLP, Computer Vision"`.
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(list.split(','))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

/// Enriched phrases used in place of bare labels when scoring. Label lookup
/// is case-insensitive; configuration sources lower-case their keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, String>")]
pub struct LabelDescriptors(HashMap<String, String>);

impl From<HashMap<String, String>> for LabelDescriptors {
    fn from(map: HashMap<String, String>) -> Self {
        Self::new(map)
    }
}

impl LabelDescriptors {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self(
            map.into_iter()
                .map(|(label, descriptor)| (descriptor_key(&label), descriptor))
                .collect(),
        )
    }

    pub fn insert(&mut self, label: &str, descriptor: impl Into<String>) {
        self.0.insert(descriptor_key(label), descriptor.into());
    }

    /// Descriptor for `label`, or the label itself when none is configured.
    pub fn enhance<'a>(&'a self, label: &'a str) -> &'a str {
        self.0
            .get(&descriptor_key(label))
            .map(String::as_str)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(label)
    }

    pub fn extend(&mut self, other: LabelDescriptors) {
        self.0.extend(other.0);
    }
}

fn descriptor_key(label: &str) -> String {
    label.trim().to_lowercase()
}

/// A fragment of a source document. Content is fixed once split; metadata is
/// stamped by the pipeline before indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub content: String,
    pub page: usize,
    pub ordinal: usize,
    pub metadata: HashMap<String, String>,
}

impl TextChunk {
    pub fn new(content: impl Into<String>, page: usize, ordinal: usize) -> Self {
        Self {
            content: content.into(),
            page,
            ordinal,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn category(&self) -> Option<&str> {
        self.metadata.get(keys::CATEGORY).map(String::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(keys::SOURCE).map(String::as_str)
    }
}

/// The two logical namespaces of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Text,
    Image,
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Collection::Text => f.write_str("text"),
            Collection::Image => f.write_str("image"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: String,
    pub payload: String,
    pub metadata: HashMap<String, String>,
    /// Cosine distance, `0.0` for identical direction.
    pub distance: f32,
}

impl QueryHit {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Hits ordered by ascending distance, ties in insertion order.
pub type QueryResult = Vec<QueryHit>;
