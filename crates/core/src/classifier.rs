//! Embedding-similarity topic classifier.
//!
//! The document is cut down to its most informative window (the abstract when
//! there is one), each candidate label is swapped for its descriptor phrase,
//! and the label whose embedding is closest to the text wins.

use crate::config::FocusConfig;
use crate::error::{Error, Result};
use crate::models::{LabelDescriptors, LabelSet};
use crate::vectorstore::cosine_distance;
use providers::{EmbeddingProvider, ProviderError};
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Selects and cleans the part of a document worth embedding.
#[derive(Debug, Clone)]
pub struct FocusExtractor {
    cfg: FocusConfig,
    anchor: String,
    email: Regex,
    url: Regex,
    whitespace: Regex,
}

impl FocusExtractor {
    pub fn new(cfg: FocusConfig) -> Result<Self> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Config(format!("pattern {}: {}", pattern, e)))
        };
        Ok(Self {
            anchor: cfg.anchor.trim().to_lowercase(),
            email: build(r"\S+@\S+")?,
            url: build(r"http\S+")?,
            whitespace: build(r"\s+")?,
            cfg,
        })
    }

    /// Lower-cased window starting at the anchor, or after the header offset
    /// when there is no anchor, with emails and links removed.
    pub fn extract(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let anchored = if self.anchor.is_empty() {
            None
        } else {
            lowered.find(&self.anchor)
        };
        let (start, window) = match anchored {
            Some(pos) => (pos, self.cfg.anchor_window),
            None => {
                let start = lowered
                    .char_indices()
                    .nth(self.cfg.fallback_offset)
                    .map(|(b, _)| b)
                    .unwrap_or(0);
                (start, self.cfg.fallback_window)
            }
        };
        let window: String = lowered[start..].chars().take(window).collect();
        let window = self.email.replace_all(&window, "");
        let window = self.url.replace_all(&window, "");
        self.whitespace.replace_all(&window, " ").trim().to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub label: String,
    /// Cosine similarity per label, in label-set order.
    pub scores: Vec<LabelScore>,
}

pub struct TopicClassifier {
    provider: Arc<dyn EmbeddingProvider>,
    descriptors: LabelDescriptors,
    focus: FocusExtractor,
}

impl TopicClassifier {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        descriptors: LabelDescriptors,
        focus: FocusConfig,
    ) -> Result<Self> {
        Ok(Self {
            provider,
            descriptors,
            focus: FocusExtractor::new(focus)?,
        })
    }

    pub async fn classify(&self, text: &str, labels: &LabelSet) -> Result<String> {
        Ok(self.score(text, labels).await?.label)
    }

    /// Scores every label against `text`. Ties and all-equal scores resolve to
    /// the earliest label.
    pub async fn score(&self, text: &str, labels: &LabelSet) -> Result<Classification> {
        let focused = self.focus.extract(text);
        let scores = if focused.is_empty() {
            debug!("no usable text after focus extraction; scores are uniform");
            vec![0.0; labels.len()]
        } else {
            self.similarities(focused, labels).await?
        };

        for (label, score) in labels.iter().zip(&scores) {
            debug!(label = %label, score = format!("{:.4}", score), "label score");
        }
        let best = first_argmax(&scores);
        let label = labels.as_slice()[best].clone();
        info!(label = %label, "classified document");

        Ok(Classification {
            label,
            scores: labels
                .iter()
                .zip(scores)
                .map(|(label, score)| LabelScore {
                    label: label.clone(),
                    score,
                })
                .collect(),
        })
    }

    async fn similarities(&self, focused: String, labels: &LabelSet) -> Result<Vec<f32>> {
        let mut inputs = Vec::with_capacity(labels.len() + 1);
        inputs.push(focused);
        inputs.extend(labels.iter().map(|l| self.descriptors.enhance(l).to_string()));

        let resp = self.provider.embed(&inputs).await?;
        if resp.vectors.len() != inputs.len() {
            return Err(Error::Model(ProviderError::InvalidResponse(format!(
                "{} vectors returned for {} inputs",
                resp.vectors.len(),
                inputs.len()
            ))));
        }
        let (text_vector, label_vectors) = resp
            .vectors
            .split_first()
            .ok_or_else(|| Error::Model(ProviderError::InvalidResponse("no vectors".into())))?;
        label_vectors
            .iter()
            .map(|v| {
                if v.len() != text_vector.len() {
                    return Err(Error::Model(ProviderError::InvalidResponse(format!(
                        "label vector has {} dimensions, text vector {}",
                        v.len(),
                        text_vector.len()
                    ))));
                }
                Ok(1.0 - cosine_distance(text_vector, v))
            })
            .collect()
    }
}

/// Index of the first maximum; NaN never wins.
fn first_argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, &score) in scores.iter().enumerate() {
        let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::hashing::HashingProvider;
    use providers::EmbedResponse;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed vector per exact input, `fallback` otherwise.
    struct StubProvider {
        vectors: HashMap<String, Vec<f32>>,
        fallback: Vec<f32>,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(pairs: &[(&str, Vec<f32>)], fallback: Vec<f32>) -> Self {
            Self {
                vectors: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for StubProvider {
        async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbedResponse {
                vectors: texts
                    .iter()
                    .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| self.fallback.clone()))
                    .collect(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            Err(ProviderError::RequestFailed("backend down".into()))
        }
    }

    fn extractor() -> FocusExtractor {
        FocusExtractor::new(FocusConfig::default()).unwrap()
    }

    fn paper_descriptors() -> LabelDescriptors {
        let mut d = LabelDescriptors::default();
        d.insert(
            "NLP",
            "natural language processing, NLP, text sequences, translation, vocabulary, \
             linguistics, transformer, bert, word embedding, language model, llm",
        );
        d.insert(
            "Computer Vision",
            "Computer Vision, CV, image recognition, object detection, pixel, \
             convolutional neural networks, CNN, ResNet, vision, video",
        );
        d
    }

    #[test]
    fn focus_starts_at_abstract() {
        let text = format!("Title\nAuthors\n{}ABSTRACT We propose X.", "x".repeat(50));
        assert_eq!(extractor().extract(&text), "abstract we propose x.");
    }

    #[test]
    fn focus_window_is_bounded() {
        let text = format!("Abstract {}", "a".repeat(5000));
        assert_eq!(extractor().extract(&text).chars().count(), 1200);
    }

    #[test]
    fn focus_skips_header_without_anchor() {
        let text = format!("{}{}", "h".repeat(200), "body text");
        assert_eq!(extractor().extract(&text), "body text");
        assert_eq!(extractor().extract("short note"), "short note");
    }

    #[test]
    fn focus_counts_characters_not_bytes() {
        let text = format!("{}résumé", "é".repeat(200));
        assert_eq!(extractor().extract(&text), "résumé");
    }

    #[test]
    fn focus_strips_emails_and_links() {
        let text = "abstract contact jane@uni.edu or see https://example.org/paper now";
        assert_eq!(extractor().extract(text), "abstract contact or see now");
    }

    #[tokio::test]
    async fn picks_closest_label() {
        let provider = StubProvider::new(
            &[
                ("abstract about parsing", vec![1.0, 0.0]),
                ("Vision", vec![0.0, 1.0]),
                ("Language", vec![0.9, 0.1]),
            ],
            vec![0.5, 0.5],
        );
        let clf = TopicClassifier::new(Arc::new(provider), LabelDescriptors::default(), FocusConfig::default()).unwrap();
        let labels = LabelSet::parse("Vision,Language").unwrap();
        assert_eq!(clf.classify("Abstract about parsing", &labels).await.unwrap(), "Language");
    }

    #[tokio::test]
    async fn ties_go_to_first_label() {
        let provider = StubProvider::new(&[], vec![1.0, 0.0]);
        let clf = TopicClassifier::new(Arc::new(provider), LabelDescriptors::default(), FocusConfig::default()).unwrap();
        let labels = LabelSet::parse("B,A,C").unwrap();
        assert_eq!(clf.classify("abstract anything", &labels).await.unwrap(), "B");
    }

    #[tokio::test]
    async fn empty_text_returns_first_label_without_embedding() {
        let provider = Arc::new(StubProvider::new(&[], vec![1.0]));
        let clf = TopicClassifier::new(provider.clone(), LabelDescriptors::default(), FocusConfig::default()).unwrap();
        let labels = LabelSet::parse("NLP,Computer Vision").unwrap();
        assert_eq!(clf.classify("", &labels).await.unwrap(), "NLP");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn descriptors_replace_bare_labels() {
        let provider = StubProvider::new(
            &[
                ("abstract graphs", vec![1.0, 0.0]),
                ("graph neural networks", vec![1.0, 0.0]),
                ("Other", vec![0.0, 1.0]),
            ],
            vec![0.0, 1.0],
        );
        let mut d = LabelDescriptors::default();
        d.insert("GNN", "graph neural networks");
        let clf = TopicClassifier::new(Arc::new(provider), d, FocusConfig::default()).unwrap();
        let labels = LabelSet::parse("Other,GNN").unwrap();
        let result = clf.score("abstract graphs", &labels).await.unwrap();
        assert_eq!(result.label, "GNN");
        assert!((result.scores[1].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn result_is_always_a_member_and_deterministic() {
        let clf = TopicClassifier::new(
            Arc::new(HashingProvider::default()),
            paper_descriptors(),
            FocusConfig::default(),
        )
        .unwrap();
        let labels = LabelSet::parse("Reinforcement Learning,NLP,Computer Vision").unwrap();
        for text in ["", "   ", "abstract", "zzz qqq", "Abstract: pixels and video frames"] {
            let first = clf.classify(text, &labels).await.unwrap();
            assert!(labels.contains(&first));
            assert_eq!(first, clf.classify(text, &labels).await.unwrap());
        }
    }

    #[tokio::test]
    async fn nlp_abstract_is_classified_as_nlp() {
        let clf = TopicClassifier::new(
            Arc::new(HashingProvider::default()),
            paper_descriptors(),
            FocusConfig::default(),
        )
        .unwrap();
        let labels = LabelSet::parse("NLP,Computer Vision").unwrap();
        let text = "A Study of Encoders\nJane Doe, jane@uni.edu\n\nAbstract\nWe study natural \
                    language processing with a transformer model and bert, improving \
                    translation quality and language model perplexity.";
        assert_eq!(clf.classify(text, &labels).await.unwrap(), "NLP");
    }

    #[tokio::test]
    async fn provider_failure_is_a_model_error() {
        let clf = TopicClassifier::new(Arc::new(FailingProvider), LabelDescriptors::default(), FocusConfig::default()).unwrap();
        let labels = LabelSet::parse("NLP").unwrap();
        let err = clf.classify("abstract text", &labels).await.unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[tokio::test]
    async fn short_provider_response_is_rejected() {
        struct Short;
        #[async_trait::async_trait]
        impl EmbeddingProvider for Short {
            async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
                Ok(EmbedResponse { vectors: vec![vec![1.0]] })
            }
        }
        let clf = TopicClassifier::new(Arc::new(Short), LabelDescriptors::default(), FocusConfig::default()).unwrap();
        let labels = LabelSet::parse("A,B").unwrap();
        assert!(matches!(clf.classify("abstract x", &labels).await, Err(Error::Model(_))));
    }

    #[test]
    fn argmax_ignores_nan() {
        assert_eq!(first_argmax(&[f32::NAN, 0.2, 0.2]), 1);
        assert_eq!(first_argmax(&[0.0, 0.0]), 0);
    }
}
