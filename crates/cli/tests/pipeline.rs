use providers::hashing::HashingProvider;
use providers::{EmbedResponse, EmbeddingProvider, ProviderError, ProviderRegistry};
use shelf_core::archiver::FsArchiver;
use shelf_core::chunker::Chunker;
use shelf_core::config::AppConfig;
use shelf_core::extractor::TextLoader;
use shelf_core::models::{Collection, LabelSet};
use shelf_core::pipeline::{BatchOrchestrator, ItemOutcome};
use shelf_core::vectorstore::InMemoryVectorStore;
use shelf_core::Library;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Hashing embeddings, except that any text mentioning "poison" fails the way
/// an unreachable model server would.
struct FlakyProvider(HashingProvider);

#[async_trait::async_trait]
impl EmbeddingProvider for FlakyProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        if texts.iter().any(|t| t.to_lowercase().contains("poison")) {
            return Err(ProviderError::Status {
                status: 503,
                body: "model unavailable".into(),
            });
        }
        self.0.embed(texts).await
    }
}

fn library(archive_root: &Path) -> Library {
    let mut cfg = AppConfig::default();
    cfg.archive.root = archive_root.to_string_lossy().into_owned();
    cfg.classification.descriptors.insert(
        "NLP",
        "natural language processing, NLP, translation, transformer, bert, language model",
    );
    cfg.classification.descriptors.insert(
        "Computer Vision",
        "computer vision, image recognition, object detection, pixel, CNN, video",
    );
    let registry = ProviderRegistry::new()
        .with_embedding("flaky", Arc::new(FlakyProvider(HashingProvider::default())))
        .set_preferred_embedding("flaky");
    Library::new(cfg, Arc::new(InMemoryVectorStore::new()), &registry).unwrap()
}

#[tokio::test]
async fn failing_item_does_not_stop_the_batch() {
    let temp = tempdir().unwrap();
    let inbox = temp.path().join("inbox");
    let archive = temp.path().join("documents");
    fs::create_dir_all(&inbox).unwrap();

    let bodies = [
        "Abstract: a transformer language model for translation.",
        "Abstract: object detection from video pixels.",
        "Abstract: this paper is poison for the model server.",
        "Abstract: bert embeddings for natural language processing.",
        "Abstract: image recognition with a CNN.",
    ];
    let paths: Vec<_> = bodies
        .iter()
        .enumerate()
        .map(|(i, body)| {
            let path = inbox.join(format!("paper{}.txt", i + 1));
            fs::write(&path, body).unwrap();
            path
        })
        .collect();

    let library = library(&archive);
    let loader = Arc::new(TextLoader::new(Chunker::new(1000, 100).unwrap()));
    let archiver = Arc::new(FsArchiver::new(&archive, false));
    let orchestrator = BatchOrchestrator::new(&library, loader, archiver);
    let labels = LabelSet::parse("NLP,Computer Vision").unwrap();

    let report = orchestrator.run(&paths, &labels).await;
    assert_eq!(report.attempted(), 5);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failed(), 1);

    match &report.outcomes[2] {
        ItemOutcome::Failed { path, kind, error } => {
            assert_eq!(path, &paths[2]);
            assert_eq!(*kind, "model");
            assert!(error.contains("503"));
        }
        other => panic!("item 3 should have failed, got {:?}", other),
    }
    assert!(paths[2].exists(), "failed item stays in place");

    let categories: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|o| match o {
            ItemOutcome::Indexed(item) => Some(item.category.as_str()),
            ItemOutcome::Failed { .. } => None,
        })
        .collect();
    assert_eq!(categories, vec!["NLP", "Computer Vision", "NLP", "Computer Vision"]);

    assert!(archive.join("NLP/paper1.txt").exists());
    assert!(archive.join("Computer Vision/paper2.txt").exists());
    assert!(archive.join("NLP/paper4.txt").exists());
    assert!(archive.join("Computer Vision/paper5.txt").exists());
    assert_eq!(library.index().count(Collection::Text).await.unwrap(), 4);
}

#[tokio::test]
async fn indexed_chunks_point_at_the_archived_file() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("documents");
    let paper = temp.path().join("encoders.txt");
    fs::write(
        &paper,
        "Title page\x0cAbstract: we train a transformer language model for translation.",
    )
    .unwrap();

    let library = library(&archive);
    let orchestrator = BatchOrchestrator::new(
        &library,
        Arc::new(TextLoader::new(Chunker::new(1000, 100).unwrap())),
        Arc::new(FsArchiver::new(&archive, false)),
    );
    let labels = LabelSet::parse("NLP,Computer Vision").unwrap();
    let item = orchestrator.process_one(&paper, &labels).await.unwrap();
    assert_eq!(item.chunks, 2);

    let hits = library.search_text("transformer translation", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].meta("page"), Some("1"));
    assert_eq!(hits[0].meta("category"), Some(item.category.as_str()));
    assert_eq!(
        hits[0].meta("source"),
        Some(&*item.archived_to.to_string_lossy())
    );
}
