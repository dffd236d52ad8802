use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cli::render;
use serde_json::json;
use shelf_core::archiver::FsArchiver;
use shelf_core::chunker::Chunker;
use shelf_core::config::{self, AppConfig};
use shelf_core::extractor::{DocumentLoader, TextLoader};
use shelf_core::models::{keys, LabelSet};
use shelf_core::pipeline::{BatchOrchestrator, ItemOutcome};
use shelf_core::scanner::{self, ScanFilter};
use shelf_core::search::distinct_sources;
use shelf_core::Library;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("loading configuration")?;
    let json = cli.json;

    match cli.command {
        Commands::AddPaper { path, topics } => run_add_paper(cfg, path, &topics, json).await,
        Commands::BatchProcess { dir, topics } => run_batch(cfg, dir, &topics, json).await,
        Commands::SearchPaper {
            query,
            index_only,
            topk,
        } => run_search_paper(cfg, &query, index_only, topk, json).await,
        Commands::IndexImages { dir } => run_index_images(cfg, dir, json).await,
        Commands::SearchImage { query, topk } => run_search_image(cfg, &query, topk, json).await,
        Commands::Classify { path, topics } => run_classify(cfg, path, &topics, json).await,
    }
}

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Sort, index and search a local library of papers and pictures", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one paper, file it under its topic and index it
    #[command(alias = "add_paper")]
    AddPaper {
        path: PathBuf,
        /// Candidate topics, comma-separated
        #[arg(long)]
        topics: String,
    },
    /// Process every document in a directory
    #[command(alias = "batch_process")]
    BatchProcess {
        dir: PathBuf,
        /// Candidate topics, comma-separated
        #[arg(long)]
        topics: String,
    },
    /// Semantic search over indexed papers
    #[command(alias = "search_paper")]
    SearchPaper {
        query: String,
        /// List matching files once each instead of individual passages
        #[arg(long)]
        index_only: bool,
        /// Number of results
        #[arg(short, long)]
        topk: Option<usize>,
    },
    /// Index every picture under a directory
    #[command(alias = "index_images")]
    IndexImages { dir: PathBuf },
    /// Find pictures matching a description
    #[command(alias = "search_image")]
    SearchImage {
        query: String,
        /// Number of results
        #[arg(short, long)]
        topk: Option<usize>,
    },
    /// Show which topic a document would be filed under
    Classify {
        path: PathBuf,
        /// Candidate topics, comma-separated
        #[arg(long)]
        topics: String,
    },
}

fn document_loader(cfg: &AppConfig) -> Result<Arc<dyn DocumentLoader>> {
    let chunker = Chunker::from_config(&cfg.chunking)?;
    Ok(Arc::new(TextLoader::new(chunker)))
}

async fn run_add_paper(cfg: AppConfig, path: PathBuf, topics: &str, json: bool) -> Result<()> {
    let labels = LabelSet::parse(topics)?;
    let loader = document_loader(&cfg)?;
    let archiver = Arc::new(FsArchiver::new(&cfg.archive.root, cfg.archive.copy_then_delete));
    let library = Library::from_config(cfg).await?;
    let orchestrator = BatchOrchestrator::new(&library, loader, archiver);

    let item = orchestrator.process_one(&path, &labels).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("{} -> [{}]", render::file_name(&path.to_string_lossy()), item.category);
        println!("archived to {}", item.archived_to.display());
        println!("indexed {} chunks", item.chunks);
    }
    Ok(())
}

async fn run_batch(cfg: AppConfig, dir: PathBuf, topics: &str, json: bool) -> Result<()> {
    let labels = LabelSet::parse(topics)?;
    if !dir.is_dir() {
        bail!("directory not found: {}", dir.display());
    }
    let filter = ScanFilter::new(&cfg.scan.document_extensions, &cfg.scan.exclude)?;
    let files = scanner::collect_files(&[dir.clone()], &filter, false).await?;
    if files.is_empty() {
        if json {
            println!("{}", json!({ "attempted": 0, "succeeded": 0, "outcomes": [] }));
        } else {
            println!("no documents found in {}", dir.display());
        }
        return Ok(());
    }

    let loader = document_loader(&cfg)?;
    let archiver = Arc::new(FsArchiver::new(&cfg.archive.root, cfg.archive.copy_then_delete));
    let library = Library::from_config(cfg).await?;
    let orchestrator = BatchOrchestrator::new(&library, loader, archiver);
    let report = orchestrator.run(&files, &labels).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "attempted": report.attempted(),
                "succeeded": report.succeeded(),
                "outcomes": report.outcomes,
            }))?
        );
    } else {
        for outcome in &report.outcomes {
            match outcome {
                ItemOutcome::Indexed(item) => println!(
                    "ok     {} -> [{}]",
                    item.source.display(),
                    item.category
                ),
                ItemOutcome::Failed { path, error, .. } => {
                    println!("failed {}: {}", path.display(), error)
                }
            }
        }
        println!("processed {}/{}", report.succeeded(), report.attempted());
    }
    Ok(())
}

async fn run_search_paper(
    cfg: AppConfig,
    query: &str,
    index_only: bool,
    topk: Option<usize>,
    json: bool,
) -> Result<()> {
    let k = topk.unwrap_or(if index_only {
        cfg.search.index_only_k
    } else {
        cfg.search.text_k
    });
    let library = Library::from_config(cfg).await?;
    let hits = library.search_text(query, k).await?;

    if index_only {
        let files = distinct_sources(&hits, keys::SOURCE);
        if json {
            let rows: Vec<_> = files
                .iter()
                .map(|(source, hit)| json!({ "source": source, "distance": hit.distance }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else if files.is_empty() {
            println!("no matching papers");
        } else {
            for (i, (source, _)) in files.iter().enumerate() {
                println!("{}. {}\n   {}", i + 1, render::file_name(source), source);
            }
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("no matching passages");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} | page {} | {}",
            i + 1,
            render::file_name(hit.meta(keys::SOURCE).unwrap_or_default()),
            render::page_label(hit),
            render::category(hit)
        );
        println!("   \"{}...\"", render::snippet(&hit.payload));
    }
    Ok(())
}

async fn run_index_images(cfg: AppConfig, dir: PathBuf, json: bool) -> Result<()> {
    if !dir.is_dir() {
        bail!("directory not found: {}", dir.display());
    }
    let filter = ScanFilter::new(&cfg.scan.image_extensions, &cfg.scan.exclude)?;
    let files = scanner::collect_files(&[dir], &filter, true).await?;
    let library = Library::from_config(cfg).await?;
    let indexed = library
        .index_images(&files)
        .await
        .context("set images.provider (for example \"clip\") to index pictures")?;
    if json {
        println!("{}", json!({ "found": files.len(), "indexed": indexed }));
    } else {
        println!("indexed {} of {} images", indexed, files.len());
    }
    Ok(())
}

async fn run_search_image(cfg: AppConfig, query: &str, topk: Option<usize>, json: bool) -> Result<()> {
    let k = topk.unwrap_or(cfg.search.image_k);
    let library = Library::from_config(cfg).await?;
    let hits = library.search_image(query, k).await?;

    if json {
        let rows: Vec<_> = hits
            .iter()
            .map(|h| {
                json!({
                    "path": h.payload,
                    "distance": h.distance,
                    "match_percent": render::match_percent(h.distance),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("no matching images");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. {:.2}% (distance {:.4})\n   {}",
            i + 1,
            render::match_percent(hit.distance),
            hit.distance,
            hit.payload
        );
    }
    Ok(())
}

async fn run_classify(cfg: AppConfig, path: PathBuf, topics: &str, json: bool) -> Result<()> {
    let labels = LabelSet::parse(topics)?;
    let loader = document_loader(&cfg)?;
    let document = loader.load(&path).await?;
    let library = Library::from_config(cfg).await?;
    let result = library.classify_scored(document.first_page(), &labels).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for score in &result.scores {
            println!("{:>8.4}  {}", score.score, score.label);
        }
        println!("=> {}", result.label);
    }
    Ok(())
}
