//! Walks input roots and collects the files a command should process.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::warn;
use walkdir::WalkDir;

/// File selection for a walk. Extensions are compared case-insensitively and
/// without the leading dot.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    extensions: Vec<String>,
    excludes: GlobSet,
}

impl ScanFilter {
    pub fn new(extensions: &[String], excludes: &[String]) -> Result<Self> {
        Ok(Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            excludes: build_globset(excludes)?,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        if is_excluded(path, &self.excludes) {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

/// Expands `roots` into matching files, sorted for a stable processing order.
/// Files given directly are kept when they match; directories are walked
/// (only their top level unless `recursive`), skipping hidden entries.
pub async fn collect_files(
    roots: &[PathBuf],
    filter: &ScanFilter,
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let roots = roots.to_vec();
    let filter = filter.clone();
    task::spawn_blocking(move || walk(&roots, &filter, recursive))
        .await
        .map_err(|e| Error::input(format!("scan task failed: {}", e)))?
}

fn walk(roots: &[PathBuf], filter: &ScanFilter, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in roots {
        if !root.exists() {
            return Err(Error::input(format!("{} does not exist", root.display())));
        }
        if root.is_file() {
            if filter.matches(root) {
                files.push(root.clone());
            }
            continue;
        }
        let mut found: Vec<PathBuf> = Vec::new();
        let mut walker = WalkDir::new(root).follow_links(true);
        if !recursive {
            walker = walker.max_depth(1);
        }
        for entry in walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || should_descend(e.path(), &filter.excludes))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && filter.matches(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob =
            Glob::new(pat).map_err(|e| Error::Config(format!("exclude pattern {}: {}", pat, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("exclude patterns: {}", e)))
}

fn should_descend(path: &Path, excludes: &GlobSet) -> bool {
    !is_excluded(path, excludes) && !is_hidden(path)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_excluded(path: &Path, excludes: &GlobSet) -> bool {
    excludes.is_match(path)
}
