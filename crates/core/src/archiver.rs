//! Files processed documents under `<root>/<category>/`.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, info};

#[async_trait::async_trait]
pub trait Archiver: Send + Sync {
    /// Moves `path` into the folder for `category` and returns where it landed.
    async fn archive(&self, path: &Path, category: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct FsArchiver {
    root: PathBuf,
    copy_then_delete: bool,
}

impl FsArchiver {
    pub fn new(root: impl Into<PathBuf>, copy_then_delete: bool) -> Self {
        Self {
            root: root.into(),
            copy_then_delete,
        }
    }

    /// Destination folder for `category`, kept inside the archive root.
    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.root.join(folder_name(category))
    }
}

#[async_trait::async_trait]
impl Archiver for FsArchiver {
    async fn archive(&self, path: &Path, category: &str) -> Result<PathBuf> {
        let from = path.to_path_buf();
        let dir = self.category_dir(category);
        let copy_then_delete = self.copy_then_delete;
        let to = task::spawn_blocking(move || move_into(&from, &dir, copy_then_delete))
            .await
            .map_err(|e| Error::storage(format!("archive task failed: {}", e)))??;
        info!(from = %path.display(), to = %to.display(), category, "archived document");
        Ok(to)
    }
}

fn folder_name(category: &str) -> String {
    let cleaned: String = category
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim();
    if cleaned.is_empty() {
        "Uncategorized".to_string()
    } else {
        cleaned.to_string()
    }
}

fn move_into(from: &Path, dir: &Path, copy_then_delete: bool) -> Result<PathBuf> {
    let io = |what: &str, e: std::io::Error| Error::storage(format!("{} {}: {}", what, from.display(), e));
    let name = from
        .file_name()
        .ok_or_else(|| Error::input(format!("{} has no file name", from.display())))?;
    fs::create_dir_all(dir).map_err(|e| io("creating folder for", e))?;
    let mut to = dir.join(name);
    if to == from {
        return Ok(to);
    }
    if to.exists() {
        to = resolve_conflict(&to);
    }
    if copy_then_delete {
        copy_and_remove(from, &to).map_err(|e| io("copying", e))?;
    } else if let Err(e) = fs::rename(from, &to) {
        // Rename cannot cross filesystems.
        debug!(error = %e, "rename failed, falling back to copy");
        copy_and_remove(from, &to).map_err(|e| io("moving", e))?;
    }
    Ok(to)
}

fn copy_and_remove(from: &Path, to: &Path) -> std::io::Result<()> {
    let copied = fs::copy(from, to)?;
    let expected = fs::metadata(from)?.len();
    if copied != expected {
        let _ = fs::remove_file(to);
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("copied {} of {} bytes", copied, expected),
        ));
    }
    fs::remove_file(from)
}

/// `paper.pdf` -> `paper_1.pdf`, `paper_2.pdf`, ... until a free name is found.
fn resolve_conflict(dest: &Path) -> PathBuf {
    let stem = dest
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut counter = 1;
    loop {
        let name = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn moves_into_category_folder() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("inbox/paper.pdf");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"pdf").unwrap();

        let archiver = FsArchiver::new(dir.path().join("documents"), false);
        let to = archiver.archive(&src, "Computer Vision").await.unwrap();
        assert_eq!(to, dir.path().join("documents/Computer Vision/paper.pdf"));
        assert!(!src.exists());
        assert_eq!(fs::read(&to).unwrap(), b"pdf");
    }

    #[tokio::test]
    async fn name_clash_gets_suffix_and_copy_mode_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = FsArchiver::new(dir.path().join("documents"), true);
        fs::create_dir_all(archiver.category_dir("NLP")).unwrap();
        fs::write(archiver.category_dir("NLP").join("a.txt"), b"old").unwrap();

        let src = dir.path().join("a.txt");
        fs::write(&src, b"new").unwrap();
        let to = archiver.archive(&src, "NLP").await.unwrap();
        assert_eq!(to.file_name().unwrap(), "a_1.txt");
        assert!(!src.exists());
        assert_eq!(fs::read(archiver.category_dir("NLP").join("a.txt")).unwrap(), b"old");
    }

    #[test]
    fn category_cannot_escape_root() {
        let archiver = FsArchiver::new("/lib", false);
        assert_eq!(archiver.category_dir("../etc"), PathBuf::from("/lib/_etc"));
        assert_eq!(archiver.category_dir("  "), PathBuf::from("/lib/Uncategorized"));
        assert_eq!(archiver.category_dir("a/b"), PathBuf::from("/lib/a_b"));
    }

    #[tokio::test]
    async fn missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = FsArchiver::new(dir.path().join("documents"), false);
        assert!(archiver.archive(&dir.path().join("nope.pdf"), "NLP").await.is_err());
    }
}
