//! The tracked folder: where documents live and which of them are trackable.
//!
//! A document is trackable when it has a configured extension, is not ignored, lives
//! outside the state directory and any hidden directory, and carries a tracking header.

use crate::config::TrackConfig;
use crate::error::{Result, RevtrackError};
use crate::header;
use crate::model::StorageKey;
use crate::store::STATE_DIR;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// What the fallback poller compares: modification time and line count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    pub modified: DateTime<Utc>,
    pub lines: usize,
}

pub fn line_count(text: &str) -> usize {
    text.lines().count()
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// The root is canonicalized when possible so paths from the notifier compare equal.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = fs::canonicalize(&root).unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Folder-relative path with `/` separators, or `None` for paths outside the folder
    /// or inside the state directory.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?
        } else {
            path
        };
        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() || parts[0] == STATE_DIR {
            return None;
        }
        Some(parts.join("/"))
    }

    pub fn key_for(&self, path: &Path) -> Option<StorageKey> {
        self.relative(path)
            .map(|rel| StorageKey::from_relative(Path::new(&rel)))
    }

    pub fn document_path(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Resolve a `./rel/path` reference as written in headers.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        let rel = reference.trim().trim_start_matches("./");
        self.root.join(rel)
    }

    /// Extension, ignore list and hidden-directory checks. Says nothing about the header.
    pub fn is_candidate(&self, config: &TrackConfig, path: &Path) -> bool {
        let Some(rel) = self.relative(path) else {
            return false;
        };
        let mut dirs = rel.split('/').rev().skip(1);
        if dirs.any(|dir| dir.starts_with('.')) {
            return false;
        }
        config.has_tracked_extension(&rel) && !config.is_ignored(&rel)
    }

    /// Candidate documents below the root, sorted.
    pub fn candidates(&self, config: &TrackConfig) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        self.walk(&self.root, config, &mut found)?;
        found.sort();
        Ok(found)
    }

    fn walk(&self, dir: &Path, config: &TrackConfig, found: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir).map_err(RevtrackError::Io)? {
            let entry = entry.map_err(RevtrackError::Io)?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(RevtrackError::Io)?;
            if file_type.is_dir() {
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if !hidden {
                    self.walk(&path, config, found)?;
                }
            } else if file_type.is_file() && self.is_candidate(config, &path) {
                found.push(path);
            }
        }
        Ok(())
    }

    /// Candidates that carry a tracking header, with their content.
    pub fn trackable(&self, config: &TrackConfig) -> Result<Vec<(PathBuf, String)>> {
        let mut docs = Vec::new();
        for path in self.candidates(config)? {
            if let Some(content) = read_document(&path)? {
                if header::has_header(&content) {
                    docs.push((path, content));
                }
            }
        }
        Ok(docs)
    }
}

/// Document text, `None` when it is gone or not UTF-8.
pub fn read_document(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            tracing::debug!(path = %path.display(), "skipping non UTF-8 document");
            Ok(None)
        }
        Err(err) => Err(RevtrackError::Io(err)),
    }
}

pub fn modified(path: &Path) -> Result<Option<DateTime<Utc>>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified().map_err(RevtrackError::Io)?.into())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(RevtrackError::Io(err)),
    }
}
