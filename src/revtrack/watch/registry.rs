//! Which folders have a watcher, across the whole machine.
//!
//! A `registry` block of `{path, pid, started}` containers in `registry.txt` under the
//! user data directory, or wherever `REVTRACK_REGISTRY` points. It is a convenience list
//! for `revtrack watchers`: dead processes are pruned on every read, and nothing decides
//! whether a watcher runs based on it. The per-folder marker does that.

use crate::error::{Result, RevtrackError};
use crate::markup::{self, Block, Container, FieldValue, MarkupDocument};
use crate::model::{format_timestamp, now, parse_timestamp};
use crate::store::fs_backend::write_atomic;
use crate::watch::marker::process_alive;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const REGISTRY_ENV: &str = "REVTRACK_REGISTRY";
const REGISTRY_FILENAME: &str = "registry.txt";
const REGISTRY_BLOCK: &str = "registry";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub path: PathBuf,
    pub pid: u32,
    pub started: Option<DateTime<Utc>>,
}

pub struct WatcherRegistry {
    path: PathBuf,
}

impl WatcherRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$REVTRACK_REGISTRY`, else `registry.txt` in the user data directory.
    pub fn default_location() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(REGISTRY_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("com", "revtrack", "revtrack")
            .map(|dirs| dirs.data_dir().join(REGISTRY_FILENAME))
    }

    pub fn open_default() -> Option<Self> {
        Self::default_location().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<RegistryEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(RevtrackError::Io(err)),
        };
        let Some(block) = markup::find_block(&text, REGISTRY_BLOCK) else {
            return Ok(Vec::new());
        };
        Ok(block
            .containers
            .iter()
            .filter_map(|c| {
                let path = c.fields.get_str("path")?;
                let pid = c.fields.get_str("pid")?.trim().parse().ok()?;
                Some(RegistryEntry {
                    path: PathBuf::from(path),
                    pid,
                    started: c.fields.get_str("started").and_then(parse_timestamp),
                })
            })
            .collect())
    }

    fn write_all(&self, entries: &[RegistryEntry]) -> Result<()> {
        let mut block = Block::new(REGISTRY_BLOCK);
        for entry in entries {
            let mut container = Container::new()
                .with_field("path", FieldValue::scalar(entry.path.to_string_lossy()))
                .with_field("pid", FieldValue::scalar(entry.pid.to_string()));
            if let Some(started) = &entry.started {
                container =
                    container.with_field("started", FieldValue::scalar(format_timestamp(started)));
            }
            block.containers.push(container);
        }
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(RevtrackError::Io)?;
        }
        write_atomic(
            &self.path,
            &markup::render(&MarkupDocument::new().with_block(block)),
        )
    }

    /// Add or replace the entry for `folder`.
    pub fn register(&self, folder: &Path, pid: u32) -> Result<()> {
        let mut entries = self.live()?;
        entries.retain(|e| e.path != folder);
        entries.push(RegistryEntry {
            path: folder.to_path_buf(),
            pid,
            started: Some(now()),
        });
        self.write_all(&entries)
    }

    pub fn unregister(&self, folder: &Path, pid: u32) -> Result<()> {
        let mut entries = self.read_all()?;
        let before = entries.len();
        entries.retain(|e| !(e.path == folder && e.pid == pid));
        if entries.len() != before {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    /// Entries whose process is alive. Dead ones are dropped from the file.
    pub fn live(&self) -> Result<Vec<RegistryEntry>> {
        let entries = self.read_all()?;
        let total = entries.len();
        let alive: Vec<RegistryEntry> = entries
            .into_iter()
            .filter(|e| process_alive(e.pid))
            .collect();
        if alive.len() != total {
            tracing::debug!(pruned = total - alive.len(), "pruned dead watchers");
            self.write_all(&alive)?;
        }
        Ok(alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn register_and_unregister() {
        let dir = TempDir::new().unwrap();
        let registry = WatcherRegistry::new(dir.path().join("nested/registry.txt"));
        let folder = dir.path().join("docs");
        let pid = std::process::id();

        registry.register(&folder, pid).unwrap();
        registry.register(&folder, pid).unwrap();
        let live = registry.live().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].path, folder);
        assert_eq!(live[0].pid, pid);

        registry.unregister(&folder, pid).unwrap();
        assert!(registry.live().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn dead_entries_are_pruned() {
        let dir = TempDir::new().unwrap();
        let registry = WatcherRegistry::new(dir.path().join("registry.txt"));
        registry.register(Path::new("/gone"), 999_999_999).unwrap();
        registry.register(Path::new("/here"), std::process::id()).unwrap();

        let live = registry.live().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].path, PathBuf::from("/here"));
        let text = fs::read_to_string(registry.path()).unwrap();
        assert!(!text.contains("/gone"));
    }
}
