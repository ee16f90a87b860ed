use crate::error::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// The kinds of artifact kept under the state directory, one sub-directory each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// The state directory itself: config and index.
    Root,
    Snapshots,
    Records,
    Archive,
    Removed,
    Stats,
    Session,
}

impl Area {
    pub fn dir_name(self) -> Option<&'static str> {
        match self {
            Area::Root => None,
            Area::Snapshots => Some("snapshots"),
            Area::Records => Some("records"),
            Area::Archive => Some("archive"),
            Area::Removed => Some("removed"),
            Area::Stats => Some("stats"),
            Area::Session => Some("session"),
        }
    }
}

/// Abstract interface for raw storage I/O.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while `RecordStore` handles the "what" (records, snapshots, archives, index).
///
/// Backends are shared between the event dispatcher and the poller, hence `Send + Sync`.
pub trait StorageBackend: Send + Sync {
    /// Read an artifact.
    /// Returns Ok(None) if it does not exist.
    /// Returns Err only on actual I/O errors (permissions, disk failure).
    fn read(&self, area: Area, name: &str) -> Result<Option<String>>;

    /// Write an artifact.
    /// MUST be atomic (e.g. write to tmp then rename) so a crash keeps the previous version.
    fn write(&self, area: Area, name: &str, content: &str) -> Result<()>;

    /// Write an artifact only if none exists yet. Returns false if one was already there.
    /// The check and the creation are a single step, and the content appears complete.
    fn create_new(&self, area: Area, name: &str, content: &str) -> Result<bool>;

    /// Delete an artifact. Returns false if there was nothing to delete.
    fn delete(&self, area: Area, name: &str) -> Result<bool>;

    /// Move an artifact, replacing anything at the destination.
    /// Returns false if the source does not exist.
    fn relocate(&self, from: (Area, &str), to: (Area, &str)) -> Result<bool>;

    /// Names of the artifacts in an area. Temporary files are never listed.
    fn list(&self, area: Area) -> Result<Vec<String>>;

    fn modified(&self, area: Area, name: &str) -> Result<Option<DateTime<Utc>>>;

    /// Where the artifact lives. For FsBackend the real path, for MemBackend a virtual one.
    fn path(&self, area: Area, name: &str) -> PathBuf;

    fn exists(&self, area: Area, name: &str) -> Result<bool> {
        Ok(self.read(area, name)?.is_some())
    }
}
