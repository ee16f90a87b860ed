//! # Storage Layer
//!
//! Everything revtrack knows about a folder lives in its state directory, `.revtrack/`,
//! as markup-format text files:
//!
//! ```text
//! .revtrack/
//! ├── config.txt              folder settings (see config.rs)
//! ├── index.txt               storage key -> current revision
//! ├── snapshots/<key>         last saved content, the next diff baseline
//! ├── records/<key>           meta block + append-only history block
//! ├── archive/<key>-<ts>.txt  history segments moved out of records
//! ├── stats/<key>             output of `compact`
//! ├── removed/<key>-<ts>      records and snapshots of untracked documents
//! └── session/                watcher logs and the liveness marker
//! ```
//!
//! ## Design
//!
//! Raw I/O sits behind the [`StorageBackend`] trait:
//! - [`fs_backend::FsBackend`]: production, every write is write-temp-then-rename
//! - [`mem_backend::MemBackend`]: tests, no filesystem needed
//!
//! [`RecordStore`] adds the meaning on top: it maps records, archives and the index to and
//! from markup, and names files. It never locks; callers serialize per storage key.

use crate::config::{TrackConfig, CONFIG_FILENAME};
use crate::error::Result;
use crate::markup::{self, Block, FieldValue, MarkupDocument};
use crate::model::{compact_timestamp, DocumentRecord, StorageKey};
use crate::revision::RevisionId;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub mod backend;
pub mod codec;
pub mod fs_backend;
pub mod mem_backend;

pub use backend::{Area, StorageBackend};
pub use codec::ArchiveFile;

/// Name of the state directory inside a tracked folder.
pub const STATE_DIR: &str = ".revtrack";
pub const INDEX_FILENAME: &str = "index.txt";
const INDEX_BLOCK: &str = "index";

pub struct RecordStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> RecordStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// How a stored artifact is referred to from records and headers: `./.revtrack/<area>/<name>`.
    pub fn pointer(&self, area: Area, name: &str) -> String {
        match area.dir_name() {
            Some(dir) => format!("./{}/{}/{}", STATE_DIR, dir, name),
            None => format!("./{}/{}", STATE_DIR, name),
        }
    }

    // --- Records ---

    pub fn find(&self, key: &StorageKey) -> Result<Option<DocumentRecord>> {
        Ok(self
            .backend
            .read(Area::Records, key.as_str())?
            .map(|text| codec::record_from_markup(&markup::parse(&text))))
    }

    /// The record, or an empty default when there is none.
    pub fn load(&self, key: &StorageKey) -> Result<DocumentRecord> {
        Ok(self.find(key)?.unwrap_or_default())
    }

    pub fn save(&self, key: &StorageKey, record: &DocumentRecord) -> Result<()> {
        let text = markup::render(&codec::record_to_markup(record));
        self.backend.write(Area::Records, key.as_str(), &text)
    }

    pub fn has_record(&self, key: &StorageKey) -> Result<bool> {
        self.backend.exists(Area::Records, key.as_str())
    }

    pub fn delete_record(&self, key: &StorageKey) -> Result<bool> {
        self.backend.delete(Area::Records, key.as_str())
    }

    /// Keys of all records, sorted. Files that are not valid keys are skipped.
    pub fn record_keys(&self) -> Result<Vec<StorageKey>> {
        let mut keys: Vec<StorageKey> = self
            .backend
            .list(Area::Records)?
            .iter()
            .filter_map(|name| StorageKey::parse(name).ok())
            .collect();
        keys.sort();
        Ok(keys)
    }

    // --- Snapshots ---

    pub fn snapshot(&self, key: &StorageKey) -> Result<Option<String>> {
        self.backend.read(Area::Snapshots, key.as_str())
    }

    pub fn put_snapshot(&self, key: &StorageKey, content: &str) -> Result<()> {
        self.backend.write(Area::Snapshots, key.as_str(), content)
    }

    pub fn has_snapshot(&self, key: &StorageKey) -> Result<bool> {
        self.backend.exists(Area::Snapshots, key.as_str())
    }

    pub fn snapshot_modified(&self, key: &StorageKey) -> Result<Option<DateTime<Utc>>> {
        self.backend.modified(Area::Snapshots, key.as_str())
    }

    /// Move both the snapshot and the record to a new key.
    pub fn relocate(&self, from: &StorageKey, to: &StorageKey) -> Result<()> {
        self.backend.relocate(
            (Area::Snapshots, from.as_str()),
            (Area::Snapshots, to.as_str()),
        )?;
        self.backend
            .relocate((Area::Records, from.as_str()), (Area::Records, to.as_str()))?;
        Ok(())
    }

    /// Move the record and snapshot aside into `removed/`, stamped with `at`.
    pub fn retire(&self, key: &StorageKey, at: &DateTime<Utc>) -> Result<bool> {
        let name = format!("{}-{}", key, compact_timestamp(at));
        let snapshot = self.backend.relocate(
            (Area::Snapshots, key.as_str()),
            (Area::Removed, &format!("{}.snapshot", name)),
        )?;
        let record = self.backend.relocate(
            (Area::Records, key.as_str()),
            (Area::Removed, &format!("{}.record", name)),
        )?;
        Ok(snapshot || record)
    }

    // --- Archives ---

    /// Write an archive side-file and return its pointer.
    ///
    /// Named `<key>-<YYYYMMDD-HHMMSS>.txt`; a numeric suffix keeps names unique when two
    /// archives of the same key land in the same second.
    pub fn write_archive(&self, key: &StorageKey, archive: &ArchiveFile) -> Result<String> {
        let at = archive.archived_at.unwrap_or_else(crate::model::now);
        let stem = format!("{}-{}", key, compact_timestamp(&at));
        let mut name = format!("{}.txt", stem);
        let mut n = 1;
        while self.backend.exists(Area::Archive, &name)? {
            n += 1;
            name = format!("{}-{}.txt", stem, n);
        }
        let text = markup::render(&codec::archive_to_markup(archive));
        self.backend.write(Area::Archive, &name, &text)?;
        Ok(self.pointer(Area::Archive, &name))
    }

    pub fn archive_names(&self) -> Result<Vec<String>> {
        self.backend.list(Area::Archive)
    }

    pub fn load_archive(&self, name: &str) -> Result<Option<ArchiveFile>> {
        Ok(self
            .backend
            .read(Area::Archive, name)?
            .map(|text| codec::archive_from_markup(&markup::parse(&text))))
    }

    // --- Index, config, stats ---

    pub fn load_index(&self) -> Result<BTreeMap<StorageKey, RevisionId>> {
        let mut index = BTreeMap::new();
        let Some(text) = self.backend.read(Area::Root, INDEX_FILENAME)? else {
            return Ok(index);
        };
        if let Some(block) = markup::find_block(&text, INDEX_BLOCK) {
            for (key, value) in block.fields.iter() {
                let key = StorageKey::parse(key).ok();
                let rev = value.first().and_then(RevisionId::parse);
                if let (Some(key), Some(rev)) = (key, rev) {
                    index.insert(key, rev);
                }
            }
        }
        Ok(index)
    }

    pub fn save_index(&self, index: &BTreeMap<StorageKey, RevisionId>) -> Result<()> {
        let mut block = Block::new(INDEX_BLOCK);
        for (key, rev) in index {
            block.fields.set(key.as_str(), FieldValue::scalar(rev.to_string()));
        }
        let text = markup::render(&MarkupDocument::new().with_block(block));
        self.backend.write(Area::Root, INDEX_FILENAME, &text)
    }

    pub fn load_config(&self) -> Result<TrackConfig> {
        Ok(self
            .backend
            .read(Area::Root, CONFIG_FILENAME)?
            .map(|text| TrackConfig::parse(&text))
            .unwrap_or_default())
    }

    pub fn save_config(&self, config: &TrackConfig) -> Result<()> {
        self.backend
            .write(Area::Root, CONFIG_FILENAME, &config.render())
    }

    pub fn write_stats(&self, key: &StorageKey, text: &str) -> Result<()> {
        self.backend.write(Area::Stats, key.as_str(), text)
    }
}
