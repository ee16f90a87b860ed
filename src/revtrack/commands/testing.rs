//! A tracked folder on disk with an in-memory state store, for command tests.

use crate::commands::save::{self, SaveOutcome};
use crate::commands::Context;
use crate::config::TrackConfig;
use crate::folder::Workspace;
use crate::header;
use crate::locks::KeyLocks;
use crate::model::{DocumentRecord, StorageKey};
use crate::store::mem_backend::MemBackend;
use crate::store::{Area, RecordStore};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct Fixture {
    _dir: TempDir,
    pub workspace: Workspace,
    pub store: RecordStore<MemBackend>,
    pub config: TrackConfig,
    pub locks: KeyLocks,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(TrackConfig::default())
    }

    pub fn with_config(config: TrackConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        Self {
            _dir: dir,
            workspace,
            store: RecordStore::new(MemBackend::new()),
            config,
            locks: KeyLocks::new(),
        }
    }

    pub fn ctx(&self) -> Context<'_, MemBackend> {
        Context {
            store: &self.store,
            workspace: &self.workspace,
            config: &self.config,
            locks: &self.locks,
        }
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn key(&self, rel: &str) -> StorageKey {
        StorageKey::from_relative(Path::new(rel))
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write `body` under a fresh header and let the create handler start its record.
    pub fn tracked(&self, rel: &str, body: &str) -> PathBuf {
        let key = self.key(rel);
        let log = self.store.pointer(Area::Records, key.as_str());
        let path = self.write(rel, &header::add_header(body, &key.display_path(), &log));
        let outcome = save::on_created(self.ctx(), &path).unwrap();
        assert!(matches!(outcome, SaveOutcome::Created { .. }), "{:?}", outcome);
        path
    }

    pub fn append(&self, path: &Path, text: &str) {
        let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    pub fn set_version(&self, path: &Path, version: &str) {
        let text = fs::read_to_string(path).unwrap();
        fs::write(path, header::set_field(&text, "version", version).unwrap()).unwrap();
    }

    pub fn find(&self, rel: &str) -> Option<DocumentRecord> {
        self.store.find(&self.key(rel)).unwrap()
    }

    pub fn record(&self, rel: &str) -> DocumentRecord {
        self.find(rel).unwrap()
    }

    pub fn snapshot(&self, rel: &str) -> String {
        self.store.snapshot(&self.key(rel)).unwrap().unwrap()
    }
}
