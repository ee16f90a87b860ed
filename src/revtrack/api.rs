//! # API Facade
//!
//! The single entry point for every revtrack operation, used by the CLI and by the
//! watcher threads alike.
//!
//! ## Role and Responsibilities
//!
//! The facade:
//! - **Owns** the record store, the folder, its config and the per-key locks
//! - **Normalizes inputs**: document paths become storage keys or targets
//! - **Dispatches** to the command functions in `commands/*.rs`
//! - **Returns structured reports**, all `Serialize`, never printed text
//!
//! It holds no logic of its own. Business rules live in the commands, storage rules in
//! the store.
//!
//! ## Concurrency
//!
//! Every method takes `&self`. The watcher shares one `Arc<RevtrackApi<_>>` between its
//! dispatcher and poller threads, and every record read-modify-write happens under the
//! lock of the storage key it touches, taken inside the command.
//!
//! ## Generic Over StorageBackend
//!
//! - Production: `RevtrackApi<FsBackend>`
//! - Testing: `RevtrackApi<MemBackend>`, with documents in a temporary folder

use crate::commands::archive::ArchiveReport;
use crate::commands::bump::{BumpKind, BumpReport};
use crate::commands::compact::RecordStats;
use crate::commands::fix::{FixReport, IssueSelection, OrphanReport, RepairReport, UntrackReport};
use crate::commands::history::HistoryView;
use crate::commands::init::{InitAllReport, InitReport};
use crate::commands::poll::{PokeMemory, PollOutcome};
use crate::commands::save::SaveOutcome;
use crate::commands::scan::Issue;
use crate::commands::status::StatusReport;
use crate::commands::sync::SyncReport;
use crate::commands::{self, Context, Target};
use crate::config::TrackConfig;
use crate::error::{Result, RevtrackError};
use crate::folder::Workspace;
use crate::locks::KeyLocks;
use crate::model::StorageKey;
use crate::store::fs_backend::FsBackend;
use crate::store::{RecordStore, StorageBackend};
use std::fs;
use std::path::{Path, PathBuf};

pub struct RevtrackApi<B: StorageBackend> {
    store: RecordStore<B>,
    workspace: Workspace,
    config: TrackConfig,
    locks: KeyLocks,
    poked: PokeMemory,
}

impl RevtrackApi<FsBackend> {
    /// The API for a folder on disk, with its state in `<folder>/.revtrack`.
    pub fn open(folder: impl Into<PathBuf>) -> Result<Self> {
        let workspace = Workspace::new(folder);
        let store = RecordStore::new(FsBackend::new(workspace.state_dir()));
        Self::new(store, workspace)
    }
}

impl<B: StorageBackend> RevtrackApi<B> {
    /// Reads the folder config from the store.
    pub fn new(store: RecordStore<B>, workspace: Workspace) -> Result<Self> {
        let config = store.load_config()?;
        Ok(Self::with_config(store, workspace, config))
    }

    pub fn with_config(store: RecordStore<B>, workspace: Workspace, config: TrackConfig) -> Self {
        Self {
            store,
            workspace,
            config,
            locks: KeyLocks::new(),
            poked: PokeMemory::default(),
        }
    }

    fn ctx(&self) -> Context<'_, B> {
        Context {
            store: &self.store,
            workspace: &self.workspace,
            config: &self.config,
            locks: &self.locks,
        }
    }

    pub fn store(&self) -> &RecordStore<B> {
        &self.store
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    /// Storage key of a document path, absolute or relative to the folder.
    pub fn key_for(&self, path: &Path) -> Result<StorageKey> {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.workspace
            .key_for(&path)
            .ok_or_else(|| RevtrackError::NotTracked(path.display().to_string()))
    }

    /// One document, or all of them when no path is given.
    pub fn target_for(&self, path: Option<&Path>) -> Result<Target> {
        match path {
            Some(path) => Ok(Target::Key(self.key_for(path)?)),
            None => Ok(Target::All),
        }
    }

    // --- Setup ---

    pub fn tracking_init(&self, path: &Path) -> Result<InitReport> {
        let key = self.key_for(path)?;
        commands::init::run(self.ctx(), &self.workspace.document_path(&key))
    }

    pub fn init_all(&self) -> Result<InitAllReport> {
        commands::init::run_all(self.ctx())
    }

    // --- Reconciliation ---

    pub fn sync(&self) -> Result<SyncReport> {
        commands::sync::run(self.ctx())
    }

    pub fn scan_issues(&self) -> Result<Vec<Issue>> {
        commands::scan::run(self.ctx())
    }

    pub fn fix(&self, selection: IssueSelection) -> Result<FixReport> {
        commands::fix::run(self.ctx(), selection)
    }

    pub fn repair(&self) -> Result<RepairReport> {
        commands::fix::repair(self.ctx())
    }

    pub fn remove_orphans(&self) -> Result<OrphanReport> {
        commands::fix::remove_orphans(self.ctx())
    }

    pub fn untrack(&self, path: &Path) -> Result<UntrackReport> {
        let key = self.key_for(path)?;
        commands::fix::untrack(self.ctx(), &key)
    }

    // --- Revisions and history ---

    pub fn bump(&self, target: &Target) -> Result<BumpReport> {
        commands::bump::run(self.ctx(), target, BumpKind::Revision)
    }

    pub fn merge(&self, target: &Target) -> Result<BumpReport> {
        commands::bump::run(self.ctx(), target, BumpKind::Major)
    }

    pub fn archive(&self, target: &Target) -> Result<ArchiveReport> {
        commands::archive::run(self.ctx(), target)
    }

    pub fn record_history(&self, path: &Path, limit: Option<usize>) -> Result<HistoryView> {
        let key = self.key_for(path)?;
        commands::history::run(self.ctx(), &key, limit)
    }

    pub fn compact(&self, target: &Target) -> Result<Vec<RecordStats>> {
        commands::compact::run(self.ctx(), target)
    }

    pub fn status(&self) -> Result<StatusReport> {
        commands::status::run(self.ctx())
    }

    // --- Change detection ---

    pub fn on_created(&self, path: &Path) -> Result<SaveOutcome> {
        commands::save::on_created(self.ctx(), path)
    }

    pub fn on_modified(&self, path: &Path) -> Result<SaveOutcome> {
        commands::save::on_modified(self.ctx(), path)
    }

    pub fn on_moved(&self, from: &Path, to: &Path) -> Result<SaveOutcome> {
        commands::save::on_moved(self.ctx(), from, to)
    }

    pub fn poll_tick(&self) -> Result<PollOutcome> {
        commands::poll::tick(self.ctx(), &self.poked)
    }
}
