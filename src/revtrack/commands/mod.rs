use crate::config::TrackConfig;
use crate::folder::Workspace;
use crate::locks::KeyLocks;
use crate::model::StorageKey;
use crate::store::{RecordStore, StorageBackend};

pub mod archive;
pub mod bump;
pub mod compact;
pub mod fix;
pub mod helpers;
pub mod history;
pub mod init;
pub mod poll;
pub mod save;
pub mod scan;
pub mod status;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

/// Everything a command needs: where records live, the folder they describe, its
/// settings, and the per-key locks shared with the watcher threads.
pub struct Context<'a, B: StorageBackend> {
    pub store: &'a RecordStore<B>,
    pub workspace: &'a Workspace,
    pub config: &'a TrackConfig,
    pub locks: &'a KeyLocks,
}

impl<B: StorageBackend> Clone for Context<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: StorageBackend> Copy for Context<'_, B> {}

/// Which records a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Key(StorageKey),
}
