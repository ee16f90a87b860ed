use crate::commands::Context;
use crate::error::Result;
use crate::revision::RevisionId;
use crate::store::StorageBackend;
use crate::watch::marker;
use crate::watch::session::SessionLog;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct PendingDocument {
    pub file: String,
    pub version: RevisionId,
    pub pending_saves: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WatcherState {
    pub running: bool,
    pub pid: Option<u32>,
    pub started: Option<DateTime<Utc>>,
    pub events: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub folder: PathBuf,
    pub tracked: usize,
    /// Records with saves not yet closed by a bump.
    pub pending: Vec<PendingDocument>,
    pub watcher: WatcherState,
}

pub fn run<B: StorageBackend>(ctx: Context<'_, B>) -> Result<StatusReport> {
    let keys = ctx.store.record_keys()?;
    let mut pending = Vec::new();
    for key in &keys {
        let record = ctx.store.load(key)?;
        if record.meta.pending_saves > 0 {
            pending.push(PendingDocument {
                file: record.meta.file,
                version: record.meta.version,
                pending_saves: record.meta.pending_saves,
            });
        }
    }

    let mut watcher = WatcherState::default();
    if let Some(info) = marker::active(ctx.store)? {
        watcher.running = true;
        watcher.pid = Some(info.pid);
        watcher.started = info.started;
        if let Some(session) = SessionLog::load_current(ctx.store)? {
            watcher.started = session.started.or(watcher.started);
            watcher.events = Some(session.events);
        }
    }

    Ok(StatusReport {
        folder: ctx.workspace.root().to_path_buf(),
        tracked: keys.len(),
        pending,
        watcher,
    })
}
