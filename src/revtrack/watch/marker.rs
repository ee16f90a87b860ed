//! The liveness marker: `session/watcher.pid`.
//!
//! It is the only thing that decides whether a watcher runs for a folder. A marker whose
//! process is gone is stale and gets replaced.

use crate::error::{Result, RevtrackError};
use crate::markup::{self, Block, FieldValue, MarkupDocument};
use crate::model::{format_timestamp, now, parse_timestamp};
use crate::store::{Area, RecordStore, StorageBackend};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MARKER_NAME: &str = "watcher.pid";
const MARKER_BLOCK: &str = "watcher";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerInfo {
    pub pid: u32,
    pub started: Option<DateTime<Utc>>,
}

#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // signal 0 only checks that the process exists and may be signalled
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    true
}

pub fn read<B: StorageBackend>(store: &RecordStore<B>) -> Result<Option<MarkerInfo>> {
    let Some(text) = store.backend().read(Area::Session, MARKER_NAME)? else {
        return Ok(None);
    };
    let Some(block) = markup::find_block(&text, MARKER_BLOCK) else {
        return Ok(None);
    };
    let pid = block.fields.get_str("pid").and_then(|p| p.trim().parse().ok());
    Ok(pid.map(|pid| MarkerInfo {
        pid,
        started: block.fields.get_str("started").and_then(parse_timestamp),
    }))
}

/// The marker, if its process is still alive.
pub fn active<B: StorageBackend>(store: &RecordStore<B>) -> Result<Option<MarkerInfo>> {
    Ok(read(store)?.filter(|info| process_alive(info.pid)))
}

/// Claim the folder for this process.
///
/// The marker is created exclusively. An existing one is only replaced when the process
/// it names is gone.
pub fn acquire<B: StorageBackend>(store: &RecordStore<B>) -> Result<MarkerInfo> {
    let info = MarkerInfo {
        pid: std::process::id(),
        started: Some(now()),
    };
    let mut block = Block::new(MARKER_BLOCK).with_field("pid", FieldValue::scalar(info.pid.to_string()));
    if let Some(started) = &info.started {
        block = block.with_field("started", FieldValue::scalar(format_timestamp(started)));
    }
    let text = markup::render(&MarkupDocument::new().with_block(block));

    if store.backend().create_new(Area::Session, MARKER_NAME, &text)? {
        return Ok(info);
    }
    let stale = read(store)?;
    if let Some(holder) = stale.as_ref().filter(|holder| process_alive(holder.pid)) {
        return Err(RevtrackError::AlreadyRunning { pid: holder.pid });
    }
    // another starter may have reclaimed it in the meantime
    if read(store)? != stale {
        return Err(contended(store)?);
    }
    tracing::info!(pid = ?stale.map(|s| s.pid), "replacing stale watcher marker");
    store.backend().delete(Area::Session, MARKER_NAME)?;
    if store.backend().create_new(Area::Session, MARKER_NAME, &text)? {
        return Ok(info);
    }
    Err(contended(store)?)
}

fn contended<B: StorageBackend>(store: &RecordStore<B>) -> Result<RevtrackError> {
    Ok(match read(store)? {
        Some(holder) => RevtrackError::AlreadyRunning { pid: holder.pid },
        None => RevtrackError::Store("watcher marker is being replaced".to_string()),
    })
}

/// Remove the marker if this process holds it.
pub fn release<B: StorageBackend>(store: &RecordStore<B>) -> Result<bool> {
    match read(store)? {
        Some(info) if info.pid == std::process::id() => {
            store.backend().delete(Area::Session, MARKER_NAME)
        }
        _ => Ok(false),
    }
}
