//! Moving history out of a record into an archive side-file.
//!
//! The side-file keeps the full history plus provenance. The record keeps a single
//! `archived <n> entries to <pointer>` entry and the pointer in its `archive` list, so the
//! chain of side-files can always be followed back.

use crate::commands::helpers::target_keys;
use crate::commands::{Context, Target};
use crate::error::{Result, RevtrackError};
use crate::model::{now, DocumentRecord, StorageKey};
use crate::store::{ArchiveFile, StorageBackend};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archived {
    pub file: String,
    pub entries: usize,
    pub pointer: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveReport {
    pub archived: Vec<Archived>,
}

/// The side-file for a record's current history.
pub fn side_file(key: &StorageKey, record: &DocumentRecord, at: DateTime<Utc>) -> ArchiveFile {
    ArchiveFile {
        source: key.to_string(),
        file: record.meta.file.clone(),
        version: record.meta.version,
        pending_saves: record.meta.pending_saves,
        ref_versions: record.meta.ref_versions.clone(),
        archived_at: Some(at),
        history: record.history.clone(),
    }
}

/// Archive one document unconditionally, or every record over the threshold.
pub fn run<B: StorageBackend>(ctx: Context<'_, B>, target: &Target) -> Result<ArchiveReport> {
    let mut report = ArchiveReport::default();
    for key in target_keys(ctx, target)? {
        let _guard = ctx.locks.lock(&key);
        if *target == Target::All {
            let Some(record) = ctx.store.find(&key)? else {
                continue;
            };
            if record.history.len() <= ctx.config.archive_threshold {
                continue;
            }
        }
        if let Some(archived) = archive_locked(ctx, &key)? {
            report.archived.push(archived);
        }
    }
    Ok(report)
}

/// `None` when the record has no history to move.
pub(crate) fn archive_locked<B: StorageBackend>(
    ctx: Context<'_, B>,
    key: &StorageKey,
) -> Result<Option<Archived>> {
    let mut record = ctx
        .store
        .find(key)?
        .ok_or_else(|| RevtrackError::NotTracked(key.display_path()))?;
    if record.history.is_empty() {
        return Ok(None);
    }

    let entries = record.history.len();
    let pointer = ctx
        .store
        .write_archive(key, &side_file(key, &record, now()))?;
    record.history.clear();
    record.append_history(
        format!("archived {} entries to {}", entries, pointer),
        Vec::new(),
    );
    record.meta.archive_pointers.push(pointer.clone());
    ctx.store.save(key, &record)?;

    tracing::info!(file = %record.meta.file, entries, pointer = %pointer, "history archived");
    Ok(Some(Archived {
        file: record.meta.file,
        entries,
        pointer,
    }))
}
