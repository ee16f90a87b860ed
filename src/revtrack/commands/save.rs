//! The save pipeline: what happens when a document is created, modified or moved.
//!
//! Every entry point takes the storage key lock first and then works through the
//! `*_locked` helpers, which assume the lock is held.
//!
//! A modification of a tracked document goes:
//! 1. read the document, ignore it without a tracking header
//! 2. compare the header revision with the record's revision; a different base letter
//!    is a rebase: the history is archived and the record starts over
//! 3. otherwise diff the last snapshot against the content; nothing changed, nothing written
//! 4. append `save:<n>` with the bounded diff, write the record, then the snapshot
//!
//! The record is written before the snapshot. A failure in between leaves the snapshot
//! behind, and the next event records the same change again rather than losing it.

use crate::commands::archive;
use crate::commands::Context;
use crate::diff::diff_with;
use crate::error::Result;
use crate::folder::read_document;
use crate::header;
use crate::model::{now, Change, DocumentRecord, StorageKey};
use crate::revision::RevisionId;
use crate::store::StorageBackend;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    Ignored {
        path: String,
        reason: String,
    },
    Unchanged {
        file: String,
    },
    Created {
        file: String,
    },
    Saved {
        file: String,
        label: String,
        added: usize,
        removed: usize,
    },
    Renamed {
        from: String,
        to: String,
    },
    Rebased {
        file: String,
        from: RevisionId,
        to: RevisionId,
        archive: Option<String>,
    },
}

impl SaveOutcome {
    fn ignored(path: &Path, reason: &str) -> Self {
        SaveOutcome::Ignored {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// One-line description for the session log. `None` for outcomes not worth logging.
    pub fn event_label(&self) -> Option<String> {
        match self {
            SaveOutcome::Ignored { .. } | SaveOutcome::Unchanged { .. } => None,
            SaveOutcome::Created { file } => Some(format!("created {}", file)),
            SaveOutcome::Saved {
                file,
                label,
                added,
                removed,
            } => Some(format!("{} {} +{} -{}", label, file, added, removed)),
            SaveOutcome::Renamed { from, to } => Some(format!("renamed {} -> {}", from, to)),
            SaveOutcome::Rebased { file, from, to, .. } => {
                Some(format!("rebased {} {} -> {}", file, from, to))
            }
        }
    }

    pub fn is_recorded(&self) -> bool {
        self.event_label().is_some()
    }
}

pub fn on_created<B: StorageBackend>(ctx: Context<'_, B>, path: &Path) -> Result<SaveOutcome> {
    let Some(key) = tracked_key(ctx, path) else {
        return Ok(SaveOutcome::ignored(path, "not a tracked location"));
    };
    let _guard = ctx.locks.lock(&key);
    create_or_save_locked(ctx, &key, path)
}

pub fn on_modified<B: StorageBackend>(ctx: Context<'_, B>, path: &Path) -> Result<SaveOutcome> {
    let Some(key) = tracked_key(ctx, path) else {
        return Ok(SaveOutcome::ignored(path, "not a tracked location"));
    };
    let _guard = ctx.locks.lock(&key);
    save_locked(ctx, &key, path)
}

/// A rename inside the folder. The record and snapshot follow the document.
///
/// Editors often save by writing a temporary file and renaming it over the original.
/// The temporary file has no record, so such a move is handled as a change to the
/// destination.
pub fn on_moved<B: StorageBackend>(
    ctx: Context<'_, B>,
    from: &Path,
    to: &Path,
) -> Result<SaveOutcome> {
    let Some(to_key) = tracked_key(ctx, to) else {
        tracing::debug!(from = %from.display(), to = %to.display(), "move out of tracking");
        return Ok(SaveOutcome::ignored(to, "destination is not tracked"));
    };
    let Some(from_key) = ctx.workspace.key_for(from) else {
        return on_created(ctx, to);
    };
    if from_key == to_key {
        return on_modified(ctx, to);
    }

    let _guards = ctx.locks.lock_pair(&from_key, &to_key);
    if !ctx.store.has_record(&from_key)? {
        return create_or_save_locked(ctx, &to_key, to);
    }

    let from_display = from_key.display_path();
    let to_display = to_key.display_path();
    ctx.store.relocate(&from_key, &to_key)?;
    let mut record = ctx.store.load(&to_key)?;
    record.meta.file = to_display.clone();
    record.append_history(format!("renamed {} -> {}", from_display, to_display), Vec::new());
    ctx.store.save(&to_key, &record)?;

    tracing::info!(from = %from_display, to = %to_display, "document renamed");
    Ok(SaveOutcome::Renamed {
        from: from_display,
        to: to_display,
    })
}

/// Key of a path that passes the folder's extension, ignore and location rules.
fn tracked_key<B: StorageBackend>(ctx: Context<'_, B>, path: &Path) -> Option<StorageKey> {
    if !ctx.workspace.is_candidate(ctx.config, path) {
        return None;
    }
    ctx.workspace.key_for(path)
}

pub(crate) fn create_or_save_locked<B: StorageBackend>(
    ctx: Context<'_, B>,
    key: &StorageKey,
    path: &Path,
) -> Result<SaveOutcome> {
    if ctx.store.has_record(key)? {
        return save_locked(ctx, key, path);
    }
    let Some(content) = read_document(path)? else {
        return Ok(SaveOutcome::ignored(path, "unreadable"));
    };
    if !header::has_header(&content) {
        return Ok(SaveOutcome::ignored(path, "no tracking header"));
    }

    let file = key.display_path();
    let version = header::header_revision(&content).unwrap_or_default();
    let mut record = DocumentRecord::new(file.clone(), version);
    record.append_history("created", Vec::new());
    ctx.store.save(key, &record)?;
    ctx.store.put_snapshot(key, &content)?;

    tracing::info!(file = %file, version = %version, "tracking new document");
    Ok(SaveOutcome::Created { file })
}

pub(crate) fn save_locked<B: StorageBackend>(
    ctx: Context<'_, B>,
    key: &StorageKey,
    path: &Path,
) -> Result<SaveOutcome> {
    let Some(content) = read_document(path)? else {
        return Ok(SaveOutcome::ignored(path, "unreadable"));
    };
    if !header::has_header(&content) {
        tracing::debug!(path = %path.display(), "no tracking header, skipping");
        return Ok(SaveOutcome::ignored(path, "no tracking header"));
    }

    let file = key.display_path();
    let declared = header::header_revision(&content);
    let mut record = match ctx.store.find(key)? {
        Some(record) => record,
        None => DocumentRecord::new(file.clone(), declared.unwrap_or_default()),
    };
    // an unreadable version field is not a rebase
    let header_rev = declared.unwrap_or(record.meta.version);

    if RevisionId::is_rebase(&record.meta.version, &header_rev) {
        return rebase_locked(ctx, key, record, header_rev);
    }

    let snapshot = ctx.store.snapshot(key)?.unwrap_or_default();
    let diff = diff_with(&snapshot, &content, ctx.config.diff_options());
    if !diff.has_changes() {
        return Ok(SaveOutcome::Unchanged { file });
    }

    record.meta.pending_saves += 1;
    let label = format!("save:{}", record.meta.pending_saves);
    record.append_history(label.clone(), Change::from_diff(&diff));
    record.meta.file = file.clone();
    record.meta.version = header_rev;
    ctx.store.save(key, &record)?;
    ctx.store.put_snapshot(key, &content)?;

    tracing::info!(
        file = %file,
        label = %label,
        added = diff.added.len(),
        removed = diff.removed.len(),
        "save recorded"
    );
    Ok(SaveOutcome::Saved {
        file,
        label,
        added: diff.added.len(),
        removed: diff.removed.len(),
    })
}

/// Start a new lineage: the old history goes to an archive side-file and the record
/// restarts at the header's revision with an empty baseline.
fn rebase_locked<B: StorageBackend>(
    ctx: Context<'_, B>,
    key: &StorageKey,
    old: DocumentRecord,
    header_rev: RevisionId,
) -> Result<SaveOutcome> {
    let file = key.display_path();
    let from = old.meta.version;
    let pointer = if old.history.is_empty() {
        None
    } else {
        let side_file = archive::side_file(key, &old, now());
        Some(ctx.store.write_archive(key, &side_file)?)
    };

    let mut fresh = DocumentRecord::new(file.clone(), header_rev);
    fresh.meta.archive_pointers = old.meta.archive_pointers;
    fresh.meta.archive_pointers.extend(pointer.clone());
    fresh.meta.ref_versions = old.meta.ref_versions;
    fresh.append_history(format!("rebased {} -> {}", from, header_rev), Vec::new());
    ctx.store.save(key, &fresh)?;
    ctx.store.put_snapshot(key, "")?;

    tracing::info!(file = %file, from = %from, to = %header_rev, "rebased");
    Ok(SaveOutcome::Rebased {
        file,
        from,
        to: header_rev,
        archive: pointer,
    })
}
