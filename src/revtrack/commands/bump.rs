//! Revision bumps.
//!
//! A revision bump closes a run of saves: `r` goes up by one, pending saves reset to zero
//! and `bumped <rev>` is appended. Records without pending saves are left alone. A major
//! bump (`merge`) always applies: `v` goes up, `r` restarts at 1, `merged <rev>` is appended.
//!
//! The record is saved first and the new revision is then written into the document
//! header. The same edit is applied to
//! the snapshot, so the header change never shows up as a save while any edits that were
//! not yet recorded still do.

use crate::commands::helpers::target_keys;
use crate::commands::{Context, Target};
use crate::error::{Result, RevtrackError};
use crate::folder::read_document;
use crate::header;
use crate::model::StorageKey;
use crate::revision::RevisionId;
use crate::store::fs_backend::write_atomic;
use crate::store::StorageBackend;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    Revision,
    Major,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bumped {
    pub file: String,
    pub from: RevisionId,
    pub to: RevisionId,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BumpReport {
    pub bumped: Vec<Bumped>,
}

pub fn run<B: StorageBackend>(
    ctx: Context<'_, B>,
    target: &Target,
    kind: BumpKind,
) -> Result<BumpReport> {
    let mut report = BumpReport::default();
    for key in target_keys(ctx, target)? {
        let _guard = ctx.locks.lock(&key);
        match bump_locked(ctx, &key, kind) {
            Ok(Some(bumped)) => report.bumped.push(bumped),
            Ok(None) => {}
            Err(RevtrackError::NoHeader(path)) if matches!(target, Target::All) => {
                tracing::warn!(path = %path.display(), "no header to carry the new revision");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(report)
}

fn bump_locked<B: StorageBackend>(
    ctx: Context<'_, B>,
    key: &StorageKey,
    kind: BumpKind,
) -> Result<Option<Bumped>> {
    let mut record = ctx
        .store
        .find(key)?
        .ok_or_else(|| RevtrackError::NotTracked(key.display_path()))?;
    if kind == BumpKind::Revision && record.meta.pending_saves == 0 {
        return Ok(None);
    }

    let from = record.meta.version;
    let (to, label) = match kind {
        BumpKind::Revision => {
            let to = from.bump_revision();
            (to, format!("bumped {}", to))
        }
        BumpKind::Major => {
            let to = from.bump_major();
            (to, format!("merged {}", to))
        }
    };

    let path = ctx.workspace.document_path(key);
    let content = read_document(&path)?;
    let version = to.to_string();
    let updated = match &content {
        Some(text) => Some(
            header::set_field(text, "version", &version)
                .ok_or_else(|| RevtrackError::NoHeader(path.clone()))?,
        ),
        None => None,
    };

    let previous = record.clone();
    record.meta.version = to;
    record.meta.pending_saves = 0;
    record.append_history(label, Vec::new());
    ctx.store.save(key, &record)?;

    if let (Some(original), Some(updated)) = (content, updated) {
        if let Err(err) = write_header_version(ctx, key, &original, &updated, &version) {
            if let Err(restore) = ctx.store.save(key, &previous) {
                tracing::error!(file = %record.meta.file, error = %restore, "record left at the new revision");
            }
            return Err(err);
        }
    }

    tracing::info!(file = %record.meta.file, from = %from, to = %to, "revision bumped");
    Ok(Some(Bumped {
        file: record.meta.file,
        from,
        to,
    }))
}

/// Write the new header into the document and mirror the edit into the snapshot. The
/// document goes back to `original` when the snapshot cannot be written.
fn write_header_version<B: StorageBackend>(
    ctx: Context<'_, B>,
    key: &StorageKey,
    original: &str,
    updated: &str,
    version: &str,
) -> Result<()> {
    let path = ctx.workspace.document_path(key);
    write_atomic(&path, updated)?;

    let snapshot = ctx
        .store
        .snapshot(key)?
        .and_then(|text| header::set_field(&text, "version", version))
        .unwrap_or_else(|| updated.to_string());
    if let Err(err) = ctx.store.put_snapshot(key, &snapshot) {
        write_atomic(&path, original)?;
        return Err(err);
    }
    Ok(())
}
