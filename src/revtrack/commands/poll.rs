//! Fallback change detection.
//!
//! Some edits never reach the notifier (network shares, editors that write through odd
//! paths). Each tick looks at the most recently modified trackable document and compares
//! it with its snapshot. When they disagree, the document is rewritten with its own
//! content, which makes the notifier fire and the save pipeline run as usual. The poll
//! itself never records anything. A document without a snapshot is left to scan and fix.
//!
//! The fingerprint left by a poke is remembered, so a document the notifier still ignores
//! is poked once, not on every tick.

use crate::commands::Context;
use crate::error::Result;
use crate::folder::{self, line_count, read_document, Fingerprint};
use crate::header;
use crate::store::fs_backend::write_atomic;
use crate::store::StorageBackend;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "poll", rename_all = "snake_case")]
pub enum PollOutcome {
    /// No trackable documents.
    Idle,
    InSync { file: String },
    Poked { file: String },
    AlreadyPoked { file: String },
    /// The document changed while it was being looked at. The next tick tries again.
    Changing { file: String },
}

pub type PokeMemory = Mutex<HashMap<PathBuf, Fingerprint>>;

pub fn tick<B: StorageBackend>(ctx: Context<'_, B>, poked: &PokeMemory) -> Result<PollOutcome> {
    let Some((path, content, modified)) = most_recent_trackable(ctx)? else {
        return Ok(PollOutcome::Idle);
    };
    let Some(key) = ctx.workspace.key_for(&path) else {
        return Ok(PollOutcome::Idle);
    };
    let file = key.display_path();
    let fingerprint = Fingerprint {
        modified,
        lines: line_count(&content),
    };

    let _guard = ctx.locks.lock(&key);
    let (Some(snapshot), Some(taken)) = (
        ctx.store.snapshot(&key)?,
        ctx.store.snapshot_modified(&key)?,
    ) else {
        poked.lock().remove(&path);
        return Ok(PollOutcome::InSync { file });
    };
    let diverged = fingerprint.modified > taken || line_count(&snapshot) != fingerprint.lines;
    if !diverged {
        poked.lock().remove(&path);
        return Ok(PollOutcome::InSync { file });
    }
    if poked.lock().get(&path) == Some(&fingerprint) {
        return Ok(PollOutcome::AlreadyPoked { file });
    }

    if folder::modified(&path)? != Some(fingerprint.modified) {
        return Ok(PollOutcome::Changing { file });
    }
    write_atomic(&path, &content)?;
    let after = folder::modified(&path)?.unwrap_or(fingerprint.modified);
    poked.lock().insert(
        path,
        Fingerprint {
            modified: after,
            lines: fingerprint.lines,
        },
    );

    tracing::debug!(file = %file, "poked document the notifier missed");
    Ok(PollOutcome::Poked { file })
}

/// The newest candidate that carries a tracking header, with its content and mtime.
fn most_recent_trackable<B: StorageBackend>(
    ctx: Context<'_, B>,
) -> Result<Option<(PathBuf, String, chrono::DateTime<chrono::Utc>)>> {
    let mut dated = Vec::new();
    for path in ctx.workspace.candidates(ctx.config)? {
        if let Some(modified) = folder::modified(&path)? {
            dated.push((modified, path));
        }
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    for (modified, path) in dated {
        if let Some(content) = read_document(&path)? {
            if header::has_header(&content) {
                return Ok(Some((path, content, modified)));
            }
        }
    }
    Ok(None)
}
