//! Correcting what `scan` finds, and the heavier repair operations.
//!
//! - [`run`]: applies auto-fixable issues. Orphans lose their record (the snapshot stays),
//!   large records are archived. Stale and broken references are only counted.
//! - [`repair`]: recreates missing snapshots and records for trackable documents, then syncs.
//! - [`remove_orphans`]: deletes every orphaned record.
//! - [`untrack`]: moves a document's record and snapshot aside into `removed/`.

use crate::commands::archive::archive_locked;
use crate::commands::scan::{self, Issue, IssueKind};
use crate::commands::sync::{self, SyncReport};
use crate::commands::Context;
use crate::error::{Result, RevtrackError};
use crate::header;
use crate::model::{now, DocumentRecord, StorageKey};
use crate::store::StorageBackend;
use serde::Serialize;

#[derive(Debug, Clone)]
pub enum IssueSelection {
    /// Scan again and fix everything fixable.
    AllFixable,
    Only(Vec<Issue>),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FixReport {
    pub fixed: Vec<Issue>,
    pub skipped: Vec<Issue>,
    /// Pointers of archives written while fixing large records.
    pub archives: Vec<String>,
}

pub fn run<B: StorageBackend>(ctx: Context<'_, B>, selection: IssueSelection) -> Result<FixReport> {
    let issues = match selection {
        IssueSelection::AllFixable => scan::run(ctx)?,
        IssueSelection::Only(issues) => issues,
    };

    let mut report = FixReport::default();
    for issue in issues {
        if !issue.auto_fixable {
            report.skipped.push(issue);
            continue;
        }
        let _guard = ctx.locks.lock(&issue.key);
        let fixed = match issue.kind {
            IssueKind::Orphan => delete_orphan_locked(ctx, &issue.key)?,
            IssueKind::Large => match archive_locked(ctx, &issue.key)? {
                Some(archived) => {
                    report.archives.push(archived.pointer);
                    true
                }
                None => false,
            },
            IssueKind::Stale | IssueKind::Broken => false,
        };
        if fixed {
            tracing::info!(kind = %issue.kind, subject = %issue.subject, "issue fixed");
            report.fixed.push(issue);
        } else {
            report.skipped.push(issue);
        }
    }
    Ok(report)
}

/// Deletes the record only while its document is still missing.
fn delete_orphan_locked<B: StorageBackend>(ctx: Context<'_, B>, key: &StorageKey) -> Result<bool> {
    if ctx.workspace.document_path(key).exists() {
        return Ok(false);
    }
    ctx.store.delete_record(key)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub snapshots_created: usize,
    pub records_created: usize,
    pub sync: SyncReport,
}

/// Recreate missing state for every trackable document. Headers are never touched.
pub fn repair<B: StorageBackend>(ctx: Context<'_, B>) -> Result<RepairReport> {
    let mut report = RepairReport::default();
    for (path, content) in ctx.workspace.trackable(ctx.config)? {
        let Some(key) = ctx.workspace.key_for(&path) else {
            continue;
        };
        let _guard = ctx.locks.lock(&key);
        if !ctx.store.has_snapshot(&key)? {
            ctx.store.put_snapshot(&key, &content)?;
            report.snapshots_created += 1;
        }
        if !ctx.store.has_record(&key)? {
            let version = header::header_revision(&content).unwrap_or_default();
            let mut record = DocumentRecord::new(key.display_path(), version);
            record.append_history("initialized", Vec::new());
            ctx.store.save(&key, &record)?;
            report.records_created += 1;
        }
    }
    report.sync = sync::run(ctx)?;
    Ok(report)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrphanReport {
    pub removed: Vec<String>,
}

pub fn remove_orphans<B: StorageBackend>(ctx: Context<'_, B>) -> Result<OrphanReport> {
    let mut report = OrphanReport::default();
    for key in ctx.store.record_keys()? {
        let _guard = ctx.locks.lock(&key);
        if delete_orphan_locked(ctx, &key)? {
            report.removed.push(key.display_path());
        }
    }
    Ok(report)
}

#[derive(Debug, Clone, Serialize)]
pub struct UntrackReport {
    pub file: String,
    pub key: StorageKey,
}

/// Stop tracking a document. Its record and snapshot are kept in `removed/`, its header is
/// left alone, and it leaves the index.
pub fn untrack<B: StorageBackend>(ctx: Context<'_, B>, key: &StorageKey) -> Result<UntrackReport> {
    {
        let _guard = ctx.locks.lock(key);
        if !ctx.store.retire(key, &now())? {
            return Err(RevtrackError::NotTracked(key.display_path()));
        }
    }
    let mut index = ctx.store.load_index()?;
    if index.remove(key).is_some() {
        ctx.store.save_index(&index)?;
    }
    tracing::info!(file = %key.display_path(), "untracked");
    Ok(UntrackReport {
        file: key.display_path(),
        key: key.clone(),
    })
}
