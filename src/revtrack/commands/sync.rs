//! Bring records and the index in line with the document headers.
//!
//! The header is authoritative: each record takes its file path and revision from it, and
//! its `ref_versions` are recomputed from scratch. History and pending saves are never
//! touched. A header whose base letter differs from the record is left for the save
//! pipeline, which turns it into a rebase.

use crate::commands::helpers::reference_revision;
use crate::commands::{scan, Context};
use crate::error::Result;
use crate::header;
use crate::revision::RevisionId;
use crate::store::StorageBackend;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Trackable documents seen.
    pub documents: usize,
    pub records_updated: usize,
    pub indexed: usize,
    /// Issues found by the scan that follows.
    pub issues: usize,
}

pub fn run<B: StorageBackend>(ctx: Context<'_, B>) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    let mut index = BTreeMap::new();

    for (path, content) in ctx.workspace.trackable(ctx.config)? {
        let Some(key) = ctx.workspace.key_for(&path) else {
            continue;
        };
        report.documents += 1;
        let declared = header::header_revision(&content);

        let _guard = ctx.locks.lock(&key);
        let Some(record) = ctx.store.find(&key)? else {
            index.insert(key, declared.unwrap_or_default());
            continue;
        };
        index.insert(key.clone(), declared.unwrap_or(record.meta.version));

        let mut updated = record.clone();
        updated.meta.file = key.display_path();
        if let Some(rev) = declared {
            if !RevisionId::is_rebase(&record.meta.version, &rev) {
                updated.meta.version = rev;
            }
        }
        updated.meta.ref_versions = BTreeMap::new();
        for reference in header::declared_refs(&content) {
            let current = reference_revision(ctx.workspace, &reference)?;
            updated.meta.ref_versions.insert(reference, current);
        }

        if updated != record {
            ctx.store.save(&key, &updated)?;
            report.records_updated += 1;
            tracing::debug!(file = %updated.meta.file, "record synced");
        }
    }

    report.indexed = index.len();
    ctx.store.save_index(&index)?;
    report.issues = scan::run(ctx)?.len();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Fixture;
    use std::fs;

    #[test]
    fn header_revision_flows_into_record_and_index() {
        let fx = Fixture::new();
        let path = fx.tracked("a.txt", "alpha\n");
        fx.set_version(&path, "av2r3");

        let report = run(fx.ctx()).unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.records_updated, 1);
        assert_eq!(fx.record("a.txt").meta.version.to_string(), "av2r3");

        let index = fx.store.load_index().unwrap();
        assert_eq!(index.get(&fx.key("a.txt")).map(|r| r.to_string()).as_deref(), Some("av2r3"));
    }

    #[test]
    fn sync_is_idempotent() {
        let fx = Fixture::new();
        let design = fx.tracked("design.txt", "design\n");
        let plan = fx.tracked("plan.txt", "plan\n");
        let text = fs::read_to_string(&plan).unwrap();
        fs::write(&plan, header::set_field(&text, "refs", "./design.txt").unwrap()).unwrap();
        fx.set_version(&design, "av1r4");

        let first = run(fx.ctx()).unwrap();
        assert_eq!(first.records_updated, 2);
        let records = (fx.record("design.txt"), fx.record("plan.txt"));

        let second = run(fx.ctx()).unwrap();
        assert_eq!(second.records_updated, 0);
        assert_eq!((fx.record("design.txt"), fx.record("plan.txt")), records);
        assert_eq!(
            records.1.meta.ref_versions.get("./design.txt"),
            Some(&RevisionId::parse("av1r4"))
        );
    }

    #[test]
    fn sync_leaves_history_and_saves_alone() {
        let fx = Fixture::new();
        let path = fx.tracked("a.txt", "alpha\n");
        fx.append(&path, "beta\n");
        crate::commands::save::on_modified(fx.ctx(), &path).unwrap();
        let before = fx.record("a.txt");

        run(fx.ctx()).unwrap();
        let after = fx.record("a.txt");
        assert_eq!(after.history, before.history);
        assert_eq!(after.meta.pending_saves, 1);
    }

    #[test]
    fn rebase_in_header_is_not_synced() {
        let fx = Fixture::new();
        let path = fx.tracked("a.txt", "alpha\n");
        fx.set_version(&path, "bv1r1");

        run(fx.ctx()).unwrap();
        assert_eq!(fx.record("a.txt").meta.version.to_string(), "av1r1");
        let index = fx.store.load_index().unwrap();
        assert_eq!(index[&fx.key("a.txt")].to_string(), "bv1r1");
    }

    #[test]
    fn unrecorded_documents_are_indexed_only() {
        let fx = Fixture::new();
        fx.write("loose.txt", &header::add_header("x\n", "./loose.txt", "l"));

        let report = run(fx.ctx()).unwrap();
        assert_eq!(report.indexed, 1);
        assert!(fx.find("loose.txt").is_none());
    }
}
