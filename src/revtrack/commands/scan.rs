//! Consistency checks between records and the folder.
//!
//! | kind   | condition                                        | auto-fixable |
//! |--------|--------------------------------------------------|--------------|
//! | orphan | a record exists, its document does not           | yes          |
//! | large  | history longer than `archive_threshold`          | yes          |
//! | stale  | a referenced document moved on since last sync   | no           |
//! | broken | a declared reference does not exist              | no           |
//!
//! Scanning only reports. Nothing is corrected until `fix` is asked to.

use crate::commands::helpers::reference_revision;
use crate::commands::Context;
use crate::error::Result;
use crate::folder::read_document;
use crate::header;
use crate::model::StorageKey;
use crate::store::StorageBackend;
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueKind {
    Orphan,
    Large,
    Stale,
    Broken,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::Orphan => "ORPHAN",
            IssueKind::Large => "LARGE",
            IssueKind::Stale => "STALE",
            IssueKind::Broken => "BROKEN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub auto_fixable: bool,
    pub subject: String,
    pub detail: String,
    pub key: StorageKey,
}

impl Issue {
    fn new(kind: IssueKind, subject: &str, detail: String, key: &StorageKey) -> Self {
        Self {
            kind,
            auto_fixable: matches!(kind, IssueKind::Orphan | IssueKind::Large),
            subject: subject.to_string(),
            detail,
            key: key.clone(),
        }
    }
}

/// Issues in record key order. Within a record: orphan, or else large, stale, broken.
pub fn run<B: StorageBackend>(ctx: Context<'_, B>) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    for key in ctx.store.record_keys()? {
        let record = ctx.store.load(&key)?;
        let subject = if record.meta.file.is_empty() {
            key.display_path()
        } else {
            record.meta.file.clone()
        };

        let path = ctx.workspace.document_path(&key);
        if !path.exists() {
            issues.push(Issue::new(
                IssueKind::Orphan,
                &subject,
                "document not found".to_string(),
                &key,
            ));
            continue;
        }

        if record.history.len() > ctx.config.archive_threshold {
            issues.push(Issue::new(
                IssueKind::Large,
                &subject,
                format!(
                    "{} history entries (threshold {})",
                    record.history.len(),
                    ctx.config.archive_threshold
                ),
                &key,
            ));
        }

        let Some(content) = read_document(&path)? else {
            continue;
        };
        let mut stale = Vec::new();
        let mut broken = Vec::new();
        for reference in header::declared_refs(&content) {
            if !ctx.workspace.resolve(&reference).exists() {
                broken.push(short_name(&reference));
                continue;
            }
            let current = reference_revision(ctx.workspace, &reference)?;
            let recorded = record.meta.ref_versions.get(&reference);
            if let (Some(recorded), Some(current)) = (recorded, current) {
                if *recorded != Some(current) {
                    stale.push(short_name(&reference));
                }
            }
        }
        if !stale.is_empty() {
            issues.push(Issue::new(
                IssueKind::Stale,
                &subject,
                format!("refs changed: {}", stale.join(", ")),
                &key,
            ));
        }
        if !broken.is_empty() {
            issues.push(Issue::new(
                IssueKind::Broken,
                &subject,
                format!("refs not found: {}", broken.join(", ")),
                &key,
            ));
        }
    }
    Ok(issues)
}

fn short_name(reference: &str) -> String {
    Path::new(reference)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| reference.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Fixture;
    use crate::commands::{save, sync};
    use crate::config::TrackConfig;
    use std::fs;

    fn with_refs(fx: &Fixture, rel: &str, refs: &str) {
        let path = fx.root().join(rel);
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, header::set_field(&text, "refs", refs).unwrap()).unwrap();
    }

    #[test]
    fn clean_folder_has_no_issues() {
        let fx = Fixture::new();
        fx.tracked("a.txt", "alpha\n");
        assert!(run(fx.ctx()).unwrap().is_empty());
    }

    #[test]
    fn deleted_document_is_an_orphan() {
        let fx = Fixture::new();
        let path = fx.tracked("a.txt", "alpha\n");
        fs::remove_file(path).unwrap();

        let issues = run(fx.ctx()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Orphan);
        assert!(issues[0].auto_fixable);
        assert_eq!(issues[0].subject, "./a.txt");
        assert_eq!(issues[0].key, fx.key("a.txt"));
    }

    #[test]
    fn long_history_is_large() {
        let fx = Fixture::with_config(TrackConfig {
            archive_threshold: 2,
            ..TrackConfig::default()
        });
        let path = fx.tracked("a.txt", "alpha\n");
        for line in ["b\n", "c\n"] {
            fx.append(&path, line);
            save::on_modified(fx.ctx(), &path).unwrap();
        }

        let issues = run(fx.ctx()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Large);
        assert_eq!(issues[0].detail, "3 history entries (threshold 2)");
    }

    #[test]
    fn reference_problems_are_reported_not_fixable() {
        let fx = Fixture::new();
        let design = fx.tracked("design.txt", "design\n");
        fx.tracked("plan.txt", "plan\n");
        with_refs(&fx, "plan.txt", "./design.txt, ./gone.txt");
        sync::run(fx.ctx()).unwrap();

        let issues = run(fx.ctx()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Broken);
        assert_eq!(issues[0].detail, "refs not found: gone.txt");
        assert!(!issues[0].auto_fixable);

        fx.set_version(&design, "av1r2");
        let kinds: Vec<IssueKind> = run(fx.ctx()).unwrap().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::Stale, IssueKind::Broken]);
    }
}
