//! Opting documents into tracking.
//!
//! Initializing a document gives it a tracking header if it has none, a snapshot if it has
//! none, and a record with an `initialized` entry if it has none. Anything already in
//! place is kept, so initializing twice changes nothing.

use crate::commands::sync::{self, SyncReport};
use crate::commands::Context;
use crate::config::CONFIG_FILENAME;
use crate::error::{Result, RevtrackError};
use crate::folder::read_document;
use crate::header;
use crate::model::{DocumentRecord, StorageKey};
use crate::revision::RevisionId;
use crate::store::fs_backend::write_atomic;
use crate::store::{Area, StorageBackend};
use serde::Serialize;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub file: String,
    pub key: StorageKey,
    pub version: RevisionId,
    pub header_added: bool,
    pub record_created: bool,
}

pub fn run<B: StorageBackend>(ctx: Context<'_, B>, path: &Path) -> Result<InitReport> {
    if !ctx.workspace.is_candidate(ctx.config, path) {
        return Err(RevtrackError::NotTracked(format!(
            "{} is not a trackable location",
            path.display()
        )));
    }
    let key = ctx
        .workspace
        .key_for(path)
        .ok_or_else(|| RevtrackError::NotTracked(path.display().to_string()))?;
    let path = ctx.workspace.document_path(&key);

    let _guard = ctx.locks.lock(&key);
    let mut content = read_document(&path)?.ok_or_else(|| {
        RevtrackError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        ))
    })?;

    let file = key.display_path();
    let header_added = !header::has_header(&content);
    if header_added {
        let log = ctx.store.pointer(Area::Records, key.as_str());
        content = header::add_header(&content, &file, &log);
        write_atomic(&path, &content)?;
        tracing::info!(file = %file, "tracking header added");
    }

    if header_added || !ctx.store.has_snapshot(&key)? {
        ctx.store.put_snapshot(&key, &content)?;
    }

    let version = header::header_revision(&content).unwrap_or_default();
    let record_created = !ctx.store.has_record(&key)?;
    if record_created {
        let mut record = DocumentRecord::new(file.clone(), version);
        record.append_history("initialized", Vec::new());
        ctx.store.save(&key, &record)?;
    }

    Ok(InitReport {
        file,
        key,
        version,
        header_added,
        record_created,
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InitAllReport {
    pub config_written: bool,
    pub documents: Vec<InitReport>,
    pub sync: SyncReport,
}

/// Initialize every candidate document in the folder, then sync.
///
/// Writes the default config first when the folder has none.
pub fn run_all<B: StorageBackend>(ctx: Context<'_, B>) -> Result<InitAllReport> {
    let mut report = InitAllReport::default();
    if !ctx.store.backend().exists(Area::Root, CONFIG_FILENAME)? {
        ctx.store.save_config(ctx.config)?;
        report.config_written = true;
    }
    for path in ctx.workspace.candidates(ctx.config)? {
        match run(ctx, &path) {
            Ok(init) => report.documents.push(init),
            Err(RevtrackError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "vanished during init");
            }
            Err(err) => return Err(err),
        }
    }
    report.sync = sync::run(ctx)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::save::{self, SaveOutcome};
    use crate::commands::testing::Fixture;
    use crate::config::TrackConfig;
    use std::fs;

    #[test]
    fn init_adds_header_and_record() {
        let fx = Fixture::new();
        let path = fx.write("notes/plan.txt", "first line\n");

        let report = run(fx.ctx(), &path).unwrap();
        assert!(report.header_added);
        assert!(report.record_created);
        assert_eq!(report.file, "./notes/plan.txt");
        assert_eq!(report.version.to_string(), "av1r1");

        let text = fs::read_to_string(&path).unwrap();
        assert!(header::has_header(&text));
        assert!(text.ends_with("\n\nfirst line\n"));
        assert_eq!(
            header::header_field(&text, "log").as_deref(),
            Some("./.revtrack/records/notes%2Fplan.txt")
        );
        assert_eq!(fx.snapshot("notes/plan.txt"), text);
        assert_eq!(fx.record("notes/plan.txt").history[0].label, "initialized");
    }

    #[test]
    fn init_twice_changes_nothing() {
        let fx = Fixture::new();
        let path = fx.write("a.txt", "x\n");
        run(fx.ctx(), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let record = fx.record("a.txt");

        let again = run(fx.ctx(), &path).unwrap();
        assert!(!again.header_added);
        assert!(!again.record_created);
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
        assert_eq!(fx.record("a.txt"), record);
    }

    #[test]
    fn init_keeps_unrecorded_edits_pending() {
        let fx = Fixture::new();
        let path = fx.write("a.txt", "x\n");
        run(fx.ctx(), &path).unwrap();
        fx.append(&path, "y\n");
        run(fx.ctx(), &path).unwrap();

        assert!(matches!(
            save::on_modified(fx.ctx(), &path).unwrap(),
            SaveOutcome::Saved { added: 1, .. }
        ));
    }

    #[test]
    fn ignored_documents_cannot_be_initialized() {
        let fx = Fixture::with_config(TrackConfig {
            ignore: vec!["drafts/*".to_string()],
            ..TrackConfig::default()
        });
        let path = fx.write("drafts/a.txt", "x\n");
        assert!(matches!(
            run(fx.ctx(), &path).unwrap_err(),
            RevtrackError::NotTracked(_)
        ));
    }

    #[test]
    fn init_all_covers_the_folder() {
        let fx = Fixture::new();
        fx.write("a.txt", "a\n");
        fx.write("sub/b.txt", "b\n");
        fx.write("c.md", "c\n");

        let report = run_all(fx.ctx()).unwrap();
        assert!(report.config_written);
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.sync.documents, 2);
        assert_eq!(fx.store.load_index().unwrap().len(), 2);
        assert!(fx.store.load_config().is_ok());

        let again = run_all(fx.ctx()).unwrap();
        assert!(!again.config_written);
    }
}
