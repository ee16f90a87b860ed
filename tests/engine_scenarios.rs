use revtrack::api::RevtrackApi;
use revtrack::commands::fix::IssueSelection;
use revtrack::commands::poll::PollOutcome;
use revtrack::commands::save::SaveOutcome;
use revtrack::commands::scan::IssueKind;
use revtrack::commands::Target;
use revtrack::config::TrackConfig;
use revtrack::header;
use revtrack::model::{Change, StorageKey};
use revtrack::store::fs_backend::FsBackend;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn open(dir: &TempDir) -> RevtrackApi<FsBackend> {
    RevtrackApi::open(dir.path()).unwrap()
}

fn write(api: &RevtrackApi<FsBackend>, rel: &str, content: &str) -> PathBuf {
    let path = api.workspace().root().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn append(path: &Path, text: &str) {
    let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

fn key(rel: &str) -> StorageKey {
    StorageKey::from_relative(Path::new(rel))
}

#[test]
fn test_end_to_end_save() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let path = write(&api, "foo.txt", "alpha\n");

    let init = api.tracking_init(&path).unwrap();
    assert!(init.header_added);
    assert!(init.record_created);
    assert_eq!(init.version.to_string(), "av1r1");

    append(&path, "beta\n");
    let outcome = api.on_modified(&path).unwrap();
    assert!(matches!(outcome, SaveOutcome::Saved { added: 1, removed: 0, .. }));

    let record = api.store().load(&key("foo.txt")).unwrap();
    assert_eq!(record.meta.file, "./foo.txt");
    assert_eq!(record.meta.version.to_string(), "av1r1");
    assert_eq!(record.meta.pending_saves, 1);
    let last = record.last_entry().unwrap();
    assert_eq!(last.label, "save:1");
    assert_eq!(last.changes, vec![Change::add("beta")]);

    let snapshot = api.store().snapshot(&key("foo.txt")).unwrap().unwrap();
    assert_eq!(snapshot, fs::read_to_string(&path).unwrap());

    // persisted under the state folder as plain markup
    let on_disk = dir.path().join(".revtrack/records/foo.txt");
    assert!(fs::read_to_string(on_disk).unwrap().contains("save:1"));
}

#[test]
fn test_bump_closes_pending_saves() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let path = write(&api, "foo.txt", "alpha\n");
    api.tracking_init(&path).unwrap();
    append(&path, "beta\n");
    api.on_modified(&path).unwrap();

    let report = api.bump(&Target::All).unwrap();
    assert_eq!(report.bumped.len(), 1);
    assert_eq!(report.bumped[0].to.to_string(), "av1r2");

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(header::header_revision(&text).unwrap().to_string(), "av1r2");
    let record = api.store().load(&key("foo.txt")).unwrap();
    assert_eq!(record.meta.pending_saves, 0);
    assert_eq!(record.last_entry().unwrap().label, "bumped av1r2");

    // the header edit is not a save of its own
    assert!(matches!(
        api.on_modified(&path).unwrap(),
        SaveOutcome::Unchanged { .. }
    ));
    assert!(api.bump(&Target::All).unwrap().bumped.is_empty());
}

#[test]
fn test_orphan_lifecycle() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let path = write(&api, "gone.txt", "alpha\n");
    api.tracking_init(&path).unwrap();
    fs::remove_file(&path).unwrap();

    let issues = api.scan_issues().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::Orphan);
    assert!(issues[0].auto_fixable);

    // sync reports, it never corrects
    let sync = api.sync().unwrap();
    assert_eq!(sync.issues, 1);
    assert!(api.store().has_record(&key("gone.txt")).unwrap());

    let fixed = api.fix(IssueSelection::AllFixable).unwrap();
    assert_eq!(fixed.fixed.len(), 1);
    assert!(!api.store().has_record(&key("gone.txt")).unwrap());
    // last known content stays recoverable
    assert!(api.store().has_snapshot(&key("gone.txt")).unwrap());
    assert!(api.scan_issues().unwrap().is_empty());
}

#[test]
fn test_large_history_is_archived() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let path = write(&api, "long.txt", "line 0\n");
    api.tracking_init(&path).unwrap();
    for i in 1..=100 {
        append(&path, &format!("line {}\n", i));
        assert!(api.on_modified(&path).unwrap().is_recorded());
    }
    let record = api.store().load(&key("long.txt")).unwrap();
    assert_eq!(record.history.len(), 101);

    let issues = api.scan_issues().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::Large);
    assert_eq!(issues[0].detail, "101 history entries (threshold 100)");

    let report = api.fix(IssueSelection::AllFixable).unwrap();
    assert_eq!(report.archives.len(), 1);
    let pointer = &report.archives[0];

    let record = api.store().load(&key("long.txt")).unwrap();
    assert_eq!(record.history.len(), 1);
    assert_eq!(
        record.history[0].label,
        format!("archived 101 entries to {}", pointer)
    );
    assert_eq!(record.meta.archive_pointers, vec![pointer.clone()]);

    let names = api.store().archive_names().unwrap();
    let archived = api.store().load_archive(&names[0]).unwrap().unwrap();
    assert_eq!(archived.history.len(), 101);
    assert!(api.scan_issues().unwrap().is_empty());
}

#[test]
fn test_sync_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    write(&api, "a.txt", "alpha\n");
    write(&api, "notes/b.txt", "beta\n");
    let all = api.init_all().unwrap();
    assert!(all.config_written);
    assert_eq!(all.documents.len(), 2);

    let first = api.sync().unwrap();
    let index = api.store().load_index().unwrap();
    let records = api.store().record_keys().unwrap();

    let second = api.sync().unwrap();
    assert_eq!(second.records_updated, 0);
    assert_eq!(second.documents, first.documents);
    assert_eq!(api.store().load_index().unwrap(), index);
    assert_eq!(api.store().record_keys().unwrap(), records);
    assert_eq!(index.len(), 2);
}

#[test]
fn test_references_go_stale() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let base = write(&api, "base.txt", "base\n");
    api.tracking_init(&base).unwrap();

    let user = write(&api, "user.txt", "uses base\n");
    api.tracking_init(&user).unwrap();
    let text = fs::read_to_string(&user).unwrap();
    fs::write(&user, header::set_field(&text, "refs", "./base.txt").unwrap()).unwrap();
    api.sync().unwrap();
    assert!(api.scan_issues().unwrap().is_empty());

    append(&base, "more\n");
    api.on_modified(&base).unwrap();
    api.bump(&Target::Key(key("base.txt"))).unwrap();

    let issues = api.scan_issues().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::Stale);
    assert!(!issues[0].auto_fixable);
    assert_eq!(issues[0].detail, "refs changed: base.txt");
}

#[test]
fn test_rebase_archives_old_line() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let path = write(&api, "doc.txt", "alpha\n");
    api.tracking_init(&path).unwrap();
    append(&path, "beta\n");
    api.on_modified(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, header::set_field(&text, "version", "bv1r1").unwrap()).unwrap();
    let outcome = api.on_modified(&path).unwrap();
    let SaveOutcome::Rebased { archive, .. } = outcome else {
        panic!("expected a rebase, got {:?}", outcome);
    };
    assert!(archive.is_some());

    let record = api.store().load(&key("doc.txt")).unwrap();
    assert_eq!(record.meta.version.to_string(), "bv1r1");
    assert_eq!(record.history.len(), 1);
    assert_eq!(record.history[0].label, "rebased av1r1 -> bv1r1");

    // the next save diffs against an empty baseline
    append(&path, "gamma\n");
    let outcome = api.on_modified(&path).unwrap();
    assert!(matches!(outcome, SaveOutcome::Saved { removed: 0, .. }));
}

#[test]
fn test_move_keeps_history() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let from = write(&api, "old.txt", "alpha\n");
    api.tracking_init(&from).unwrap();
    append(&from, "beta\n");
    api.on_modified(&from).unwrap();

    let to = api.workspace().root().join("archive-dir/new.txt");
    fs::create_dir_all(to.parent().unwrap()).unwrap();
    fs::rename(&from, &to).unwrap();
    let outcome = api.on_moved(&from, &to).unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Renamed {
            from: "./old.txt".to_string(),
            to: "./archive-dir/new.txt".to_string()
        }
    );

    assert!(!api.store().has_record(&key("old.txt")).unwrap());
    let record = api.store().load(&key("archive-dir/new.txt")).unwrap();
    assert_eq!(record.history.len(), 3);
    assert_eq!(
        record.last_entry().unwrap().label,
        "renamed ./old.txt -> ./archive-dir/new.txt"
    );
}

#[test]
fn test_ignored_paths_are_left_alone() {
    let dir = TempDir::new().unwrap();
    let config = TrackConfig {
        ignore: vec!["drafts/*".to_string()],
        ..TrackConfig::default()
    };
    let api = open(&dir);
    api.store().save_config(&config).unwrap();
    let api = open(&dir);
    assert_eq!(api.config().ignore, vec!["drafts/*".to_string()]);

    let path = write(&api, "drafts/wip.txt", "scratch\n");
    assert!(api.tracking_init(&path).is_err());
    assert!(matches!(
        api.on_created(&path).unwrap(),
        SaveOutcome::Ignored { .. }
    ));
}

#[test]
fn test_poll_pokes_a_diverged_document() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let path = write(&api, "foo.txt", "alpha\n");
    api.tracking_init(&path).unwrap();
    assert!(matches!(api.poll_tick().unwrap(), PollOutcome::InSync { .. }));

    append(&path, "beta\n");
    assert_eq!(
        api.poll_tick().unwrap(),
        PollOutcome::Poked {
            file: "./foo.txt".to_string()
        }
    );
    assert!(matches!(
        api.poll_tick().unwrap(),
        PollOutcome::AlreadyPoked { .. }
    ));
    // the poke never records anything itself
    assert_eq!(api.store().load(&key("foo.txt")).unwrap().meta.pending_saves, 0);

    api.on_modified(&path).unwrap();
    assert!(matches!(api.poll_tick().unwrap(), PollOutcome::InSync { .. }));
}

#[test]
fn test_compact_writes_stats() {
    let dir = TempDir::new().unwrap();
    let api = open(&dir);
    let path = write(&api, "foo.txt", "alpha\n");
    api.tracking_init(&path).unwrap();
    append(&path, "beta\ngamma\n");
    api.on_modified(&path).unwrap();
    api.bump(&Target::All).unwrap();

    let stats = api.compact(&Target::All).unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total_saves, 2);
    assert_eq!(stats[0].total_bumps, 1);
    assert_eq!(stats[0].lines_added, 2);
    assert!(dir.path().join(".revtrack/stats/foo.txt").exists());
}
