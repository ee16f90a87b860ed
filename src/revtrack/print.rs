use chrono::{DateTime, Utc};
use colored::Colorize;
use revtrack::commands::archive::ArchiveReport;
use revtrack::commands::bump::BumpReport;
use revtrack::commands::compact::RecordStats;
use revtrack::commands::fix::{FixReport, OrphanReport, RepairReport, UntrackReport};
use revtrack::commands::history::HistoryView;
use revtrack::commands::init::{InitAllReport, InitReport};
use revtrack::commands::scan::{Issue, IssueKind};
use revtrack::commands::status::StatusReport;
use revtrack::commands::sync::SyncReport;
use revtrack::error::Result;
use revtrack::model::{ChangeKind, HistoryEntry};
use revtrack::watch::registry::RegistryEntry;
use revtrack::watch::StopReport;
use serde::Serialize;
use timeago::Formatter;

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ago(ts: &DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(*ts);
    Formatter::new().convert(duration.to_std().unwrap_or_default())
}

pub(crate) fn print_init(report: &InitReport) {
    let what = if report.record_created {
        "tracking"
    } else {
        "already tracked"
    };
    println!(
        "{} {} {}",
        what.green(),
        report.file.bold(),
        report.version.to_string().yellow()
    );
    if report.header_added {
        println!("{}", "  header added".dimmed());
    }
}

pub(crate) fn print_init_all(report: &InitAllReport) {
    if report.config_written {
        println!("{}", "wrote .revtrack/config.txt".dimmed());
    }
    if report.documents.is_empty() {
        println!("No documents to track.");
    }
    for doc in &report.documents {
        print_init(doc);
    }
    print_sync(&report.sync);
}

pub(crate) fn print_sync(report: &SyncReport) {
    println!(
        "{} {} documents, {} records updated, {} indexed",
        "synced".green(),
        report.documents,
        report.records_updated,
        report.indexed
    );
    if report.issues > 0 {
        println!(
            "{}",
            format!("{} issues found, run `revtrack fix` for details", report.issues).yellow()
        );
    }
}

fn kind_label(kind: IssueKind) -> String {
    let label = format!("{:<6}", kind.to_string());
    match kind {
        IssueKind::Orphan | IssueKind::Broken => label.red().to_string(),
        IssueKind::Large | IssueKind::Stale => label.yellow().to_string(),
    }
}

pub(crate) fn print_issues(issues: &[Issue]) {
    if issues.is_empty() {
        println!("{}", "No issues found.".green());
        return;
    }
    for issue in issues {
        let fixable = if issue.auto_fixable { "*" } else { " " };
        println!(
            "{} {} {}  {}",
            kind_label(issue.kind),
            fixable.cyan(),
            issue.subject.bold(),
            issue.detail.dimmed()
        );
    }
    if issues.iter().any(|i| i.auto_fixable) {
        println!();
        println!("{}", "* fixable with `revtrack fix -y`".dimmed());
    }
}

pub(crate) fn print_fix(report: &FixReport) {
    for issue in &report.fixed {
        println!("{} {} {}", "fixed".green(), kind_label(issue.kind), issue.subject);
    }
    for issue in &report.skipped {
        println!("{} {} {}", "skipped".yellow(), kind_label(issue.kind), issue.subject);
    }
    for pointer in &report.archives {
        println!("{}", format!("  archive {}", pointer).dimmed());
    }
    if report.fixed.is_empty() && report.skipped.is_empty() {
        println!("Nothing to fix.");
    }
}

pub(crate) fn print_repair(report: &RepairReport) {
    println!(
        "{} {} snapshots, {} records created",
        "repaired".green(),
        report.snapshots_created,
        report.records_created
    );
    print_sync(&report.sync);
}

pub(crate) fn print_orphans(report: &OrphanReport) {
    if report.removed.is_empty() {
        println!("No orphaned records.");
    }
    for file in &report.removed {
        println!("{} {}", "removed".red(), file);
    }
}

pub(crate) fn print_untrack(report: &UntrackReport) {
    println!("{} {}", "untracked".yellow(), report.file.bold());
}

pub(crate) fn print_bump(report: &BumpReport) {
    if report.bumped.is_empty() {
        println!("No pending saves.");
    }
    for bumped in &report.bumped {
        println!(
            "{} {} -> {}",
            bumped.file.bold(),
            bumped.from.to_string().dimmed(),
            bumped.to.to_string().yellow()
        );
    }
}

pub(crate) fn print_archive(report: &ArchiveReport) {
    if report.archived.is_empty() {
        println!("Nothing to archive.");
    }
    for archived in &report.archived {
        println!(
            "{} {} entries of {} to {}",
            "archived".green(),
            archived.entries,
            archived.file.bold(),
            archived.pointer.dimmed()
        );
    }
}

fn print_entry(entry: &HistoryEntry) {
    println!(
        "{}  {}  {}",
        entry.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        format!("{:>14}", ago(&entry.timestamp)).dimmed(),
        entry.label.bold()
    );
    for change in &entry.changes {
        match change.kind {
            ChangeKind::Add => println!("    {}", format!("+ {}", change.text).green()),
            ChangeKind::Remove => println!("    {}", format!("- {}", change.text).red()),
        }
    }
}

pub(crate) fn print_history(view: &HistoryView) {
    println!(
        "{} {}  ({} pending, {} entries)",
        view.file.bold(),
        view.version.to_string().yellow(),
        view.pending_saves,
        view.total_entries
    );
    println!("--------------------------------");
    for entry in &view.entries {
        print_entry(entry);
    }
    if view.entries.len() < view.total_entries {
        println!(
            "{}",
            format!("... {} older entries", view.total_entries - view.entries.len()).dimmed()
        );
    }
    for pointer in &view.archives {
        println!("{}", format!("archived: {}", pointer).dimmed());
    }
}

pub(crate) fn print_stats(stats: &[RecordStats]) {
    if stats.is_empty() {
        println!("No tracked documents.");
    }
    for s in stats {
        let span = match (s.first_entry, s.last_entry) {
            (Some(first), Some(last)) => format!("{} .. {}", first, last),
            _ => "-".to_string(),
        };
        println!(
            "{} {}  {} saves, {} bumps, {} {}, {} entries  {}",
            s.file.bold(),
            s.version.to_string().yellow(),
            s.total_saves,
            s.total_bumps,
            format!("+{}", s.lines_added).green(),
            format!("-{}", s.lines_removed).red(),
            s.history_entries,
            span.dimmed()
        );
    }
}

pub(crate) fn print_status(report: &StatusReport) {
    println!("{} {}", "folder".dimmed(), report.folder.display());
    println!("{} {}", "tracked".dimmed(), report.tracked);

    let watcher = &report.watcher;
    if watcher.running {
        let pid = watcher.pid.map(|p| p.to_string()).unwrap_or_default();
        let since = watcher.started.as_ref().map(ago).unwrap_or_default();
        let events = watcher.events.unwrap_or(0);
        println!(
            "{} {} (pid {}, started {}, {} events)",
            "watcher".dimmed(),
            "running".green(),
            pid,
            since,
            events
        );
    } else {
        println!("{} {}", "watcher".dimmed(), "stopped".yellow());
    }

    if report.pending.is_empty() {
        return;
    }
    println!();
    for doc in &report.pending {
        println!(
            "  {} {}  {} unbumped saves",
            doc.file.bold(),
            doc.version.to_string().yellow(),
            doc.pending_saves
        );
    }
}

pub(crate) fn print_watchers(entries: &[RegistryEntry]) {
    if entries.is_empty() {
        println!("No watchers running.");
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        let since = entry.started.as_ref().map(ago).unwrap_or_default();
        println!("  [{}] {}", i + 1, entry.path.display().to_string().bold());
        println!("      {}", format!("pid {}, started {}", entry.pid, since).dimmed());
    }
    println!();
    println!("Total: {} watcher(s)", entries.len());
}

pub(crate) fn print_watching(folder: &std::path::Path, pid: u32) {
    println!("{} {} (pid {})", "watching".green(), folder.display(), pid);
    println!("{}", "Press Ctrl+C to stop".dimmed());
}

pub(crate) fn print_stopped(report: &StopReport) {
    println!("{} after {} events", "watcher stopped".yellow(), report.events);
    if let Some(log) = &report.session_log {
        println!("{}", format!("session log: {}", log).dimmed());
    }
}
