use crate::commands::Context;
use crate::error::{Result, RevtrackError};
use crate::model::{HistoryEntry, StorageKey};
use crate::revision::RevisionId;
use crate::store::StorageBackend;
use serde::Serialize;

/// A record as shown to a user, newest entries last.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub file: String,
    pub version: RevisionId,
    pub pending_saves: u32,
    pub total_entries: usize,
    pub entries: Vec<HistoryEntry>,
    pub archives: Vec<String>,
}

/// `limit` keeps only the most recent entries.
pub fn run<B: StorageBackend>(
    ctx: Context<'_, B>,
    key: &StorageKey,
    limit: Option<usize>,
) -> Result<HistoryView> {
    let record = ctx
        .store
        .find(key)?
        .ok_or_else(|| RevtrackError::NotTracked(key.display_path()))?;
    let total_entries = record.history.len();
    let skip = limit.map_or(0, |limit| total_entries.saturating_sub(limit));
    Ok(HistoryView {
        file: record.meta.file,
        version: record.meta.version,
        pending_saves: record.meta.pending_saves,
        total_entries,
        entries: record.history.into_iter().skip(skip).collect(),
        archives: record.meta.archive_pointers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::save;
    use crate::commands::testing::Fixture;

    #[test]
    fn limit_keeps_newest_entries() {
        let fx = Fixture::new();
        let path = fx.tracked("a.txt", "alpha\n");
        for line in ["b\n", "c\n"] {
            fx.append(&path, line);
            save::on_modified(fx.ctx(), &path).unwrap();
        }

        let view = run(fx.ctx(), &fx.key("a.txt"), Some(2)).unwrap();
        assert_eq!(view.total_entries, 3);
        let labels: Vec<&str> = view.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["save:1", "save:2"]);

        let all = run(fx.ctx(), &fx.key("a.txt"), None).unwrap();
        assert_eq!(all.entries.len(), 3);
    }

    #[test]
    fn untracked_key_fails() {
        let fx = Fixture::new();
        assert!(run(fx.ctx(), &fx.key("a.txt"), None).is_err());
    }
}
