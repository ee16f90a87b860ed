//! Per-record statistics, written to `stats/<key>` as a `stats` block.

use crate::commands::helpers::target_keys;
use crate::commands::{Context, Target};
use crate::error::Result;
use crate::markup::{self, Block, FieldValue, MarkupDocument};
use crate::model::{format_timestamp, now, ChangeKind, DocumentRecord};
use crate::revision::RevisionId;
use crate::store::StorageBackend;
use chrono::NaiveDate;
use serde::Serialize;

const STATS_BLOCK: &str = "stats";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordStats {
    pub file: String,
    pub version: RevisionId,
    /// Saves, including the entry that started the record.
    pub total_saves: usize,
    pub total_bumps: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub first_entry: Option<NaiveDate>,
    pub last_entry: Option<NaiveDate>,
    pub history_entries: usize,
}

impl RecordStats {
    pub fn of(record: &DocumentRecord) -> Self {
        let mut stats = RecordStats {
            file: record.meta.file.clone(),
            version: record.meta.version,
            total_saves: 0,
            total_bumps: 0,
            lines_added: 0,
            lines_removed: 0,
            first_entry: record.history.first().map(|e| e.timestamp.date_naive()),
            last_entry: record.history.last().map(|e| e.timestamp.date_naive()),
            history_entries: record.history.len(),
        };
        for entry in &record.history {
            let label = entry.label.as_str();
            if label.starts_with("save:") || label == "created" || label == "initialized" {
                stats.total_saves += 1;
                for change in &entry.changes {
                    match change.kind {
                        ChangeKind::Add => stats.lines_added += 1,
                        ChangeKind::Remove => stats.lines_removed += 1,
                    }
                }
            } else if label.starts_with("bumped ") || label.starts_with("merged ") {
                stats.total_bumps += 1;
            }
        }
        stats
    }

    fn to_markup(&self) -> String {
        let mut block = Block::new(STATS_BLOCK)
            .with_field("file", FieldValue::scalar(&self.file))
            .with_field("version", FieldValue::scalar(self.version.to_string()))
            .with_field("generated", FieldValue::scalar(format_timestamp(&now())))
            .with_field("total_saves", FieldValue::scalar(self.total_saves.to_string()))
            .with_field("total_bumps", FieldValue::scalar(self.total_bumps.to_string()))
            .with_field("lines_added", FieldValue::scalar(self.lines_added.to_string()))
            .with_field("lines_removed", FieldValue::scalar(self.lines_removed.to_string()))
            .with_field(
                "history_entries",
                FieldValue::scalar(self.history_entries.to_string()),
            );
        if let Some(first) = self.first_entry {
            block = block.with_field("first_entry", FieldValue::scalar(first.to_string()));
        }
        if let Some(last) = self.last_entry {
            block = block.with_field("last_entry", FieldValue::scalar(last.to_string()));
        }
        markup::render(&MarkupDocument::new().with_block(block))
    }
}

pub fn run<B: StorageBackend>(ctx: Context<'_, B>, target: &Target) -> Result<Vec<RecordStats>> {
    let mut all = Vec::new();
    for key in target_keys(ctx, target)? {
        let stats = {
            let _guard = ctx.locks.lock(&key);
            RecordStats::of(&ctx.store.load(&key)?)
        };
        ctx.store.write_stats(&key, &stats.to_markup())?;
        all.push(stats);
    }
    Ok(all)
}
