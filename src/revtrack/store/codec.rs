//! Mapping between records and their markup form.
//!
//! ```text
//! =d=meta=w=
//! =x= file;|./plan.txt|; =z=
//! =x= version;|av1r2|; =z=
//! =x= saves;|1|; =z=
//! =x= updated;|2026-01-15T10:05:00Z|; =z=
//! =x= ref_versions;|./design.txt=av2r1|;, =z=
//! =x= archive;|./.revtrack/archive/plan.txt-20260115-100000.txt|;, =z=
//! =q=meta=e=
//!
//! =d=history=w=
//! =dw=
//! =x= 2026-01-15T10:05:00Z;|save:1|; =z=
//! =+= a new line =o=
//! =wd=
//! =q=history=e=
//! ```
//!
//! `ref_versions`, `archive` and the history block are only written when non-empty.

use crate::markup::{Block, Container, FieldValue, MarkupDocument};
use crate::model::{
    format_timestamp, parse_timestamp, Change, ChangeKind, DocumentRecord, HistoryEntry,
};
use crate::revision::RevisionId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const META_BLOCK: &str = "meta";
const HISTORY_BLOCK: &str = "history";
const UNKNOWN_REVISION: &str = "unknown";

pub fn record_to_markup(record: &DocumentRecord) -> MarkupDocument {
    let meta = &record.meta;
    let mut block = Block::new(META_BLOCK)
        .with_field("file", FieldValue::scalar(&meta.file))
        .with_field("version", FieldValue::scalar(meta.version.to_string()))
        .with_field("saves", FieldValue::scalar(meta.pending_saves.to_string()));
    if let Some(updated) = &meta.updated_at {
        block = block.with_field("updated", FieldValue::scalar(format_timestamp(updated)));
    }
    if !meta.ref_versions.is_empty() {
        block = block.with_field("ref_versions", ref_versions_field(&meta.ref_versions));
    }
    if !meta.archive_pointers.is_empty() {
        block = block.with_field(
            "archive",
            FieldValue::list(meta.archive_pointers.iter().cloned()),
        );
    }

    let mut doc = MarkupDocument::new().with_block(block);
    if !record.history.is_empty() {
        doc.push(history_block(&record.history));
    }
    doc
}

pub fn record_from_markup(doc: &MarkupDocument) -> DocumentRecord {
    let mut record = DocumentRecord::default();
    if let Some(meta) = doc.block(META_BLOCK) {
        let fields = &meta.fields;
        record.meta.file = fields.get_str("file").unwrap_or_default().to_string();
        record.meta.version = fields
            .get_str("version")
            .and_then(RevisionId::parse)
            .unwrap_or_default();
        record.meta.pending_saves = parse_saves(fields.get_str("saves"));
        record.meta.updated_at = fields.get_str("updated").and_then(parse_timestamp);
        if let Some(pairs) = fields.get("ref_versions") {
            record.meta.ref_versions = ref_versions_from(pairs);
        }
        if let Some(pointers) = fields.get("archive") {
            record.meta.archive_pointers = pointers.values().into_iter().map(String::from).collect();
        }
    }
    if let Some(history) = doc.block(HISTORY_BLOCK) {
        record.history = history_from_block(history);
    }
    record
}

fn parse_saves(value: Option<&str>) -> u32 {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// `path=rev` pairs, with `unknown` for a reference whose revision could not be read.
fn ref_versions_field(refs: &BTreeMap<String, Option<RevisionId>>) -> FieldValue {
    FieldValue::list(refs.iter().map(|(path, rev)| {
        let rev = rev.map_or_else(|| UNKNOWN_REVISION.to_string(), |r| r.to_string());
        format!("{}={}", path, rev)
    }))
}

fn ref_versions_from(value: &FieldValue) -> BTreeMap<String, Option<RevisionId>> {
    value
        .values()
        .into_iter()
        .filter_map(|pair| pair.rsplit_once('='))
        .map(|(path, rev)| (path.to_string(), RevisionId::parse(rev)))
        .collect()
}

pub fn history_block(history: &[HistoryEntry]) -> Block {
    let mut block = Block::new(HISTORY_BLOCK);
    for entry in history {
        let mut container = Container::new().with_field(
            format_timestamp(&entry.timestamp),
            FieldValue::scalar(&entry.label),
        );
        for change in &entry.changes {
            match change.kind {
                ChangeKind::Add => container.added.push(change.text.clone()),
                ChangeKind::Remove => container.removed.push(change.text.clone()),
            }
        }
        block.containers.push(container);
    }
    block
}

/// One entry per container. Its first field is `timestamp;|label|;`.
pub fn history_from_block(block: &Block) -> Vec<HistoryEntry> {
    block
        .containers
        .iter()
        .map(|container| {
            let (timestamp, label) = match container.fields.iter().next() {
                Some((key, value)) => (
                    parse_timestamp(key).unwrap_or_default(),
                    value.first().unwrap_or_default().to_string(),
                ),
                None => (DateTime::<Utc>::default(), String::new()),
            };
            let changes = container
                .added
                .iter()
                .map(Change::add)
                .chain(container.removed.iter().map(Change::remove))
                .collect();
            HistoryEntry {
                timestamp,
                label,
                changes,
            }
        })
        .collect()
}

/// A history segment moved out of a record, along with the record state it belonged to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFile {
    pub source: String,
    pub file: String,
    pub version: RevisionId,
    pub pending_saves: u32,
    pub ref_versions: BTreeMap<String, Option<RevisionId>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub history: Vec<HistoryEntry>,
}

pub fn archive_to_markup(archive: &ArchiveFile) -> MarkupDocument {
    let mut meta = Block::new(META_BLOCK)
        .with_field("source", FieldValue::scalar(&archive.source))
        .with_field("file", FieldValue::scalar(&archive.file))
        .with_field("version", FieldValue::scalar(archive.version.to_string()))
        .with_field("saves", FieldValue::scalar(archive.pending_saves.to_string()))
        .with_field("entries", FieldValue::scalar(archive.history.len().to_string()));
    if !archive.ref_versions.is_empty() {
        meta = meta.with_field("ref_versions", ref_versions_field(&archive.ref_versions));
    }
    if let Some(at) = &archive.archived_at {
        meta = meta.with_field("archived", FieldValue::scalar(format_timestamp(at)));
    }
    MarkupDocument::new()
        .with_block(meta)
        .with_block(history_block(&archive.history))
}

pub fn archive_from_markup(doc: &MarkupDocument) -> ArchiveFile {
    let meta = doc.block(META_BLOCK);
    let field = |key: &str| {
        meta.and_then(|b| b.fields.get_str(key))
            .unwrap_or_default()
            .to_string()
    };
    ArchiveFile {
        source: field("source"),
        file: field("file"),
        version: RevisionId::parse(&field("version")).unwrap_or_default(),
        pending_saves: parse_saves(meta.and_then(|b| b.fields.get_str("saves"))),
        ref_versions: meta
            .and_then(|b| b.fields.get("ref_versions"))
            .map(ref_versions_from)
            .unwrap_or_default(),
        archived_at: meta
            .and_then(|b| b.fields.get_str("archived"))
            .and_then(parse_timestamp),
        history: doc
            .block(HISTORY_BLOCK)
            .map(history_from_block)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;

    fn sample_record() -> DocumentRecord {
        let mut record = DocumentRecord::new("./notes/plan.txt", RevisionId::parse("bv2r3").unwrap());
        record.meta.pending_saves = 2;
        record.append_history("created", Vec::new());
        record.append_history(
            "save:1",
            vec![Change::add("new | line"), Change::remove("old =o= line")],
        );
        record
            .meta
            .ref_versions
            .insert("./design.txt".to_string(), RevisionId::parse("av1r4"));
        record
            .meta
            .ref_versions
            .insert("./gone.txt".to_string(), None);
        record
            .meta
            .archive_pointers
            .push("./.revtrack/archive/x-20260101-000000.txt".to_string());
        record
    }

    #[test]
    fn test_record_survives_render_and_parse() {
        let record = sample_record();
        let text = markup::render(&record_to_markup(&record));
        assert_eq!(record_from_markup(&markup::parse(&text)), record);
    }

    #[test]
    fn test_empty_record_omits_optional_parts() {
        let text = markup::render(&record_to_markup(&DocumentRecord::default()));
        assert!(!text.contains("=d=history=w="));
        assert!(!text.contains("ref_versions"));
        assert!(!text.contains("updated"));
    }

    #[test]
    fn test_lenient_meta_parsing() {
        let doc = markup::parse("=d=meta=w=\n=x= version;|junk|; =z=\n=x= saves;|-3|; =z=\n=q=meta=e=");
        let record = record_from_markup(&doc);
        assert_eq!(record.meta.version, RevisionId::default());
        assert_eq!(record.meta.pending_saves, 0);
    }

    #[test]
    fn test_archive_file_round_trip() {
        let record = sample_record();
        let archive = ArchiveFile {
            source: "notes%2Fplan.txt".to_string(),
            file: "./notes/plan.txt".to_string(),
            version: RevisionId::parse("bv2r3").unwrap(),
            pending_saves: record.meta.pending_saves,
            ref_versions: record.meta.ref_versions.clone(),
            archived_at: Some(crate::model::now()),
            history: record.history,
        };
        let text = markup::render(&archive_to_markup(&archive));
        assert!(text.contains("=x= entries;|2|; =z="));
        assert!(text.contains("=x= saves;|2|; =z="));
        assert!(text.contains("./gone.txt=unknown"));
        assert_eq!(archive_from_markup(&markup::parse(&text)), archive);
    }
}
