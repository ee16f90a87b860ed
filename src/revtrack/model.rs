use crate::diff::LineDiff;
use crate::error::{Result, RevtrackError};
use crate::revision::RevisionId;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Used in file names: archive side-files, removed records, finished session logs.
pub const COMPACT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Current time at the precision the markup format keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn compact_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(COMPACT_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Identifies a document's snapshot and record.
///
/// Derived only from the path relative to the tracked folder: every byte outside
/// `[A-Za-z0-9._-]` is percent-encoded, so `notes/todo list.txt` becomes
/// `notes%2Ftodo%20list.txt`. A leading dot is encoded too, keeping keys visible as files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn from_relative(rel: &Path) -> Self {
        let joined = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        let mut key = String::with_capacity(joined.len());
        for (i, byte) in joined.bytes().enumerate() {
            let plain = byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-')
                || (byte == b'.' && i > 0);
            if plain {
                key.push(byte as char);
            } else {
                key.push_str(&format!("%{:02X}", byte));
            }
        }
        StorageKey(key)
    }

    /// Accept an existing key, as found in a file name.
    pub fn parse(s: &str) -> Result<Self> {
        let key = StorageKey(s.to_string());
        key.decode()?;
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The document path, relative to the tracked folder.
    pub fn relative_path(&self) -> PathBuf {
        // keys are validated on construction
        self.decode().map(PathBuf::from).unwrap_or_default()
    }

    /// `./rel/path`, the form written into records and headers.
    pub fn display_path(&self) -> String {
        format!("./{}", self.decode().unwrap_or_default())
    }

    fn decode(&self) -> Result<String> {
        let invalid = || RevtrackError::InvalidKey(self.0.clone());
        if self.0.is_empty() {
            return Err(invalid());
        }
        let bytes = self.0.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'%' => {
                    let hex = self.0.get(i + 1..i + 3).ok_or_else(invalid)?;
                    out.push(u8::from_str_radix(hex, 16).map_err(|_| invalid())?);
                    i += 3;
                }
                b if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.') => {
                    out.push(b);
                    i += 1;
                }
                _ => return Err(invalid()),
            }
        }
        String::from_utf8(out).map_err(|_| invalid())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for StorageKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub text: String,
}

impl Change {
    pub fn add(text: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Add,
            text: text.into(),
        }
    }

    pub fn remove(text: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Remove,
            text: text.into(),
        }
    }

    /// Additions first, then removals, each in document order.
    pub fn from_diff(diff: &LineDiff) -> Vec<Change> {
        diff.added
            .iter()
            .map(Change::add)
            .chain(diff.removed.iter().map(Change::remove))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub changes: Vec<Change>,
}

impl HistoryEntry {
    pub fn new(label: impl Into<String>, changes: Vec<Change>) -> Self {
        Self {
            timestamp: now(),
            label: label.into(),
            changes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMeta {
    /// Display path of the document, `./rel/path`.
    pub file: String,
    pub version: RevisionId,
    pub pending_saves: u32,
    pub updated_at: Option<DateTime<Utc>>,
    /// Revision of each declared reference at the last sync; `None` when unknown.
    pub ref_versions: BTreeMap<String, Option<RevisionId>>,
    pub archive_pointers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub meta: RecordMeta,
    pub history: Vec<HistoryEntry>,
}

impl Default for DocumentRecord {
    fn default() -> Self {
        Self::new("", RevisionId::default())
    }
}

impl DocumentRecord {
    pub fn new(file: impl Into<String>, version: RevisionId) -> Self {
        Self {
            meta: RecordMeta {
                file: file.into(),
                version,
                pending_saves: 0,
                updated_at: None,
                ref_versions: BTreeMap::new(),
                archive_pointers: Vec::new(),
            },
            history: Vec::new(),
        }
    }

    /// Append one entry. Earlier entries are never touched.
    pub fn append_history(&mut self, label: impl Into<String>, changes: Vec<Change>) {
        let entry = HistoryEntry::new(label, changes);
        self.meta.updated_at = Some(entry.timestamp);
        self.history.push(entry);
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_is_pure_and_reversible() {
        let rel = Path::new("notes/todo list.txt");
        let key = StorageKey::from_relative(rel);
        assert_eq!(key.as_str(), "notes%2Ftodo%20list.txt");
        assert_eq!(key, StorageKey::from_relative(rel));
        assert_eq!(key.relative_path(), PathBuf::from("notes/todo list.txt"));
        assert_eq!(key.display_path(), "./notes/todo list.txt");
    }

    #[test]
    fn test_storage_key_ignores_dot_components() {
        let key = StorageKey::from_relative(Path::new("./a/./b.txt"));
        assert_eq!(key.as_str(), "a%2Fb.txt");
    }

    #[test]
    fn test_storage_key_encodes_leading_dot() {
        let key = StorageKey::from_relative(Path::new(".plan.txt"));
        assert_eq!(key.as_str(), "%2Eplan.txt");
        assert_eq!(key.display_path(), "./.plan.txt");
    }

    #[test]
    fn test_storage_key_parse_rejects_garbage() {
        assert!(StorageKey::parse("a%2Fb.txt").is_ok());
        assert!(StorageKey::parse("bad key").is_err());
        assert!(StorageKey::parse("%zz").is_err());
        assert!(StorageKey::parse("").is_err());
    }

    #[test]
    fn test_timestamps_round_trip() {
        let ts = now();
        assert_eq!(parse_timestamp(&format_timestamp(&ts)), Some(ts));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_append_history_keeps_prior_entries() {
        let mut record = DocumentRecord::new("./a.txt", RevisionId::default());
        record.append_history("created", Vec::new());
        let first = record.history[0].clone();
        record.append_history("save:1", vec![Change::add("x")]);
        assert_eq!(record.history.len(), 2);
        assert_eq!(record.history[0], first);
        assert_eq!(record.last_entry().map(|e| e.label.as_str()), Some("save:1"));
    }
}
