//! The watcher's session log.
//!
//! While a watcher runs, `session/current.txt` holds a `session` block and a history
//! block with one entry per recorded event. On stop the log is stamped and renamed to
//! `session/<YYYYMMDD-HHMMSS>.txt`.

use crate::error::Result;
use crate::markup::{self, Block, FieldValue, MarkupDocument};
use crate::model::{compact_timestamp, format_timestamp, now, parse_timestamp, HistoryEntry};
use crate::store::codec::{history_block, history_from_block};
use crate::store::{Area, RecordStore, StorageBackend};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const CURRENT_SESSION: &str = "current.txt";
const SESSION_BLOCK: &str = "session";
const HISTORY_BLOCK: &str = "history";

#[derive(Debug, Clone)]
pub struct SessionLog {
    pid: u32,
    started: DateTime<Utc>,
    entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub pid: Option<u32>,
    pub started: Option<DateTime<Utc>>,
    pub events: usize,
}

impl SessionLog {
    pub fn begin(pid: u32) -> Self {
        Self {
            pid,
            started: now(),
            entries: Vec::new(),
        }
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn events(&self) -> usize {
        self.entries.len()
    }

    pub fn record(&mut self, label: impl Into<String>) {
        self.entries.push(HistoryEntry::new(label, Vec::new()));
    }

    fn render(&self, stopped: Option<&DateTime<Utc>>) -> String {
        let mut meta = Block::new(SESSION_BLOCK)
            .with_field("pid", FieldValue::scalar(self.pid.to_string()))
            .with_field("started", FieldValue::scalar(format_timestamp(&self.started)))
            .with_field("events", FieldValue::scalar(self.entries.len().to_string()));
        if let Some(stopped) = stopped {
            meta = meta.with_field("stopped", FieldValue::scalar(format_timestamp(stopped)));
        }
        let mut doc = MarkupDocument::new().with_block(meta);
        if !self.entries.is_empty() {
            doc.push(history_block(&self.entries));
        }
        markup::render(&doc)
    }

    /// Write the live log to `current.txt`.
    pub fn flush<B: StorageBackend>(&self, store: &RecordStore<B>) -> Result<()> {
        store
            .backend()
            .write(Area::Session, CURRENT_SESSION, &self.render(None))
    }

    /// Stamp the stop time and move the log to its final name, which is returned.
    pub fn finish<B: StorageBackend>(self, store: &RecordStore<B>) -> Result<String> {
        let stopped = now();
        let backend = store.backend();
        backend.write(Area::Session, CURRENT_SESSION, &self.render(Some(&stopped)))?;

        let stem = compact_timestamp(&self.started);
        let mut name = format!("{}.txt", stem);
        let mut n = 1;
        while backend.exists(Area::Session, &name)? {
            n += 1;
            name = format!("{}-{}.txt", stem, n);
        }
        backend.relocate((Area::Session, CURRENT_SESSION), (Area::Session, &name))?;
        Ok(name)
    }

    /// What the live log says, if there is one.
    pub fn load_current<B: StorageBackend>(store: &RecordStore<B>) -> Result<Option<SessionSummary>> {
        let Some(text) = store.backend().read(Area::Session, CURRENT_SESSION)? else {
            return Ok(None);
        };
        let doc = markup::parse(&text);
        let meta = doc.block(SESSION_BLOCK);
        let events = doc
            .block(HISTORY_BLOCK)
            .map(|block| history_from_block(block).len())
            .unwrap_or(0);
        Ok(Some(SessionSummary {
            pid: meta
                .and_then(|b| b.fields.get_str("pid"))
                .and_then(|p| p.trim().parse().ok()),
            started: meta
                .and_then(|b| b.fields.get_str("started"))
                .and_then(parse_timestamp),
            events,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem_backend::MemBackend;

    #[test]
    fn live_log_is_readable() {
        let store = RecordStore::new(MemBackend::new());
        let mut log = SessionLog::begin(42);
        log.record("save:1 ./a.txt +1 -0");
        log.record("created ./b.txt");
        log.flush(&store).unwrap();

        let summary = SessionLog::load_current(&store).unwrap().unwrap();
        assert_eq!(summary.pid, Some(42));
        assert_eq!(summary.started, Some(log.started()));
        assert_eq!(summary.events, 2);
    }

    #[test]
    fn finish_rotates_the_log() {
        let store = RecordStore::new(MemBackend::new());
        let mut log = SessionLog::begin(7);
        log.record("created ./a.txt");
        log.flush(&store).unwrap();

        let name = log.finish(&store).unwrap();
        assert!(name.ends_with(".txt"));
        assert!(SessionLog::load_current(&store).unwrap().is_none());
        let text = store.backend().read(Area::Session, &name).unwrap().unwrap();
        assert!(text.contains("stopped;|"));
        assert!(text.contains("created ./a.txt"));
    }
}
