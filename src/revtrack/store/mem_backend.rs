use super::backend::{Area, StorageBackend};
use crate::error::{Result, RevtrackError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone)]
struct Entry {
    text: String,
    mtime: DateTime<Utc>,
}

/// In-memory storage backend for testing.
///
/// Uses a `parking_lot::Mutex` so the backend can be shared with the watcher threads.
#[derive(Default)]
pub struct MemBackend {
    entries: Mutex<HashMap<(Area, String), Entry>>,
    simulate_write_error: AtomicBool,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Test helper to set mtime directly. Returns true if the entry existed.
    pub fn set_modified(&self, area: Area, name: &str, mtime: DateTime<Utc>) -> bool {
        match self.entries.lock().get_mut(&(area, name.to_string())) {
            Some(entry) => {
                entry.mtime = mtime;
                true
            }
            None => false,
        }
    }
}

impl StorageBackend for MemBackend {
    fn read(&self, area: Area, name: &str) -> Result<Option<String>> {
        let entries = self.entries.lock();
        Ok(entries.get(&(area, name.to_string())).map(|e| e.text.clone()))
    }

    fn write(&self, area: Area, name: &str, content: &str) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(RevtrackError::Store("Simulated write error".to_string()));
        }
        self.entries.lock().insert(
            (area, name.to_string()),
            Entry {
                text: content.to_string(),
                mtime: Utc::now(),
            },
        );
        Ok(())
    }

    fn create_new(&self, area: Area, name: &str, content: &str) -> Result<bool> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(RevtrackError::Store("Simulated write error".to_string()));
        }
        match self.entries.lock().entry((area, name.to_string())) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Entry {
                    text: content.to_string(),
                    mtime: Utc::now(),
                });
                Ok(true)
            }
        }
    }

    fn delete(&self, area: Area, name: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(&(area, name.to_string())).is_some())
    }

    fn relocate(&self, from: (Area, &str), to: (Area, &str)) -> Result<bool> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(RevtrackError::Store("Simulated write error".to_string()));
        }
        let mut entries = self.entries.lock();
        match entries.remove(&(from.0, from.1.to_string())) {
            Some(entry) => {
                entries.insert((to.0, to.1.to_string()), entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list(&self, area: Area) -> Result<Vec<String>> {
        let entries = self.entries.lock();
        let mut names: Vec<String> = entries
            .keys()
            .filter(|(a, _)| *a == area)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn modified(&self, area: Area, name: &str) -> Result<Option<DateTime<Utc>>> {
        let entries = self.entries.lock();
        Ok(entries.get(&(area, name.to_string())).map(|e| e.mtime))
    }

    fn path(&self, area: Area, name: &str) -> PathBuf {
        let mut path = PathBuf::from("/mem");
        if let Some(dir) = area.dir_name() {
            path.push(dir);
        }
        path.join(name)
    }
}
