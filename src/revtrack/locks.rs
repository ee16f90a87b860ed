//! Per-document mutual exclusion.
//!
//! The event dispatcher and the poller run on their own threads and both end up reading,
//! changing and writing a document's record and snapshot. Every such read-modify-write
//! happens under the lock for that document's storage key. Different keys never contend.

use crate::model::StorageKey;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

pub type KeyGuard = ArcMutexGuard<RawMutex, ()>;

#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<StorageKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the key is free. Not re-entrant: never lock a key twice on one thread.
    pub fn lock(&self, key: &StorageKey) -> KeyGuard {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_arc()
    }

    /// Lock two keys in a fixed order so concurrent moves cannot deadlock.
    pub fn lock_pair(&self, a: &StorageKey, b: &StorageKey) -> (KeyGuard, Option<KeyGuard>) {
        if a == b {
            return (self.lock(a), None);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.lock(first);
        let second = self.lock(second);
        (first, Some(second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn key(name: &str) -> StorageKey {
        StorageKey::from_relative(Path::new(name))
    }

    #[test]
    fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = locks.lock(&key("a.txt"));
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock(&key("a.txt"));
        let _b = locks.lock(&key("b.txt"));
    }

    #[test]
    fn test_lock_pair_same_key() {
        let locks = KeyLocks::new();
        let (_first, second) = locks.lock_pair(&key("a.txt"), &key("a.txt"));
        assert!(second.is_none());
    }
}
