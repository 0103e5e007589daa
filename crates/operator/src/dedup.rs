//! Alert deduplication cache.
//!
//! Maps an AlertManager fingerprint to the time its last firing was
//! accepted for investigation. Repeat firings inside the window are
//! suppressed; entries older than the window are logically absent and are
//! removed both lazily on read and by the per-batch sweep.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Time window (in minutes) during which a repeat firing of the same
/// fingerprint is suppressed.
const DEDUP_WINDOW_MINS: i64 = 5;

pub struct DedupCache {
    window: Duration,
    // All operations take this lock; nothing holds it across an await.
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupCache {
    pub fn new() -> Self {
        Self::with_window(Duration::minutes(DEDUP_WINDOW_MINS))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// True iff a fresh entry exists for `fingerprint`. An expired entry is
    /// removed as a side effect and reported as absent.
    pub fn is_duplicate(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().expect("dedup cache lock poisoned");
        match entries.get(fingerprint) {
            Some(seen) if now - *seen < self.window => true,
            Some(_) => {
                entries.remove(fingerprint);
                false
            }
            None => false,
        }
    }

    /// Record that `fingerprint` was accepted for processing at `now`,
    /// inserting or overwriting the entry.
    pub fn mark_processed(&self, fingerprint: &str, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("dedup cache lock poisoned");
        entries.insert(fingerprint.to_string(), now);
    }

    /// Atomic duplicate-check-then-mark under a single lock. Returns true
    /// (leaving the stored timestamp untouched) when a fresh entry exists;
    /// otherwise marks the fingerprint at `now` and returns false.
    ///
    /// Concurrent batches carrying the same fingerprint must go through
    /// this method: a separate is_duplicate/mark_processed pair would let
    /// both pass the check before either marks.
    pub fn check_and_mark(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().expect("dedup cache lock poisoned");
        if let Some(seen) = entries.get(fingerprint) {
            if now - *seen < self.window {
                return true;
            }
        }
        entries.insert(fingerprint.to_string(), now);
        false
    }

    /// Remove every entry whose age at `now` is at least the window.
    /// Returns the eviction count. Bounds memory growth for fingerprints
    /// that stop firing and are never queried again.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().expect("dedup cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, seen| now - *seen < self.window);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dedup cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
