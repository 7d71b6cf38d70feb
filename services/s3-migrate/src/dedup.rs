// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Time-bounded record of dispatched keys
//!
//! Only the enumerator touches the cache, so implementations need no
//! interior locking. The cache decides what gets *emitted*; whether a
//! transfer actually happens is still up to the destination check.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Default retention window for watch mode (48 hours)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(48 * 60 * 60);

/// Dispatch record consulted by the enumerator
pub trait DedupCache: Send {
    /// Whether `key` has been recorded and not yet evicted
    fn seen(&self, key: &str) -> bool;

    /// Remember that `key` was dispatched at `at`
    fn record(&mut self, key: &str, at: Instant);

    /// Drop every entry whose age at `now` is at least `retention`
    ///
    /// Returns the number of entries removed.
    fn evict_older_than(&mut self, retention: Duration, now: Instant) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process cache; resets on restart
#[derive(Debug, Default)]
pub struct MemoryDedupCache {
    entries: HashMap<String, Instant>,
}

impl MemoryDedupCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupCache for MemoryDedupCache {
    fn seen(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn record(&mut self, key: &str, at: Instant) {
        self.entries.insert(key.to_string(), at);
    }

    fn evict_older_than(&mut self, retention: Duration, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, dispatched_at| now.saturating_duration_since(*dispatched_at) < retention);
        before - self.entries.len()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn record_then_seen() {
        let mut cache = MemoryDedupCache::new();
        assert!(!cache.seen("a"));
        cache.record("a", Instant::now());
        assert!(cache.seen("a"));
        assert!(!cache.seen("b"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_boundary_is_inclusive() {
        let retention = Duration::from_secs(10);
        let mut cache = MemoryDedupCache::new();
        let t0 = Instant::now();
        cache.record("old", t0);
        cache.record("new", t0 + Duration::from_secs(5));

        // Just inside the window nothing goes.
        assert_eq!(cache.evict_older_than(retention, t0 + Duration::from_secs(9)), 0);

        // Exactly at the window the entry is gone.
        assert_eq!(cache.evict_older_than(retention, t0 + retention), 1);
        assert!(!cache.seen("old"));
        assert!(cache.seen("new"));

        assert_eq!(cache.evict_older_than(retention, t0 + Duration::from_secs(60)), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn re_record_refreshes_timestamp() {
        let retention = Duration::from_secs(10);
        let mut cache = MemoryDedupCache::new();
        let t0 = Instant::now();
        cache.record("k", t0);
        cache.record("k", t0 + Duration::from_secs(8));

        assert_eq!(cache.evict_older_than(retention, t0 + Duration::from_secs(12)), 0);
        assert!(cache.seen("k"));
    }
}
