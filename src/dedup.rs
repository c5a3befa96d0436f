//! # Dedup Cache
//! Time-windowed, bounded set of event fingerprints.
//!
//! An entry lives for `ttl` after insertion. Expired entries are dropped lazily
//! on access and by [`DedupCache::sweep`]. When the cache is full the
//! oldest-inserted entry goes first. Insertion order and expiry order coincide
//! because every entry gets the same TTL, so a single queue serves both.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_TTL_SECS: i64 = 3600;
pub const DEFAULT_CAPACITY: usize = 4096;

/// Thread-safe fingerprint cache shared by all publish paths.
#[derive(Debug)]
pub struct DedupCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    /// fingerprint -> insertion time
    entries: HashMap<String, DateTime<Utc>>,
    /// `(inserted_at, fingerprint)` in insertion order; may hold stale pairs
    /// for fingerprints that were re-marked or released.
    order: VecDeque<(DateTime<Utc>, String)>,
}

impl Inner {
    fn is_live(&self, fp: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.entries
            .get(fp)
            .is_some_and(|at| now.signed_duration_since(*at) < ttl)
    }

    /// Drop everything at the front of the queue that has expired.
    fn evict_expired(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut evicted = 0;
        while let Some((at, _)) = self.order.front() {
            if now.signed_duration_since(*at) < ttl {
                break;
            }
            if let Some((at, fp)) = self.order.pop_front() {
                if self.entries.get(&fp) == Some(&at) {
                    self.entries.remove(&fp);
                    evicted += 1;
                }
            }
        }
        evicted
    }

    fn evict_oldest(&mut self) -> bool {
        while let Some((at, fp)) = self.order.pop_front() {
            if self.entries.get(&fp) == Some(&at) {
                self.entries.remove(&fp);
                return true;
            }
        }
        false
    }

    fn insert(&mut self, fp: &str, now: DateTime<Utc>, capacity: usize) {
        if !self.entries.contains_key(fp) {
            while self.entries.len() >= capacity && self.evict_oldest() {}
        }
        self.entries.insert(fp.to_string(), now);
        self.order.push_back((now, fp.to_string()));
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS), DEFAULT_CAPACITY)
    }
}

impl DedupCache {
    /// `capacity` of 0 is treated as 1.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    pub fn seen(&self, fingerprint: &str) -> bool {
        self.seen_at(fingerprint, Utc::now())
    }

    pub fn mark(&self, fingerprint: &str) {
        self.mark_at(fingerprint, Utc::now())
    }

    /// Whether `fingerprint` was marked less than `ttl` before `now`.
    pub fn seen_at(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        inner.evict_expired(now, self.ttl);
        inner.is_live(fingerprint, now, self.ttl)
    }

    /// Record `fingerprint` at `now`. Re-marking restarts its window.
    pub fn mark_at(&self, fingerprint: &str, now: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.evict_expired(now, self.ttl);
        inner.insert(fingerprint, now, self.capacity);
    }

    /// Check-then-mark under one lock. Returns `true` if the caller now owns the
    /// fingerprint (it was not live), `false` if it was already seen.
    pub fn claim_at(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        inner.evict_expired(now, self.ttl);
        if inner.is_live(fingerprint, now, self.ttl) {
            return false;
        }
        inner.insert(fingerprint, now, self.capacity);
        true
    }

    pub fn claim(&self, fingerprint: &str) -> bool {
        self.claim_at(fingerprint, Utc::now())
    }

    /// Forget a claim whose delivery failed, so a later run may try again.
    pub fn release(&self, fingerprint: &str) {
        self.lock().entries.remove(fingerprint);
    }

    /// Drop all expired entries. Returns how many were removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.lock();
        let n = inner.evict_expired(now, self.ttl);
        // stale queue pairs of released fingerprints are dropped here too
        let entries = std::mem::take(&mut inner.entries);
        inner.order.retain(|(at, fp)| entries.get(fp) == Some(at));
        inner.entries = entries;
        n
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
