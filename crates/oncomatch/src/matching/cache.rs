use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};

use super::domain::TreatmentProtocol;
use super::gateway::ProtocolFilters;

/// Time source for cache expiry so tests can advance time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub const DEFAULT_CACHE_TTL_SECS: i64 = 600;

#[derive(Debug, Clone)]
struct CacheEntry {
    protocols: Arc<Vec<TreatmentProtocol>>,
    fetched_at: DateTime<Utc>,
}

/// Time-boxed protocol snapshots keyed by the filters used to fetch them.
///
/// Reads share the lock; a refresh simply overwrites the entry, so concurrent
/// refreshers resolve last-writer-wins.
pub struct ProtocolCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<ProtocolFilters, CacheEntry>>,
}

impl ProtocolCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `filters`, or `None` when missing or older than the TTL.
    pub fn get(&self, filters: &ProtocolFilters) -> Option<Arc<Vec<TreatmentProtocol>>> {
        let now = self.clock.now();
        let guard = self.entries.read().expect("protocol cache lock poisoned");
        guard
            .get(filters)
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .map(|entry| Arc::clone(&entry.protocols))
    }

    /// Store a fresh snapshot; expired entries are dropped on the way in so distinct keys
    /// cannot accumulate past their TTL.
    pub fn insert(
        &self,
        filters: ProtocolFilters,
        protocols: Vec<TreatmentProtocol>,
    ) -> Arc<Vec<TreatmentProtocol>> {
        let now = self.clock.now();
        let protocols = Arc::new(protocols);
        let entry = CacheEntry {
            protocols: Arc::clone(&protocols),
            fetched_at: now,
        };
        let mut guard = self.entries.write().expect("protocol cache lock poisoned");
        guard.retain(|_, cached| now - cached.fetched_at < self.ttl);
        guard.insert(filters, entry);
        protocols
    }

    pub fn invalidate(&self) {
        self.entries
            .write()
            .expect("protocol cache lock poisoned")
            .clear();
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.entries.write().expect("protocol cache lock poisoned");
        let before = guard.len();
        guard.retain(|_, entry| now - entry.fetched_at < self.ttl);
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("protocol cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
