//! In-process TTL caches for query results.
//!
//! Entries expire on read once their TTL passes. When the cache is full
//! the oldest inserted entry is evicted to make room.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheConfig;
use crate::domain::{CandidateScore, Timeframe, TriggerEvent};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Bounded map with per-cache TTL
pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.inserted_at.elapsed() < self.ttl {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: K, value: V) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().inserted_at)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

/// The two result caches used by the query paths
pub struct CacheManager {
    pub candidates: TtlCache<String, Vec<CandidateScore>>,
    pub triggers: TtlCache<String, Vec<TriggerEvent>>,
}

impl CacheManager {
    pub fn new(config: &CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            candidates: TtlCache::new(
                config.candidate_maxsize,
                Duration::from_secs(config.candidate_ttl_secs),
            ),
            triggers: TtlCache::new(
                config.trigger_maxsize,
                Duration::from_secs(config.trigger_ttl_secs),
            ),
        })
    }

    pub fn candidate_key(asset: &str, timeframe: Timeframe, top_n: usize) -> String {
        format!("candidate:{}:{}:{}", asset, timeframe, top_n)
    }

    pub fn trigger_key(date: chrono::NaiveDate, timeframe: Timeframe) -> String {
        format!("trigger:{}:{}", date, timeframe)
    }

    /// Drop everything. Called when analysis parameters change or a
    /// recalculation finishes, since every cached ranking may be stale.
    pub fn invalidate_all(&self) {
        self.candidates.clear();
        self.triggers.clear();
        debug!("All caches invalidated");
    }
}
