//! Cost-weighted, access-frequency aware membership index.
//!
//! The index is the sole source of truth for which chunks are logically
//! cached. Lookups only touch a [`DashMap`] shard and a couple of atomics;
//! the eviction pass is serialized by a mutex that readers never take.

use std::sync::atomic::{AtomicU64, Ordering};

use br_core::ChunkHash;
use dashmap::DashMap;
use parking_lot::Mutex;

struct IndexEntry {
    cost: u64,
    hits: AtomicU64,
    last_access: AtomicU64,
}

/// Outcome of registering a hash.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Newly registered; carries whatever had to be evicted to make room.
    Admitted { evicted: Vec<ChunkHash> },
    /// Already resident; only its access stats were refreshed.
    Present,
    /// Costs more than the whole budget.
    Rejected,
}

pub struct CostIndex {
    entries: DashMap<ChunkHash, IndexEntry>,
    total_cost: AtomicU64,
    max_cost: u64,
    clock: AtomicU64,
    evicting: Mutex<()>,
}

impl CostIndex {
    pub fn new(max_cost: u64) -> Self {
        Self {
            entries: DashMap::new(),
            total_cost: AtomicU64::new(0),
            max_cost,
            clock: AtomicU64::new(0),
            evicting: Mutex::new(()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Membership check that does not count as an access.
    pub fn contains(&self, hash: &ChunkHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Membership check that records an access.
    pub fn touch(&self, hash: &ChunkHash) -> bool {
        match self.entries.get(hash) {
            Some(entry) => {
                entry.hits.fetch_add(1, Ordering::Relaxed);
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Register `hash` with `cost`, evicting low-value entries if the budget
    /// is exceeded.
    pub fn insert(&self, hash: ChunkHash, cost: u64) -> Admission {
        if cost > self.max_cost {
            return Admission::Rejected;
        }

        match self.entries.entry(hash.clone()) {
            dashmap::mapref::entry::Entry::Occupied(e) => {
                e.get().last_access.store(self.tick(), Ordering::Relaxed);
                return Admission::Present;
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(IndexEntry {
                    cost,
                    hits: AtomicU64::new(0),
                    last_access: AtomicU64::new(self.tick()),
                });
                self.total_cost.fetch_add(cost, Ordering::Relaxed);
            }
        }

        Admission::Admitted {
            evicted: self.evict(&hash),
        }
    }

    /// Drop `hash` from the index. Returns whether it was present.
    pub fn remove(&self, hash: &ChunkHash) -> bool {
        match self.entries.remove(hash) {
            Some((_, entry)) => {
                self.total_cost.fetch_sub(entry.cost, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost.load(Ordering::Relaxed)
    }

    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }

    fn evict(&self, keep: &ChunkHash) -> Vec<ChunkHash> {
        let mut evicted = Vec::new();
        if self.total_cost() <= self.max_cost {
            return evicted;
        }

        let _guard = self.evicting.lock();
        while self.total_cost() > self.max_cost {
            // Fewest hits first, least recently used among equals.
            let victim = self
                .entries
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| {
                    (
                        entry.hits.load(Ordering::Relaxed),
                        entry.last_access.load(Ordering::Relaxed),
                    )
                })
                .map(|entry| entry.key().clone());

            let Some(victim) = victim else {
                break;
            };
            if self.remove(&victim) {
                evicted.push(victim);
            }
        }

        // Age the survivors so past popularity fades.
        for entry in self.entries.iter() {
            let hits = entry.hits.load(Ordering::Relaxed);
            entry.hits.store(hits / 2, Ordering::Relaxed);
        }
        evicted
    }
}
