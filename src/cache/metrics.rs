//! Namespace Metrics
//!
//! Lock-free counters describing how a namespace served its reads.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::store::StoreStats;

/// Per-namespace counters
#[derive(Debug, Default)]
pub struct GroupMetrics {
    gets: AtomicU64,
    hits: AtomicU64,
    loads: AtomicU64,
    local_loads: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    loader_errors: AtomicU64,
}

impl GroupMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loader_error(&self) {
        self.loader_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn local_loads(&self) -> u64 {
        self.local_loads.load(Ordering::Relaxed)
    }

    pub fn peer_loads(&self) -> u64 {
        self.peer_loads.load(Ordering::Relaxed)
    }

    pub fn peer_errors(&self) -> u64 {
        self.peer_errors.load(Ordering::Relaxed)
    }

    pub fn loader_errors(&self) -> u64 {
        self.loader_errors.load(Ordering::Relaxed)
    }

    /// Hit ratio over all non-empty-key gets
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets() as f64;
        if gets == 0.0 {
            0.0
        } else {
            self.hits() as f64 / gets
        }
    }
}

/// Point-in-time view of a namespace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    /// Namespace name
    pub name: String,
    /// Gets with a non-empty key
    pub gets: u64,
    /// Gets served from the local store
    pub hits: u64,
    /// Loads actually started (one per coalesced miss burst)
    pub loads: u64,
    /// Loads served by the application loader
    pub local_loads: u64,
    /// Loads served by the owning peer
    pub peer_loads: u64,
    /// Peer fetches that failed and fell back to the loader
    pub peer_errors: u64,
    /// Loader failures
    pub loader_errors: u64,
    /// Gets that waited on another caller's load
    pub coalesced: u64,
    /// Entries in the local store
    pub entries: usize,
    /// Bytes used by the local store
    pub used_bytes: u64,
    /// Store capacity in bytes (0 = unlimited)
    pub capacity_bytes: u64,
    /// Store evictions
    pub evictions: u64,
    /// Hit ratio (0.0 - 1.0)
    pub hit_ratio: f64,
}

impl GroupStats {
    pub(crate) fn collect(
        name: &str,
        metrics: &GroupMetrics,
        store: StoreStats,
        coalesced: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            gets: metrics.gets(),
            hits: metrics.hits(),
            loads: metrics.loads(),
            local_loads: metrics.local_loads(),
            peer_loads: metrics.peer_loads(),
            peer_errors: metrics.peer_errors(),
            loader_errors: metrics.loader_errors(),
            coalesced,
            entries: store.entries,
            used_bytes: store.used_bytes,
            capacity_bytes: store.capacity_bytes,
            evictions: store.evictions,
            hit_ratio: metrics.hit_ratio(),
        }
    }
}
