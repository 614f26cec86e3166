//! Cache Namespace
//!
//! A [`Group`] binds a name, an application loader, a bounded store, an
//! optional peer picker and a load coalescer, and implements the
//! read-through protocol:
//!
//! ```text
//! get(key)
//!   ├─ key == ""            → InvalidArgument
//!   ├─ store hit            → value
//!   └─ miss → coalescer.run(key, load)
//!                load(key)
//!                  ├─ owner is a remote peer → fetch from peer
//!                  │     ├─ ok   → value (local store untouched)
//!                  │     └─ err  → warn, fall through
//!                  └─ loader(key)
//!                        ├─ ok   → populate store, value
//!                        └─ err  → error (store untouched)
//! ```
//!
//! Only values produced by the local loader are stored; each node caches
//! the shard it owns.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::byteview::ByteView;
use super::metrics::{GroupMetrics, GroupStats};
use super::peers::{PeerFetcher, PeerPicker};
use super::singleflight::Coalescer;
use super::store::LruStore;
use crate::error::{Error, Result};

// =============================================================================
// Loader
// =============================================================================

/// Source of truth consulted on a cache miss.
///
/// Return [`Error::NotFound`] for absent keys; any other error is passed to
/// the caller unchanged. Failures are never cached or retried.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load the value for `key`
    async fn load(&self, key: &str) -> Result<Vec<u8>>;
}

/// Adapter turning a plain closure into a [`Loader`]
pub struct LoaderFn<F>(pub F);

#[async_trait]
impl<F> Loader for LoaderFn<F>
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    async fn load(&self, key: &str) -> Result<Vec<u8>> {
        (self.0)(key)
    }
}

// =============================================================================
// Group
// =============================================================================

/// A cache namespace
pub struct Group {
    name: String,
    loader: Arc<dyn Loader>,
    store: Mutex<LruStore<ByteView>>,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    flight: Coalescer<ByteView>,
    metrics: GroupMetrics,
}

impl Group {
    /// Create a namespace whose store holds at most `capacity_bytes`
    /// (0 = unlimited).
    ///
    /// Most callers go through [`Registry::create_namespace`] instead so the
    /// namespace can be found by name.
    ///
    /// [`Registry::create_namespace`]: super::registry::Registry::create_namespace
    pub fn new(name: impl Into<String>, capacity_bytes: u64, loader: Arc<dyn Loader>) -> Self {
        let name = name.into();
        let namespace = name.clone();
        let store = LruStore::with_eviction_callback(
            capacity_bytes,
            Box::new(move |key: &str, value: &ByteView| {
                debug!(namespace = %namespace, key, bytes = value.len(), "Evicted entry");
            }),
        );

        Self {
            name,
            loader,
            store: Mutex::new(store),
            peers: OnceCell::new(),
            flight: Coalescer::new(),
            metrics: GroupMetrics::new(),
        }
    }

    /// Namespace name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the peer picker. A namespace can be bound to peers only once.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers.set(peers).map_err(|_| {
            Error::Config(format!(
                "peers already registered for namespace '{}'",
                self.name
            ))
        })
    }

    /// Read `key` through the cache
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("key is empty".to_string()));
        }
        self.metrics.record_get();

        if let Some(value) = self.lookup_cache(key) {
            self.metrics.record_hit();
            debug!(namespace = %self.name, key, "Cache hit");
            return Ok(value);
        }

        self.flight.run(key, || self.load(key)).await
    }

    fn lookup_cache(&self, key: &str) -> Option<ByteView> {
        self.store.lock().get(key).cloned()
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.metrics.record_load();

        if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
            match self.get_from_peer(peer.as_ref(), key).await {
                Ok(value) => {
                    self.metrics.record_peer_load();
                    return Ok(value);
                }
                Err(e) => {
                    self.metrics.record_peer_error();
                    warn!(
                        namespace = %self.name,
                        peer = peer.peer(),
                        key,
                        error = %e,
                        "Failed to get from peer, loading locally"
                    );
                }
            }
        }

        self.get_locally(key).await
    }

    async fn get_from_peer(&self, peer: &dyn PeerFetcher, key: &str) -> Result<ByteView> {
        let bytes = peer.fetch(&self.name, key).await?;
        Ok(ByteView::from(bytes))
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self.loader.load(key).await.map_err(|e| {
            self.metrics.record_loader_error();
            e
        })?;

        self.metrics.record_local_load();
        let value = ByteView::from(bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.store.lock().add(key, value);
    }

    /// Whether `key` is held in the local store (does not affect recency)
    pub fn is_cached(&self, key: &str) -> bool {
        self.store.lock().contains(key)
    }

    /// Number of entries in the local store
    pub fn cached_entries(&self) -> usize {
        self.store.lock().len()
    }

    /// Snapshot of this namespace's counters and store usage
    pub fn stats(&self) -> GroupStats {
        let store = self.store.lock().stats();
        GroupStats::collect(&self.name, &self.metrics, store, self.flight.coalesced())
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("store", &*self.store.lock())
            .field("has_peers", &self.peers.get().is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
