//! Peer Routing
//!
//! Ports a namespace uses to find and reach the owner of a key, plus the
//! ring-backed [`PeerRouter`] that implements the routing decision.
//!
//! # Architecture
//!
//! ```text
//! Group::load ──▶ PeerPicker::pick_peer(key) ──▶ Arc<dyn PeerFetcher>
//!                       │                               │
//!                 HashRing::owner                 fetch(namespace, key)
//!                                                       │
//!                                              transport (HTTP, in-process, ...)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::ring::{HashFn, HashRing};
use super::DEFAULT_REPLICAS;
use crate::error::Result;

// =============================================================================
// Ports
// =============================================================================

/// Client for one remote peer
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// Identifier of the peer this client talks to
    fn peer(&self) -> &str;

    /// Fetch `key` from the peer's `namespace`
    async fn fetch(&self, namespace: &str, key: &str) -> Result<Bytes>;
}

/// Locates the peer that owns a key
pub trait PeerPicker: Send + Sync {
    /// Client for the owner of `key`.
    ///
    /// Returns `None` when no peers are configured or when this node owns
    /// the key itself.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}

/// Builds a [`PeerFetcher`] for a peer address
pub trait PeerConnector: Send + Sync {
    /// Create a client for `peer`
    fn connect(&self, peer: &str) -> Arc<dyn PeerFetcher>;
}

// =============================================================================
// Router
// =============================================================================

/// Router configuration
#[derive(Clone)]
pub struct RouterConfig {
    /// Virtual nodes per peer
    pub replicas: usize,
    /// Ring hash function (`None` = CRC-32C)
    pub hash: Option<HashFn>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_REPLICAS,
            hash: None,
        }
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("replicas", &self.replicas)
            .field("custom_hash", &self.hash.is_some())
            .finish()
    }
}

struct RouterState {
    ring: HashRing,
    fetchers: HashMap<String, Arc<dyn PeerFetcher>>,
}

/// Consistent-hash peer router.
///
/// Peer-set replacement and lookups share one mutex; the ring is rebuilt
/// wholesale on every [`PeerRouter::reconfigure`].
pub struct PeerRouter {
    self_id: String,
    config: RouterConfig,
    connector: Arc<dyn PeerConnector>,
    state: Mutex<RouterState>,
}

impl PeerRouter {
    /// Create a router for the node identified by `self_id`
    pub fn new(self_id: impl Into<String>, connector: Arc<dyn PeerConnector>) -> Self {
        Self::with_config(self_id, RouterConfig::default(), connector)
    }

    /// Create a router with custom ring configuration
    pub fn with_config(
        self_id: impl Into<String>,
        config: RouterConfig,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        let ring = HashRing::new(config.replicas, config.hash.clone());
        Self {
            self_id: self_id.into(),
            config,
            connector,
            state: Mutex::new(RouterState {
                ring,
                fetchers: HashMap::new(),
            }),
        }
    }

    /// Replace the full peer set and rebuild the ring.
    ///
    /// The list should include this node's own id so it owns its share of
    /// the keys.
    pub fn reconfigure<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers.into_iter().map(|p| p.as_ref().to_string()).collect();

        let mut ring = HashRing::new(self.config.replicas, self.config.hash.clone());
        ring.configure(&peers);

        let fetchers = peers
            .iter()
            .filter(|peer| **peer != self.self_id)
            .map(|peer| (peer.clone(), self.connector.connect(peer)))
            .collect();

        *self.state.lock() = RouterState { ring, fetchers };

        info!(node = %self.self_id, peers = ?peers, "Peer set updated");
    }

    /// Peer owning `key` (may be this node), or `None` without peers
    pub fn owner(&self, key: &str) -> Option<String> {
        self.state.lock().ring.owner(key).map(str::to_string)
    }

    /// Remote peers this router can fetch from
    pub fn remote_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.state.lock().fetchers.keys().cloned().collect();
        peers.sort();
        peers
    }

    /// This node's id
    pub fn self_id(&self) -> &str {
        &self.self_id
    }
}

impl PeerPicker for PeerRouter {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let state = self.state.lock();
        let owner = state.ring.owner(key)?;
        if owner == self.self_id {
            return None;
        }

        debug!(node = %self.self_id, peer = owner, key, "Picking peer");
        state.fetchers.get(owner).cloned()
    }
}

impl fmt::Debug for PeerRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerRouter")
            .field("self_id", &self.self_id)
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoFetcher {
        peer: String,
    }

    #[async_trait]
    impl PeerFetcher for EchoFetcher {
        fn peer(&self) -> &str {
            &self.peer
        }

        async fn fetch(&self, namespace: &str, key: &str) -> Result<Bytes> {
            Ok(Bytes::from(format!("{}:{}/{}", self.peer, namespace, key)))
        }
    }

    #[derive(Default)]
    struct EchoConnector {
        connects: AtomicUsize,
    }

    impl PeerConnector for EchoConnector {
        fn connect(&self, peer: &str) -> Arc<dyn PeerFetcher> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Arc::new(EchoFetcher {
                peer: peer.to_string(),
            })
        }
    }

    /// Hash that reads the input as a decimal number
    fn numeric_config() -> RouterConfig {
        RouterConfig {
            replicas: 3,
            hash: Some(Arc::new(|data: &[u8]| {
                std::str::from_utf8(data)
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
                    .unwrap_or(0)
            })),
        }
    }

    #[test]
    fn test_no_peers_picks_nothing() {
        let router = PeerRouter::new("self", Arc::new(EchoConnector::default()));
        assert!(router.pick_peer("key").is_none());
        assert!(router.owner("key").is_none());
    }

    #[test]
    fn test_never_picks_self() {
        let connector = Arc::new(EchoConnector::default());
        let router = PeerRouter::with_config("2", numeric_config(), connector.clone());
        router.reconfigure(["2", "4", "6"]);

        // "11" is owned by peer "2" (position 12), which is this node
        assert_eq!(router.owner("11").as_deref(), Some("2"));
        assert!(router.pick_peer("11").is_none());

        // "23" is owned by peer "4" (position 24)
        let peer = router.pick_peer("23").expect("remote owner");
        assert_eq!(peer.peer(), "4");

        // Only remote peers get a client
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(router.remote_peers(), vec!["4", "6"]);
    }

    #[tokio::test]
    async fn test_picked_peer_fetches() {
        let router = PeerRouter::with_config(
            "2",
            numeric_config(),
            Arc::new(EchoConnector::default()),
        );
        router.reconfigure(["2", "4", "6"]);

        let peer = router.pick_peer("5").unwrap();
        let value = peer.fetch("scores", "5").await.unwrap();
        assert_eq!(value, Bytes::from("6:scores/5"));
    }

    #[test]
    fn test_reconfigure_replaces_peer_set() {
        let router = PeerRouter::with_config(
            "2",
            numeric_config(),
            Arc::new(EchoConnector::default()),
        );
        router.reconfigure(["2", "4", "6"]);
        router.reconfigure(["2", "8"]);

        assert_eq!(router.remote_peers(), vec!["8"]);
        assert_eq!(router.owner("23").as_deref(), Some("8"));
        assert_eq!(router.owner("11").as_deref(), Some("2"));
    }

    #[test]
    fn test_concurrent_reconfigure_and_pick() {
        use std::thread;

        let router = Arc::new(PeerRouter::new(
            "http://a:8001",
            Arc::new(EchoConnector::default()),
        ));
        router.reconfigure(["http://a:8001", "http://b:8002"]);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let router = Arc::clone(&router);
                thread::spawn(move || {
                    for i in 0..500 {
                        if t == 0 && i % 50 == 0 {
                            router.reconfigure(["http://a:8001", "http://b:8002", "http://c:8003"]);
                        }
                        let key = format!("key-{}", i);
                        if let Some(peer) = router.pick_peer(&key) {
                            assert_ne!(peer.peer(), "http://a:8001");
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
