//! ShardCache - Peer-Aware Read-Through Cache
//!
//! A library-embedded cache for a fleet of cooperating processes. Each
//! process serves reads from a bounded in-memory LRU store; on a miss it
//! either loads the value from the application's data source or fetches it
//! from the peer that owns the key under consistent hashing. Concurrent
//! misses for the same key are collapsed into one load.
//!
//! # Architecture
//!
//! ```text
//! client ─▶ Group::get ─▶ LruStore hit?  ── yes ─▶ value
//!                              │ no
//!                              ▼
//!                         Coalescer ─▶ PeerPicker ─▶ remote owner (HTTP)
//!                              │              └──▶ self / none ─▶ Loader ─▶ populate
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Store, ring, coalescer, namespaces and registry
//! - [`config`] - Node configuration
//! - [`error`] - Error types
//! - [`transport`] - HTTP peer protocol and front-end API
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shardcache::{Error, LoaderFn, Registry};
//!
//! # async fn run() -> shardcache::Result<()> {
//! let registry = Registry::new();
//! let scores = registry.create_namespace(
//!     "scores",
//!     2 << 10,
//!     Arc::new(LoaderFn(|key: &str| match key {
//!         "Tom" => Ok(b"630".to_vec()),
//!         _ => Err(Error::not_found(key)),
//!     })),
//! );
//!
//! assert_eq!(scores.get("Tom").await?.to_string(), "630");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use cache::{
    ByteView, Group, GroupStats, HashRing, Loader, LoaderFn, PeerConnector, PeerFetcher,
    PeerPicker, PeerRouter, Registry, RouterConfig,
};
pub use config::NodeConfig;
pub use error::{Error, Result};
pub use transport::{ApiServer, HttpPool};
