//! Node Configuration
//!
//! Everything a process needs to join a cache cluster. The peer list is
//! static: every node is started with the same list, its own address
//! included.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{RouterConfig, DEFAULT_BASE_PATH, DEFAULT_CACHE_BYTES, DEFAULT_REPLICAS};
use crate::error::{Error, Result};
use crate::transport::http::HttpPoolConfig;

/// Cache node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's peer address (e.g. `http://localhost:8001`)
    pub self_addr: String,

    /// Every peer in the cluster, this node included
    pub peers: Vec<String>,

    /// URL path prefix for peer requests
    pub base_path: String,

    /// Virtual nodes per peer on the hash ring
    pub replicas: usize,

    /// Namespace served by the demo loader and the API server
    pub namespace: String,

    /// Namespace capacity in bytes (0 = unlimited)
    pub cache_bytes: u64,

    /// Peer fetch timeout in seconds
    pub peer_timeout_secs: u64,

    /// Front-end API bind address, if the API server is enabled
    pub api_addr: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            self_addr: "http://localhost:8001".to_string(),
            peers: vec!["http://localhost:8001".to_string()],
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            namespace: "scores".to_string(),
            cache_bytes: DEFAULT_CACHE_BYTES,
            peer_timeout_secs: 30,
            api_addr: None,
        }
    }
}

impl NodeConfig {
    /// Check the configuration for values the node cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.self_addr.starts_with("http://") {
            return Err(Error::Config(format!(
                "self address must be an http:// URL: {}",
                self.self_addr
            )));
        }

        if let Some(peer) = self.peers.iter().find(|p| !p.starts_with("http://")) {
            return Err(Error::Config(format!(
                "peer address must be an http:// URL: {}",
                peer
            )));
        }

        if let Some(addr) = std::iter::once(&self.self_addr)
            .chain(&self.peers)
            .find(|a| a.ends_with('/'))
        {
            return Err(Error::Config(format!(
                "address must not end with '/': {}",
                addr
            )));
        }

        if !self.peers.contains(&self.self_addr) {
            return Err(Error::Config(format!(
                "peer list must include this node ({})",
                self.self_addr
            )));
        }

        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                self.base_path
            )));
        }

        if self.replicas == 0 {
            return Err(Error::Config("replicas must be at least 1".to_string()));
        }

        if self.namespace.is_empty() {
            return Err(Error::Config("namespace must not be empty".to_string()));
        }

        Ok(())
    }

    /// `host:port` the peer server binds to, taken from the self address
    pub fn listen_addr(&self) -> Result<&str> {
        self.self_addr
            .strip_prefix("http://")
            .map(|rest| rest.trim_end_matches('/'))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| Error::Config(format!("invalid self address: {}", self.self_addr)))
    }

    /// Peer transport settings derived from this configuration
    pub fn pool_config(&self) -> HttpPoolConfig {
        HttpPoolConfig {
            base_path: self.base_path.clone(),
            router: RouterConfig {
                replicas: self.replicas,
                hash: None,
            },
            request_timeout: Duration::from_secs(self.peer_timeout_secs),
        }
    }
}
