//! HTTP Peer Transport
//!
//! Peers reach each other over plain HTTP:
//!
//! ```text
//! GET {peer}{base_path}{namespace}/{key}     (both segments percent-encoded)
//!
//! 200  application/octet-stream   raw value bytes
//! 400  text/plain                 path does not match the layout above
//! 404  text/plain                 namespace not registered on this node
//! 500  text/plain                 the namespace's get failed (error text)
//! ```
//!
//! [`HttpPool`] plays both roles for a node: it serves the protocol for its
//! local namespaces and, as a [`PeerPicker`], routes keys to the HTTP clients
//! of the other peers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use reqwest::Client;
use tokio::net::TcpListener;
use tracing::{debug, info};

use super::{response, serve_connections, text_response, Body};
use crate::cache::{
    PeerConnector, PeerFetcher, PeerPicker, PeerRouter, Registry, RouterConfig, DEFAULT_BASE_PATH,
};
use crate::error::{Error, Result};

/// Peer transport configuration
#[derive(Debug, Clone)]
pub struct HttpPoolConfig {
    /// URL path prefix for peer requests, slash-delimited
    pub base_path: String,
    /// Ring settings
    pub router: RouterConfig,
    /// Timeout for a single peer fetch
    pub request_timeout: Duration,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            router: RouterConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for one peer
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    peer: String,
    base_url: String,
    client: Client,
}

impl HttpFetcher {
    /// Client for `peer` (e.g. `http://10.0.0.2:8001`) using `base_path`
    pub fn new(peer: impl Into<String>, base_path: &str, client: Client) -> Self {
        let peer = peer.into();
        let base_url = format!("{}{}", peer_id(&peer), base_path);
        Self {
            peer,
            base_url,
            client,
        }
    }

    fn url(&self, namespace: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(namespace),
            urlencoding::encode(key)
        )
    }

    fn unavailable(&self, reason: impl Into<String>) -> Error {
        Error::PeerUnavailable {
            peer: self.peer.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PeerFetcher for HttpFetcher {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn fetch(&self, namespace: &str, key: &str) -> Result<Bytes> {
        let url = self.url(namespace, key);
        debug!(peer = %self.peer, url = %url, "Fetching from peer");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.unavailable(format!("server returned: {}", response.status())));
        }

        response
            .bytes()
            .await
            .map_err(|e| self.unavailable(format!("reading response body: {}", e)))
    }
}

/// Builds [`HttpFetcher`]s that share one connection pool
#[derive(Debug, Clone)]
pub struct HttpConnector {
    base_path: String,
    client: Client,
}

impl HttpConnector {
    /// Create a connector with a per-request timeout
    pub fn new(base_path: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_path: base_path.into(),
            client,
        })
    }
}

impl PeerConnector for HttpConnector {
    fn connect(&self, peer: &str) -> Arc<dyn PeerFetcher> {
        Arc::new(HttpFetcher::new(peer, &self.base_path, self.client.clone()))
    }
}

// =============================================================================
// Pool
// =============================================================================

/// A node's HTTP peer pool: server for local namespaces, router for remote keys
pub struct HttpPool {
    self_addr: String,
    base_path: String,
    registry: Arc<Registry>,
    router: PeerRouter,
}

impl HttpPool {
    /// Pool for the node reachable at `self_addr` (e.g. `http://localhost:8001`)
    pub fn new(self_addr: impl Into<String>, registry: Arc<Registry>) -> Result<Self> {
        Self::with_config(self_addr, registry, HttpPoolConfig::default())
    }

    /// Pool with custom base path, ring settings and timeout
    pub fn with_config(
        self_addr: impl Into<String>,
        registry: Arc<Registry>,
        config: HttpPoolConfig,
    ) -> Result<Self> {
        if !config.base_path.starts_with('/') || !config.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                config.base_path
            )));
        }

        let self_addr = peer_id(&self_addr.into()).to_string();
        let connector = HttpConnector::new(config.base_path.clone(), config.request_timeout)?;
        let router = PeerRouter::with_config(self_addr.clone(), config.router, Arc::new(connector));

        Ok(Self {
            self_addr,
            base_path: config.base_path,
            registry,
            router,
        })
    }

    /// Replace the peer set. `peers` should include this node's own address.
    ///
    /// Trailing slashes are ignored, so `http://host:8001/` and
    /// `http://host:8001` name the same peer.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.router
            .reconfigure(peers.into_iter().map(|p| peer_id(p.as_ref()).to_string()));
    }

    /// This node's address
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// URL path prefix served by this pool
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Ring router backing [`PeerPicker`]
    pub fn router(&self) -> &PeerRouter {
        &self.router
    }

    /// Serve the peer protocol on `listener` until accepting fails
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(node = %self.self_addr, %addr, base_path = %self.base_path, "Peer server listening");
        }

        serve_connections(listener, "peer", move |req: Request<Incoming>| {
            let pool = Arc::clone(&self);
            async move { pool.handle(req).await }
        })
        .await
    }

    async fn handle(&self, req: Request<Incoming>) -> Response<Body> {
        debug!(node = %self.self_addr, method = %req.method(), path = req.uri().path(), "Peer request");
        self.respond(req.uri().path()).await
    }

    /// Answer a peer request for the (still percent-encoded) URL path
    pub async fn respond(&self, path: &str) -> Response<Body> {
        let (namespace, key) = match parse_path(&self.base_path, path) {
            Ok(parts) => parts,
            Err(e) => return text_response(StatusCode::BAD_REQUEST, e.to_string()),
        };

        let Some(group) = self.registry.lookup(&namespace) else {
            let err = Error::UnknownNamespace(namespace);
            return text_response(StatusCode::NOT_FOUND, err.to_string());
        };

        match group.get(&key).await {
            Ok(value) => response(StatusCode::OK, "application/octet-stream", value.bytes()),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        self.router.pick_peer(key)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_addr", &self.self_addr)
            .field("base_path", &self.base_path)
            .field("router", &self.router)
            .finish()
    }
}

/// Canonical peer id: the address without trailing slashes
fn peer_id(addr: &str) -> &str {
    addr.trim_end_matches('/')
}

/// Split `<base_path><namespace>/<key>` into its decoded segments.
///
/// Everything after the first `/` following the namespace is the key, so
/// keys may contain encoded or literal slashes.
fn parse_path(base_path: &str, path: &str) -> Result<(String, String)> {
    let rest = path
        .strip_prefix(base_path)
        .ok_or_else(|| Error::MalformedRequest(format!("unexpected path: {}", path)))?;

    let (namespace, key) = rest
        .split_once('/')
        .filter(|(namespace, key)| !namespace.is_empty() && !key.is_empty())
        .ok_or_else(|| Error::MalformedRequest(format!("expected <namespace>/<key>: {}", path)))?;

    Ok((decode(namespace)?, decode(key)?))
}

fn decode(segment: &str) -> Result<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| Error::MalformedRequest(format!("bad percent-encoding in {}: {}", segment, e)))
}

// =============================================================================
// Tests
// =============================================================================
