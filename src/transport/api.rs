//! Front-End API Server
//!
//! Client-facing HTTP endpoints of a node:
//!
//! - `GET /api?key=<key>` - read a key through the node's API namespace
//! - `GET /api/stats` - JSON stats for every namespace
//! - `GET /metrics` - Prometheus text exposition of the same stats
//! - `GET /healthz`, `/livez`, `/readyz` - liveness and readiness probes

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, TextEncoder};
use tokio::net::TcpListener;
use tracing::{debug, info};

use super::{response, serve_connections, text_response, Body};
use crate::cache::{GroupStats, Registry};
use crate::error::{Error, Result};

type Field<T> = fn(&GroupStats) -> T;

const NAMESPACE_LABEL: &str = "namespace";

const COUNTERS: [(&str, &str, Field<u64>); 9] = [
    ("shardcache_gets_total", "Gets with a non-empty key", |s| s.gets),
    ("shardcache_hits_total", "Gets served from the local store", |s| s.hits),
    ("shardcache_loads_total", "Loads started after a miss", |s| s.loads),
    ("shardcache_local_loads_total", "Loads served by the loader", |s| s.local_loads),
    ("shardcache_peer_loads_total", "Loads served by the owning peer", |s| s.peer_loads),
    ("shardcache_peer_errors_total", "Failed peer fetches", |s| s.peer_errors),
    ("shardcache_loader_errors_total", "Failed loader calls", |s| s.loader_errors),
    ("shardcache_coalesced_total", "Gets that waited on another load", |s| s.coalesced),
    ("shardcache_evictions_total", "Store evictions", |s| s.evictions),
];

const GAUGES: [(&str, &str, Field<i64>); 3] = [
    ("shardcache_entries", "Entries in the local store", |s| s.entries as i64),
    ("shardcache_used_bytes", "Bytes used by the local store", |s| s.used_bytes as i64),
    ("shardcache_capacity_bytes", "Store capacity in bytes (0 = unlimited)", |s| {
        s.capacity_bytes as i64
    }),
];

/// Client-facing HTTP server
pub struct ApiServer {
    registry: Arc<Registry>,
    namespace: String,
}

impl ApiServer {
    /// Serve `/api` reads from `namespace`
    pub fn new(registry: Arc<Registry>, namespace: impl Into<String>) -> Self {
        Self {
            registry,
            namespace: namespace.into(),
        }
    }

    /// Serve the API on `listener` until accepting fails
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, namespace = %self.namespace, "API server listening");
        }

        serve_connections(listener, "api", move |req: Request<Incoming>| {
            let server = Arc::clone(&self);
            async move { server.handle(req).await }
        })
        .await
    }

    async fn handle(&self, req: Request<Incoming>) -> Response<Body> {
        debug!(method = %req.method(), uri = %req.uri(), "API request");
        self.respond(req.uri().path(), req.uri().query()).await
    }

    /// Answer a request for `path` with an optional raw query string
    pub async fn respond(&self, path: &str, query: Option<&str>) -> Response<Body> {
        match path {
            "/api" => self.get(query).await,
            "/api/stats" => self.stats(),
            "/metrics" => self.metrics(),
            "/healthz" | "/livez" | "/readyz" => text_response(StatusCode::OK, "ok"),
            _ => text_response(StatusCode::NOT_FOUND, "not found"),
        }
    }

    async fn get(&self, query: Option<&str>) -> Response<Body> {
        match self.read(query).await {
            Ok(value) => response(StatusCode::OK, "application/octet-stream", value),
            Err(e) => {
                let status =
                    StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                text_response(status, e.to_string())
            }
        }
    }

    async fn read(&self, query: Option<&str>) -> Result<bytes::Bytes> {
        let key = query_param(query.unwrap_or_default(), "key")?;
        let group = self
            .registry
            .lookup(&self.namespace)
            .ok_or_else(|| Error::UnknownNamespace(self.namespace.clone()))?;
        Ok(group.get(&key).await?.bytes())
    }

    fn stats(&self) -> Response<Body> {
        match serde_json::to_vec(&self.registry.stats()) {
            Ok(json) => response(StatusCode::OK, "application/json", json),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    fn metrics(&self) -> Response<Body> {
        match render_metrics(&self.registry.stats()) {
            Ok(text) => response(StatusCode::OK, prometheus::TEXT_FORMAT, text),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer")
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Decoded value of `name` in a query string
fn query_param(query: &str, name: &str) -> Result<String> {
    let raw = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .ok_or_else(|| Error::MalformedRequest(format!("missing query parameter: {}", name)))?;

    urlencoding::decode(&raw.replace('+', " "))
        .map(|v| v.into_owned())
        .map_err(|e| Error::MalformedRequest(format!("bad percent-encoding in {}: {}", name, e)))
}

/// Render namespace stats in the Prometheus text format
pub fn render_metrics(stats: &[GroupStats]) -> Result<String> {
    let registry = prometheus::Registry::new();

    for (name, help, field) in COUNTERS {
        let family =
            IntCounterVec::new(Opts::new(name, help), &[NAMESPACE_LABEL]).map_err(metrics_error)?;
        for s in stats {
            family.with_label_values(&[s.name.as_str()]).inc_by(field(s));
        }
        registry.register(Box::new(family)).map_err(metrics_error)?;
    }

    for (name, help, field) in GAUGES {
        let family =
            IntGaugeVec::new(Opts::new(name, help), &[NAMESPACE_LABEL]).map_err(metrics_error)?;
        for s in stats {
            family.with_label_values(&[s.name.as_str()]).set(field(s));
        }
        registry.register(Box::new(family)).map_err(metrics_error)?;
    }

    let hit_ratio = GaugeVec::new(
        Opts::new("shardcache_hit_ratio", "Hit ratio (0.0 - 1.0)"),
        &[NAMESPACE_LABEL],
    )
    .map_err(metrics_error)?;
    for s in stats {
        hit_ratio.with_label_values(&[s.name.as_str()]).set(s.hit_ratio);
    }
    registry.register(Box::new(hit_ratio)).map_err(metrics_error)?;

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(metrics_error)?;

    String::from_utf8(buffer).map_err(|e| Error::Internal(format!("Metrics not UTF-8: {}", e)))
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("Metrics encoding failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LoaderFn;
    use http_body_util::BodyExt;

    async fn body_text(resp: Response<Body>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn server() -> ApiServer {
        let registry = Arc::new(Registry::new());
        registry.create_namespace(
            "scores",
            2 << 10,
            Arc::new(LoaderFn(|key: &str| match key {
                "Tom" => Ok(b"630".to_vec()),
                "Jack Ma" => Ok(b"589".to_vec()),
                _ => Err(Error::not_found(key)),
            })),
        );
        ApiServer::new(registry, "scores")
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("key=Tom", "key").unwrap(), "Tom");
        assert_eq!(query_param("a=1&key=Jack+Ma", "key").unwrap(), "Jack Ma");
        assert_eq!(query_param("key=a%2Fb", "key").unwrap(), "a/b");
        assert!(matches!(
            query_param("a=1", "key"),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_get_statuses() {
        let server = server();

        let ok = server.respond("/api", Some("key=Tom")).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_text(ok).await, "630");

        let spaced = server.respond("/api", Some("key=Jack%20Ma")).await;
        assert_eq!(body_text(spaced).await, "589");

        let missing = server.respond("/api", Some("key=kkk")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let empty = server.respond("/api", Some("key=")).await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let no_query = server.respond("/api", None).await;
        assert_eq!(no_query.status(), StatusCode::BAD_REQUEST);

        let unknown = server.respond("/nope", None).await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_api_namespace() {
        let server = ApiServer::new(Arc::new(Registry::new()), "scores");
        let resp = server.respond("/api", Some("key=Tom")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, "No such namespace: scores");
    }

    #[tokio::test]
    async fn test_stats_and_metrics() {
        let server = server();
        server.respond("/api", Some("key=Tom")).await;
        server.respond("/api", Some("key=Tom")).await;

        let stats = server.respond("/api/stats", None).await;
        assert_eq!(stats.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(stats).await).unwrap();
        assert_eq!(json[0]["name"], "scores");
        assert_eq!(json[0]["gets"], 2);
        assert_eq!(json[0]["hits"], 1);
        assert_eq!(json[0]["local_loads"], 1);

        let metrics = body_text(server.respond("/metrics", None).await).await;
        assert!(metrics.contains("shardcache_gets_total{namespace=\"scores\"} 2"));
        assert!(metrics.contains("shardcache_hits_total{namespace=\"scores\"} 1"));
        assert!(metrics.contains("shardcache_entries{namespace=\"scores\"} 1"));
        assert!(metrics.contains("shardcache_hit_ratio{namespace=\"scores\"} 0.5"));
    }

    #[tokio::test]
    async fn test_health() {
        let resp = server().respond("/healthz", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }

    #[test]
    fn test_render_metrics_without_namespaces() {
        let text = render_metrics(&[]).unwrap();
        assert!(!text.contains("namespace="));
    }
}
