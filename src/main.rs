//! ShardCache Node
//!
//! Runs one cache node: a `scores` namespace backed by a slow in-memory
//! database, the peer server, and optionally the front-end API server.
//!
//! ```text
//! shardcache --port 8001 &
//! shardcache --port 8002 &
//! shardcache --port 8003 --api &
//!
//! curl "http://localhost:9999/api?key=Tom"
//! 630
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shardcache::cache::{Loader, DEFAULT_BASE_PATH, DEFAULT_CACHE_BYTES, DEFAULT_REPLICAS};
use shardcache::{ApiServer, Error, HttpPool, NodeConfig, Registry, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// ShardCache - peer-aware read-through cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host name peers use to reach this node
    #[arg(long, env = "SHARDCACHE_HOST", default_value = "localhost")]
    host: String,

    /// Peer server port
    #[arg(long, env = "SHARDCACHE_PORT", default_value = "8001")]
    port: u16,

    /// Every peer in the cluster, this node included (comma-separated)
    #[arg(
        long,
        env = "SHARDCACHE_PEERS",
        value_delimiter = ',',
        default_value = "http://localhost:8001,http://localhost:8002,http://localhost:8003"
    )]
    peers: Vec<String>,

    /// Start the front-end API server
    #[arg(long, env = "SHARDCACHE_API")]
    api: bool,

    /// Front-end API bind address
    #[arg(long, env = "SHARDCACHE_API_ADDR", default_value = "localhost:9999")]
    api_addr: String,

    /// Namespace served by the API
    #[arg(long, env = "SHARDCACHE_NAMESPACE", default_value = "scores")]
    namespace: String,

    /// Namespace capacity in bytes (0 = unlimited)
    #[arg(long, env = "SHARDCACHE_CACHE_BYTES", default_value_t = DEFAULT_CACHE_BYTES)]
    cache_bytes: u64,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, env = "SHARDCACHE_REPLICAS", default_value_t = DEFAULT_REPLICAS)]
    replicas: usize,

    /// URL path prefix for peer requests
    #[arg(long, env = "SHARDCACHE_BASE_PATH", default_value = DEFAULT_BASE_PATH)]
    base_path: String,

    /// Peer fetch timeout in seconds
    #[arg(long, env = "SHARDCACHE_PEER_TIMEOUT_SECS", default_value = "30")]
    peer_timeout_secs: u64,

    /// Simulated database latency in milliseconds
    #[arg(long, env = "SHARDCACHE_DB_LATENCY_MS", default_value = "100")]
    db_latency_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            self_addr: format!("http://{}:{}", self.host, self.port),
            peers: self.peers.clone(),
            base_path: self.base_path.clone(),
            replicas: self.replicas,
            namespace: self.namespace.clone(),
            cache_bytes: self.cache_bytes,
            peer_timeout_secs: self.peer_timeout_secs,
            api_addr: self.api.then(|| self.api_addr.clone()),
        }
    }
}

// =============================================================================
// Demo Data Source
// =============================================================================

/// In-memory "database" with artificial latency
struct SlowDb {
    records: HashMap<&'static str, &'static str>,
    latency: Duration,
}

impl SlowDb {
    fn new(latency: Duration) -> Self {
        let records = HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);
        Self { records, latency }
    }
}

#[async_trait]
impl Loader for SlowDb {
    async fn load(&self, key: &str) -> Result<Vec<u8>> {
        info!(key, "[SlowDB] search key");
        tokio::time::sleep(self.latency).await;

        self.records
            .get(key)
            .map(|v| v.as_bytes().to_vec())
            .ok_or_else(|| Error::not_found(key))
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    let config = args.node_config();
    config.validate()?;

    info!("Starting ShardCache node");
    info!("  Address: {}", config.self_addr);
    info!("  Peers: {:?}", config.peers);
    info!("  Namespace: {} ({} bytes)", config.namespace, config.cache_bytes);
    info!("  Replicas: {}", config.replicas);

    let registry = Arc::new(Registry::new());
    let group = registry.create_namespace(
        config.namespace.clone(),
        config.cache_bytes,
        Arc::new(SlowDb::new(Duration::from_millis(args.db_latency_ms))),
    );

    let pool = Arc::new(HttpPool::with_config(
        config.self_addr.clone(),
        Arc::clone(&registry),
        config.pool_config(),
    )?);
    pool.set_peers(&config.peers);
    group.register_peers(pool.clone())?;

    // Start API server
    if let Some(api_addr) = &config.api_addr {
        let listener = bind(api_addr, "API").await?;
        let api = Arc::new(ApiServer::new(Arc::clone(&registry), config.namespace.clone()));
        tokio::spawn(async move {
            if let Err(e) = api.serve(listener).await {
                error!("API server error: {}", e);
            }
        });
    }

    // Run the peer server
    let listener = bind(config.listen_addr()?, "peer").await?;
    tokio::select! {
        result = pool.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    info!("ShardCache node stopped");
    Ok(())
}

async fn bind(addr: &str, server: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {} server on {}: {}", server, addr, e)))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let directive = |s: &str| -> Result<Directive> {
        s.parse::<Directive>()
            .map_err(|e| Error::Config(format!("Invalid log directive {}: {}", s, e)))
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("reqwest=warn")?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
