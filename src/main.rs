//! Caching HTTP Reverse Proxy
//!
//! Forwards `GET` requests to one fixed origin and keeps successful bodies in
//! an in-memory cache that expires entries after a period of inactivity.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                CACHING PROXY                  │
//!                        │                                               │
//!     Client Request     │  ┌─────────┐    ┌─────────┐    ┌──────────┐   │
//!     ───────────────────┼─▶│   net   │───▶│  proxy  │───▶│ upstream │───┼──▶ Origin
//!                        │  │listener │    │ server  │    │  client  │   │
//!     Client Response    │  └─────────┘    └────┬────┘    └──────────┘   │
//!     ◀──────────────────┼────────────────────  │                        │
//!                        │                ┌─────▼─────┐   ┌──────────┐   │
//!                        │                │   cache   │◀──│ control  │◀──┼── --clear-cache
//!                        │                │ + sweeper │   │  socket  │   │
//!                        │                └───────────┘   └──────────┘   │
//!                        │                                               │
//!                        │  config · observability · resilience ·        │
//!                        │  lifecycle                                    │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser};

use caching_proxy::cache::ExpiringCache;
use caching_proxy::config::{load_config_with, ProxyConfig};
use caching_proxy::lifecycle::{wait_for_shutdown_signal, Shutdown};
use caching_proxy::net::Listener;
use caching_proxy::observability::{logging, metrics};
use caching_proxy::proxy::{ProxyServer, ServerSettings};
use caching_proxy::resilience::RetryPolicy;
use caching_proxy::upstream::{Endpoint, TcpConnector, UpstreamClient};

#[derive(Parser, Debug)]
#[command(name = "caching-proxy", version, about = "Caching HTTP reverse proxy")]
#[command(group(
    ArgGroup::new("options")
        .required(true)
        .multiple(true)
        .args(["config", "port", "origin", "keep_alive", "clear_cache"])
))]
struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, value_name = "N")]
    port: Option<u16>,

    /// Origin to forward to, e.g. `https://dummyjson.com`.
    #[arg(long, value_name = "URL")]
    origin: Option<String>,

    /// Seconds an unused entry stays cached (minimum 300).
    #[arg(long = "keep-alive", value_name = "SECS")]
    keep_alive: Option<u64>,

    /// Clear the cache of the running instance and exit.
    #[arg(long = "clear-cache")]
    clear_cache: bool,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(origin) = &self.origin {
            config.upstream.origin = origin.clone();
        }
        if let Some(keep_alive) = self.keep_alive {
            config.cache.keep_alive_secs = keep_alive;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config_with(cli.config.as_deref(), |config| cli.apply(config))?;

    if cli.clear_cache {
        return clear_cache(&config).await;
    }

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "caching-proxy starting");

    if let Err(e) = serve(config).await {
        tracing::error!(error = %e, "Fatal error");
        return Err(e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn serve(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        port = config.listener.port,
        origin = %config.upstream.origin,
        keep_alive_secs = config.cache.keep_alive_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let cache = Arc::new(ExpiringCache::new(config.cache.settings()));
    cache.start();

    let endpoint = Endpoint::parse(&config.upstream.origin)?;
    let connector = TcpConnector::new(config.upstream.timeout())?;
    let upstream = UpstreamClient::new(
        endpoint,
        connector,
        config.upstream.timeout(),
        RetryPolicy::from_config(&config.upstream),
    );

    let addr: SocketAddr = config.listener.socket_address().parse()?;
    let listener = Listener::bind(addr)?;

    let shutdown = Shutdown::new();
    let server_rx = shutdown.subscribe();

    #[cfg(unix)]
    let control = if config.control.enabled {
        let server = caching_proxy::control::ControlServer::bind(
            config.control.socket_path.clone(),
            Arc::clone(&cache),
        )?;
        Some(tokio::spawn(server.run(shutdown.subscribe())))
    } else {
        None
    };

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_shutdown.trigger();
    });

    let server = ProxyServer::new(ServerSettings::from_config(&config.listener), Arc::clone(&cache), upstream);
    let result = server.run(listener, server_rx).await;

    // Stop the control socket as well if the accept loop failed on its own.
    shutdown.trigger();
    #[cfg(unix)]
    if let Some(handle) = control {
        let _ = handle.await;
    }
    cache.stop().await;

    result?;
    Ok(())
}

#[cfg(unix)]
async fn clear_cache(config: &ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    use caching_proxy::control::{send_command, ControlCommand};

    let reply = send_command(&config.control.socket_path, ControlCommand::ClearCache).await?;
    match (reply.is_ok(), reply.cleared, reply.message) {
        (true, cleared, _) => {
            println!("Cleared {} cached entries", cleared.unwrap_or(0));
            Ok(())
        }
        (false, _, message) => Err(message
            .unwrap_or_else(|| "running instance refused the request".to_owned())
            .into()),
    }
}

#[cfg(not(unix))]
async fn clear_cache(_config: &ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    Err("--clear-cache requires Unix domain sockets".into())
}
