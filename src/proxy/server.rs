//! Accept loop and per-connection request handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::time;
use tracing::Instrument;

use crate::cache::ExpiringCache;
use crate::config::ListenerConfig;
use crate::http::{CacheStatus, HttpRequest, HttpResponse, MessageParser};
use crate::net::{Connection, ConnectionState, Listener, ListenerError};
use crate::observability::metrics;
use crate::resilience::with_timeout;
use crate::upstream::{Connector, TcpConnector, UpstreamClient};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("accept loop stopped: {0}")]
    Accept(#[from] ListenerError),
}

/// Downstream-facing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Longest single wait for a connection before shutdown is rechecked.
    pub accept_wait: Duration,
    /// Size of the single read taken from each client; longer requests are truncated.
    pub read_buffer_bytes: usize,
    pub client_read_timeout: Duration,
}

impl ServerSettings {
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self {
            accept_wait: config.accept_wait(),
            read_buffer_bytes: config.read_buffer_bytes,
            client_read_timeout: config.client_read_timeout(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::from_config(&ListenerConfig::default())
    }
}

/// How one connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from the cache.
    Hit,
    /// Fetched from the origin and cached.
    Miss,
    /// Fetched from the origin, relayed, not cached (status other than 200).
    Uncached,
    /// Origin unreachable or unparseable.
    BadGateway,
    /// Request line could not be parsed.
    BadRequest,
    /// Client sent nothing; closed without a response.
    Empty,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
            Outcome::Uncached => "uncached",
            Outcome::BadGateway => "bad_gateway",
            Outcome::BadRequest => "bad_request",
            Outcome::Empty => "empty",
        }
    }
}

/// Single-connection-at-a-time caching reverse proxy.
pub struct ProxyServer<C = TcpConnector> {
    settings: ServerSettings,
    cache: Arc<ExpiringCache>,
    upstream: UpstreamClient<C>,
}

impl<C: Connector> ProxyServer<C> {
    pub fn new(settings: ServerSettings, cache: Arc<ExpiringCache>, upstream: UpstreamClient<C>) -> Self {
        Self {
            settings,
            cache,
            upstream,
        }
    }

    pub fn cache(&self) -> &Arc<ExpiringCache> {
        &self.cache
    }

    /// Serve connections until `shutdown` fires.
    ///
    /// Each accepted connection is handled to completion before the next
    /// accept. Returns `Ok(())` on shutdown and an error only when accepting
    /// fails; the listener is dropped either way.
    pub async fn run(&self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                origin = %self.upstream.endpoint(),
                "Proxy server starting"
            );
        }

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping accept loop");
                    break;
                }
                accepted = time::timeout(self.settings.accept_wait, listener.accept()) => {
                    match accepted {
                        // Wait elapsed; go round and recheck shutdown.
                        Err(_) => continue,
                        Ok(Ok((stream, peer))) => {
                            self.handle_connection(stream, peer).await;
                        }
                        Ok(Err(e)) => {
                            tracing::error!(error = %e, "Accept failed");
                            return Err(e.into());
                        }
                    }
                }
            }
        }

        drop(listener);
        tracing::info!("Proxy server stopped");
        Ok(())
    }

    /// Read one request from `stream`, answer it, and close.
    pub async fn handle_connection<S>(&self, stream: S, peer: SocketAddr) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let conn = Connection::new(peer);
        let span = tracing::debug_span!("connection", id = %conn.id(), peer = %peer);
        self.serve(conn, stream).instrument(span).await
    }

    async fn serve<S>(&self, mut conn: Connection, mut stream: S) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let start = Instant::now();

        let Some(raw) = self.read_request(&mut stream).await else {
            conn.advance(ConnectionState::Closed);
            let _ = stream.shutdown().await;
            tracing::debug!("Client sent no data");
            metrics::record_request(Outcome::Empty.as_str(), 0, start);
            return Outcome::Empty;
        };
        conn.advance(ConnectionState::RequestRead);

        let (response, outcome) = match MessageParser::<HttpRequest>::new().parse(&raw) {
            Ok(request) => {
                conn.advance(ConnectionState::RequestParsed);
                tracing::debug!(method = %request.method, target = %request.target, "Request parsed");
                self.respond(&mut conn, &request).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting malformed request");
                (HttpResponse::bad_request(), Outcome::BadRequest)
            }
        };
        conn.advance(ConnectionState::ResponseBuilt);

        match with_timeout(self.settings.client_read_timeout, stream.write_all(&response.to_bytes())).await {
            Ok(()) => conn.advance(ConnectionState::ResponseSent),
            Err(e) => tracing::debug!(error = %e, "Failed to write response"),
        }
        let _ = stream.shutdown().await;
        conn.advance(ConnectionState::Closed);

        tracing::debug!(
            outcome = outcome.as_str(),
            status = response.status,
            elapsed = ?start.elapsed(),
            "Connection closed"
        );
        metrics::record_request(outcome.as_str(), response.status, start);
        outcome
    }

    /// One read of at most `read_buffer_bytes`. Bytes past that boundary are
    /// never read, so a longer request is parsed truncated.
    ///
    /// `None` when the client closed, errored or stayed silent.
    async fn read_request<S>(&self, stream: &mut S) -> Option<Vec<u8>>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.settings.read_buffer_bytes];
        match with_timeout(self.settings.client_read_timeout, stream.read(&mut buf)).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some(buf)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Client read failed");
                None
            }
        }
    }

    async fn respond(&self, conn: &mut Connection, request: &HttpRequest) -> (HttpResponse, Outcome) {
        let key = request.cache_key();

        if let Some(body) = self.cache.get(key) {
            conn.advance(ConnectionState::CacheHit);
            self.cache.keep_alive(key, None);
            return (HttpResponse::cache_hit(body), Outcome::Hit);
        }

        conn.advance(ConnectionState::CacheMiss);
        conn.advance(ConnectionState::UpstreamFetch);
        match self.upstream.get(&request.target, &request.raw_headers).await {
            Ok(mut response) => {
                conn.advance(ConnectionState::FetchOk);
                response.mark(CacheStatus::Miss);
                if response.is_ok() {
                    self.cache.keep_alive(key, Some(response.body.clone()));
                    (response, Outcome::Miss)
                } else {
                    tracing::debug!(status = response.status, "Origin reply not cached");
                    (response, Outcome::Uncached)
                }
            }
            Err(_) => {
                conn.advance(ConnectionState::FetchFailed);
                (HttpResponse::bad_gateway(), Outcome::BadGateway)
            }
        }
    }
}
