//! Per-connection identity and state tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track where a connection is in the request/response cycle

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    RequestRead,
    RequestParsed,
    CacheHit,
    CacheMiss,
    UpstreamFetch,
    FetchOk,
    FetchFailed,
    ResponseBuilt,
    ResponseSent,
    /// Terminal. Reached on every path.
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::RequestRead => "request_read",
            ConnectionState::RequestParsed => "request_parsed",
            ConnectionState::CacheHit => "cache_hit",
            ConnectionState::CacheMiss => "cache_miss",
            ConnectionState::UpstreamFetch => "upstream_fetch",
            ConnectionState::FetchOk => "fetch_ok",
            ConnectionState::FetchFailed => "fetch_failed",
            ConnectionState::ResponseBuilt => "response_built",
            ConnectionState::ResponseSent => "response_sent",
            ConnectionState::Closed => "closed",
        }
    }

    /// Whether `next` is a legal step from `self`.
    ///
    /// Any state may jump to `Closed`; a connection that fails early still
    /// ends there.
    pub fn can_advance_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Accepted, RequestRead)
                | (RequestRead, RequestParsed)
                | (RequestRead, ResponseBuilt)
                | (RequestParsed, CacheHit)
                | (RequestParsed, CacheMiss)
                | (CacheHit, ResponseBuilt)
                | (CacheMiss, UpstreamFetch)
                | (UpstreamFetch, FetchOk)
                | (UpstreamFetch, FetchFailed)
                | (FetchOk, ResponseBuilt)
                | (FetchFailed, ResponseBuilt)
                | (ResponseBuilt, ResponseSent)
        ) || (next == Closed && *self != Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accepted downstream connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    state: ConnectionState,
}

impl Connection {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            state: ConnectionState::Accepted,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`. Out-of-order steps are logged and applied anyway.
    pub fn advance(&mut self, next: ConnectionState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(
                connection_id = %self.id,
                from = %self.state,
                to = %next,
                "Unexpected connection state transition"
            );
        }
        tracing::trace!(connection_id = %self.id, from = %self.state, to = %next, "Connection state");
        self.state = next;
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId::new();
        assert_eq!(id.to_string(), format!("conn-{}", id.as_u64()));
    }

    #[test]
    fn hit_path_is_legal() {
        let path = [Accepted, RequestRead, RequestParsed, CacheHit, ResponseBuilt, ResponseSent, Closed];
        assert!(path.windows(2).all(|w| w[0].can_advance_to(w[1])));
    }

    #[test]
    fn miss_paths_are_legal() {
        for outcome in [FetchOk, FetchFailed] {
            let path = [
                Accepted,
                RequestRead,
                RequestParsed,
                CacheMiss,
                UpstreamFetch,
                outcome,
                ResponseBuilt,
                ResponseSent,
                Closed,
            ];
            assert!(path.windows(2).all(|w| w[0].can_advance_to(w[1])), "{outcome}");
        }
    }

    #[test]
    fn skipping_the_fetch_is_illegal() {
        assert!(!CacheMiss.can_advance_to(FetchOk));
        assert!(!CacheHit.can_advance_to(UpstreamFetch));
        assert!(!Closed.can_advance_to(Closed));
    }

    #[test]
    fn any_state_can_close() {
        assert!(Accepted.can_advance_to(Closed));
        assert!(UpstreamFetch.can_advance_to(Closed));
    }

    #[test]
    fn connection_tracks_state() {
        let mut conn = Connection::new(peer());
        assert_eq!(conn.state(), Accepted);
        assert_eq!(conn.peer(), peer());
        conn.advance(RequestRead);
        conn.advance(Closed);
        assert!(conn.is_closed());
    }
}
