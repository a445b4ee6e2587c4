//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, listen, accept)
//!     → connection.rs (id, per-connection state tracking)
//!     → Hand off to proxy::ProxyServer
//!
//! Connection States:
//!     Accepted → RequestRead → RequestParsed
//!         → CacheHit | CacheMiss → UpstreamFetch → FetchOk | FetchFailed
//!         → ResponseBuilt → ResponseSent → Closed
//! ```
//!
//! # Design Decisions
//! - Bind and listen are separate steps so each failure is reported on its own
//! - Every connection reaches `Closed`, including failed ones

pub mod connection;
pub mod listener;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use listener::{Listener, ListenerError};
