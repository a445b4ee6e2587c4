//! Caching proxy subsystem.
//!
//! # Data Flow
//! ```text
//! net::Listener::accept
//!     → server.rs: one read → MessageParser<HttpRequest>
//!     → cache lookup on the request target
//!         hit  → 200 OK + X-Cache: HIT, refresh recency
//!         miss → UpstreamClient::get → X-Cache: MISS, store 200 bodies
//!     → write response → close
//! ```
//!
//! # Design Decisions
//! - Connections are served one at a time, in accept order
//! - Upstream and parse failures end the connection, never the loop
//! - Only accept failures stop the server

pub mod server;

pub use server::{Outcome, ProxyServer, ServerError, ServerSettings};
