//! Origin-facing subsystem.
//!
//! # Data Flow
//! ```text
//! cache miss (target, raw header block)
//!     → client.rs (build GET, retry connect, enforce deadlines)
//!     → transport.rs (DNS → TCP → optional TLS with SNI)
//!     → origin
//!     → read until close → http::MessageParser<HttpResponse>
//!     → HttpResponse | TransportError
//! ```
//!
//! # Design Decisions
//! - One connection per fetch, always `Connection: close`
//! - HTTP status is not interpreted here; the proxy decides what to cache
//! - Each failing step has its own error variant

pub mod client;
pub mod endpoint;
pub mod error;
pub mod transport;

pub use client::{UpstreamClient, USER_AGENT};
pub use endpoint::{Endpoint, OriginError};
pub use error::TransportError;
pub use transport::{AsyncStream, BoxedStream, Connector, TcpConnector};
