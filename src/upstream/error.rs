//! Origin transport failures.

use std::io;

/// Why a fetch from the origin produced no usable response.
///
/// Each variant names the step that failed. The proxy turns all of them
/// into `502 Bad Gateway`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to create socket: {0}")]
    SocketCreate(#[source] io::Error),

    #[error("DNS resolution failed for {host}: {source}")]
    Dns {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("write to origin failed: {0}")]
    Write(#[source] io::Error),

    #[error("read from origin failed: {0}")]
    Read(#[source] io::Error),
}

impl TransportError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::SocketCreate(_) => "socket",
            TransportError::Dns { .. } => "dns",
            TransportError::Connect { .. } => "connect",
            TransportError::Handshake { .. } => "handshake",
            TransportError::Write(_) => "write",
            TransportError::Read(_) => "read",
        }
    }
}
