//! TCP listener for downstream clients.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Put the socket into listening mode
//! - Accept incoming TCP connections

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

const BACKLOG: u32 = 1024;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to create or bind the socket.
    Bind(std::io::Error),
    /// Failed to start listening.
    Listen(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Listen(e) => write!(f, "Failed to listen: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Listen(e) | ListenerError::Accept(e) => Some(e),
        }
    }
}

/// A listening TCP socket.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `addr` and start listening.
    pub fn bind(addr: SocketAddr) -> Result<Self, ListenerError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Bind)?;

        socket.set_reuseaddr(true).map_err(ListenerError::Bind)?;
        socket.bind(addr).map_err(ListenerError::Bind)?;
        let listener = socket.listen(BACKLOG).map_err(ListenerError::Listen)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Listen)?;
        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner: listener })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
