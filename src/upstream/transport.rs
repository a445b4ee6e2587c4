//! Byte transport to the origin.
//!
//! # Responsibilities
//! - Resolve the origin name and open a TCP connection to it
//! - Wrap the connection in TLS when the origin is `https`, sending SNI
//! - Hand back a stream the client can read, write and shut down
//!
//! # Design Decisions
//! - [`Connector`] is the seam between request logic and sockets; tests plug
//!   in in-memory streams
//! - Trust anchors come from `webpki-roots`, not the host store
//! - Every step runs under the configured deadline

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpSocket};
use tokio_rustls::rustls::{self, pki_types::ServerName, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::resilience::with_timeout;
use crate::upstream::{Endpoint, TransportError};

/// Anything the client can talk HTTP over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens connections to an endpoint.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<BoxedStream, TransportError>> + Send;
}

/// TCP connector with optional TLS.
#[derive(Clone)]
pub struct TcpConnector {
    timeout: Duration,
    tls: TlsConnector,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Result<Self, rustls::Error> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self {
            timeout,
            tls: TlsConnector::from(Arc::new(config)),
        })
    }

    async fn resolve(&self, endpoint: &Endpoint) -> Result<Vec<SocketAddr>, TransportError> {
        let dns_error = |source| TransportError::Dns {
            host: endpoint.domain.clone(),
            source,
        };

        let addrs: Vec<SocketAddr> = with_timeout(self.timeout, lookup_host(endpoint.address()))
            .await
            .map_err(dns_error)?
            .collect();
        if addrs.is_empty() {
            return Err(dns_error(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses returned",
            )));
        }
        Ok(addrs)
    }

    async fn connect_tcp(&self, addrs: &[SocketAddr]) -> Result<tokio::net::TcpStream, TransportError> {
        let mut last_error = None;
        for &addr in addrs {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()
            } else {
                TcpSocket::new_v6()
            }
            .map_err(TransportError::SocketCreate)?;

            match with_timeout(self.timeout, socket.connect(addr)).await {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(source) => {
                    tracing::debug!(addr = %addr, error = %source, "Origin address unreachable");
                    last_error = Some(TransportError::Connect {
                        addr: addr.to_string(),
                        source,
                    });
                }
            }
        }
        Err(last_error.unwrap_or_else(|| TransportError::Connect {
            addr: String::new(),
            source: io::ErrorKind::AddrNotAvailable.into(),
        }))
    }
}

impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
        let addrs = self.resolve(endpoint).await?;
        let stream = self.connect_tcp(&addrs).await?;

        if !endpoint.tls {
            return Ok(Box::new(stream));
        }

        let handshake_error = |source| TransportError::Handshake {
            host: endpoint.domain.clone(),
            source,
        };
        let name = ServerName::try_from(endpoint.server_name().to_owned())
            .map_err(|e| handshake_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let tls_stream = with_timeout(self.timeout, self.tls.connect(name, stream))
            .await
            .map_err(handshake_error)?;

        Ok(Box::new(tls_stream))
    }
}
