//! GET requests against the configured origin.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time;

use crate::http::{HttpResponse, MessageParser, CRLF};
use crate::observability::metrics;
use crate::resilience::{with_timeout, RetryPolicy};
use crate::upstream::transport::{BoxedStream, Connector, TcpConnector};
use crate::upstream::{Endpoint, TransportError};

/// Identifies the proxy to the origin.
pub const USER_AGENT: &str = concat!("caching-proxy/", env!("CARGO_PKG_VERSION"));

/// Fields the client always sends itself; same-named pass-through lines are dropped.
const FIXED_FIELDS: [&str; 4] = ["Host", "Accept", "User-Agent", "Connection"];

const READ_CHUNK: usize = 4096;

/// Client for one fixed origin.
///
/// Every call opens a fresh connection, sends `Connection: close`, and reads
/// until the origin closes.
pub struct UpstreamClient<C = TcpConnector> {
    endpoint: Endpoint,
    connector: C,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<C: Connector> UpstreamClient<C> {
    pub fn new(endpoint: Endpoint, connector: C, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            endpoint,
            connector,
            timeout,
            retry,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetch `target` from the origin.
    ///
    /// `pass_through` is a raw header block (CRLF-terminated lines) forwarded
    /// after the fixed fields. A non-200 reply is still `Ok`; only failures to
    /// exchange a parseable message are errors.
    pub async fn get(&self, target: &str, pass_through: &str) -> Result<HttpResponse, TransportError> {
        let request = self.build_request(target, pass_through);
        let result = self.fetch(request.as_bytes()).await;
        match &result {
            Ok(response) => {
                metrics::record_upstream("ok");
                tracing::debug!(
                    origin = %self.endpoint,
                    target,
                    status = response.status,
                    "Origin responded"
                );
            }
            Err(e) => {
                metrics::record_upstream(e.kind());
                tracing::warn!(origin = %self.endpoint, target, error = %e, "Origin fetch failed");
            }
        }
        result
    }

    /// Request line, fixed fields, filtered pass-through lines, blank line.
    pub fn build_request(&self, target: &str, pass_through: &str) -> String {
        let mut request = format!("GET {target} HTTP/1.1{CRLF}");
        request.push_str(&format!("Host: {}{CRLF}", self.endpoint.host_header()));
        for line in pass_through.split(CRLF).filter(|l| !l.is_empty()) {
            if !is_fixed_field(line) {
                request.push_str(line);
                request.push_str(CRLF);
            }
        }
        request.push_str(&format!("Accept: */*{CRLF}"));
        request.push_str(&format!("User-Agent: {USER_AGENT}{CRLF}"));
        request.push_str(&format!("Connection: close{CRLF}"));
        request.push_str(CRLF);
        request
    }

    async fn fetch(&self, request: &[u8]) -> Result<HttpResponse, TransportError> {
        let mut stream = self.connect().await?;
        let exchanged = self.exchange(&mut stream, request).await;
        // Best-effort close; the origin has usually hung up already.
        let _ = with_timeout(self.timeout, stream.shutdown()).await;
        let raw = exchanged?;

        MessageParser::<HttpResponse>::new()
            .parse(&raw)
            .map_err(|e| TransportError::Read(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    async fn connect(&self) -> Result<BoxedStream, TransportError> {
        let mut attempt = 1;
        loop {
            match self.connector.connect(&self.endpoint).await {
                Ok(stream) => return Ok(stream),
                Err(e) if self.retry.should_retry(attempt, &e) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(
                        origin = %self.endpoint,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Retrying origin connection"
                    );
                    time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn exchange(&self, stream: &mut BoxedStream, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        with_timeout(self.timeout, async {
            stream.write_all(request).await?;
            stream.flush().await
        })
        .await
        .map_err(TransportError::Write)?;

        let mut raw = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match with_timeout(self.timeout, stream.read(&mut chunk)).await {
                Ok(0) => break,
                Ok(n) => raw.extend_from_slice(&chunk[..n]),
                // Origins often close TLS without close_notify once they are done.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !raw.is_empty() => break,
                Err(e) => return Err(TransportError::Read(e)),
            }
        }

        if raw.is_empty() {
            return Err(TransportError::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "origin closed the connection without responding",
            )));
        }
        Ok(raw)
    }
}

fn is_fixed_field(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(key, _)| FIXED_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(key.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Serves one canned reply per connection over an in-memory pipe and
    /// records what the client sent.
    struct ScriptedConnector {
        reply: &'static [u8],
        sent: Arc<Mutex<Vec<u8>>>,
    }

    impl ScriptedConnector {
        fn new(reply: &'static [u8]) -> Self {
            Self {
                reply,
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Connector for ScriptedConnector {
        async fn connect(&self, _: &Endpoint) -> Result<BoxedStream, TransportError> {
            let (client, mut server) = tokio::io::duplex(64 * 1024);
            let reply = self.reply;
            let sent = Arc::clone(&self.sent);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.ends_with(b"\r\n\r\n") {
                    match server.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                *sent.lock().unwrap() = buf;
                let _ = server.write_all(reply).await;
                let _ = server.shutdown().await;
            });
            Ok(Box::new(client))
        }
    }

    /// Refuses every connection and counts attempts.
    #[derive(Default)]
    struct RefusingConnector {
        attempts: AtomicU32,
    }

    impl Connector for RefusingConnector {
        async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Connect {
                addr: endpoint.address(),
                source: io::ErrorKind::ConnectionRefused.into(),
            })
        }
    }

    fn client<C: Connector>(connector: C, retry: RetryPolicy) -> UpstreamClient<C> {
        UpstreamClient::new(
            Endpoint::parse("http://example.com").unwrap(),
            connector,
            Duration::from_secs(2),
            retry,
        )
    }

    fn fast_retries(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn request_carries_fixed_and_pass_through_fields() {
        let client = client(ScriptedConnector::new(b""), RetryPolicy::none());
        let request = client.build_request(
            "/users/1",
            "Host: localhost:3000\r\nX-Trace: abc\r\nconnection: keep-alive\r\nAccept-Language: en\r\n",
        );

        assert_eq!(
            request,
            format!(
                "GET /users/1 HTTP/1.1\r\n\
                 Host: example.com\r\n\
                 X-Trace: abc\r\n\
                 Accept-Language: en\r\n\
                 Accept: */*\r\n\
                 User-Agent: {USER_AGENT}\r\n\
                 Connection: close\r\n\
                 \r\n"
            )
        );
    }

    #[tokio::test]
    async fn decodes_origin_reply() {
        let connector = ScriptedConnector::new(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"id\":1}",
        );
        let sent = Arc::clone(&connector.sent);
        let client = client(connector, RetryPolicy::none());

        let response = client.get("/users/1", "X-Trace: abc\r\n").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"id\":1}");
        assert_eq!(response.headers.get("Content-Type"), Some("application/json"));

        let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
        assert!(sent.starts_with("GET /users/1 HTTP/1.1\r\nHost: example.com\r\nX-Trace: abc\r\n"));
    }

    #[tokio::test]
    async fn non_200_is_not_a_transport_error() {
        let client = client(
            ScriptedConnector::new(b"HTTP/1.1 404 Not Found\r\nServer: t\r\n\r\nmissing"),
            RetryPolicy::none(),
        );
        let response = client.get("/nope", "").await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, "missing");
    }

    #[tokio::test]
    async fn empty_reply_is_read_error() {
        let client = client(ScriptedConnector::new(b""), RetryPolicy::none());
        let err = client.get("/", "").await.unwrap_err();
        assert_eq!(err.kind(), "read");
    }

    #[tokio::test]
    async fn garbage_reply_is_read_error() {
        let client = client(ScriptedConnector::new(b"not http at all\r\n\r\n"), RetryPolicy::none());
        let err = client.get("/", "").await.unwrap_err();
        assert!(matches!(err, TransportError::Read(ref e) if e.kind() == io::ErrorKind::InvalidData));
    }

    #[tokio::test]
    async fn refused_connections_are_retried_then_reported() {
        let client = client(RefusingConnector::default(), fast_retries(3));
        let err = client.get("/", "").await.unwrap_err();
        assert_eq!(err.kind(), "connect");
        assert_eq!(client.connector.attempts.load(Ordering::SeqCst), 3);
    }
}
