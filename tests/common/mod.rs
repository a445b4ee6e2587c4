//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use caching_proxy::cache::{CacheSettings, ExpiringCache};
use caching_proxy::lifecycle::Shutdown;
use caching_proxy::net::Listener;
use caching_proxy::proxy::{ProxyServer, ServerError, ServerSettings};
use caching_proxy::resilience::RetryPolicy;
use caching_proxy::upstream::{Endpoint, TcpConnector, UpstreamClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A mock origin that counts requests and remembers the last one it saw.
#[allow(dead_code)]
pub struct MockOrigin {
    pub addr: SocketAddr,
    pub calls: Arc<AtomicU32>,
    pub last_request: Arc<Mutex<String>>,
}

#[allow(dead_code)]
impl MockOrigin {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> String {
        self.last_request.lock().unwrap().clone()
    }
}

/// Start a mock origin on an ephemeral port that always answers `status` with `body`.
#[allow(dead_code)]
pub async fn start_mock_origin(status: u16, body: &'static str) -> MockOrigin {
    start_programmable_origin(move || async move { (status, body.to_string()) }).await
}

/// Start a mock origin whose reply is computed per request.
pub async fn start_programmable_origin<F, Fut>(f: F) -> MockOrigin
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let last_request = Arc::new(Mutex::new(String::new()));
    let f = Arc::new(f);

    let counter = Arc::clone(&calls);
    let seen = Arc::clone(&last_request);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let f = Arc::clone(&f);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                *seen.lock().unwrap() = String::from_utf8_lossy(&buf[..n]).into_owned();

                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                    status_text, body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockOrigin {
        addr,
        calls,
        last_request,
    }
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A proxy running in the background.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub cache: Arc<ExpiringCache>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

/// Start a proxy in front of `origin` on an ephemeral port.
pub async fn start_proxy(origin: &str) -> RunningProxy {
    let endpoint = Endpoint::parse(origin).unwrap();
    let timeout = Duration::from_secs(2);
    let upstream = UpstreamClient::new(
        endpoint,
        TcpConnector::new(timeout).unwrap(),
        timeout,
        RetryPolicy::none(),
    );
    let cache = Arc::new(ExpiringCache::new(CacheSettings::default()));
    let settings = ServerSettings {
        accept_wait: Duration::from_millis(100),
        ..ServerSettings::default()
    };
    let server = ProxyServer::new(settings, Arc::clone(&cache), upstream);

    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, rx).await });

    RunningProxy {
        addr,
        cache,
        shutdown,
        handle,
    }
}

/// Send raw bytes to `addr` and read until the proxy closes the connection.
#[allow(dead_code)]
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("proxy did not close the connection")
        .unwrap();
    String::from_utf8(out).unwrap()
}

/// `GET path` with a Host line, the shape curl sends.
#[allow(dead_code)]
pub async fn get(addr: SocketAddr, path: &str) -> String {
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nAccept: */*\r\n\r\n");
    send_raw(addr, request.as_bytes()).await
}
