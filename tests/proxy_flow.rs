//! End-to-end tests against real sockets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use caching_proxy::upstream::USER_AGENT;

mod common;

#[tokio::test]
async fn miss_then_hit_without_second_origin_call() {
    let origin = common::start_mock_origin(200, r#"{"id":1}"#).await;
    let proxy = common::start_proxy(&origin.url()).await;

    let first = common::get(proxy.addr, "/products/1").await;
    assert!(first.starts_with("HTTP/1.1 200 OK\r\n"), "{first}");
    assert!(first.contains("X-Cache: MISS\r\n"));
    assert!(first.ends_with(r#"{"id":1}"#));

    let second = common::get(proxy.addr, "/products/1").await;
    assert_eq!(second, "HTTP/1.1 200 OK\r\nX-Cache: HIT\r\n\r\n{\"id\":1}");
    assert_eq!(origin.calls(), 1);

    proxy.shutdown.trigger();
    assert!(proxy.handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn origin_sees_fixed_fields_and_forwarded_headers() {
    let origin = common::start_mock_origin(200, "ok").await;
    let proxy = common::start_proxy(&origin.url()).await;

    common::send_raw(
        proxy.addr,
        b"GET /users?limit=1 HTTP/1.1\r\nHost: localhost:3000\r\nX-Request-Id: 42\r\n\r\n",
    )
    .await;

    let seen = origin.last_request();
    assert!(seen.starts_with("GET /users?limit=1 HTTP/1.1\r\n"), "{seen}");
    assert!(seen.contains(&format!("Host: {}\r\n", origin.addr)));
    assert!(seen.contains("X-Request-Id: 42\r\n"));
    assert!(seen.contains(&format!("User-Agent: {USER_AGENT}\r\n")));
    assert!(seen.contains("Connection: close\r\n"));
    assert!(!seen.contains("localhost:3000"));

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn refused_origin_is_bad_gateway_and_not_cached() {
    let addr = common::refused_addr().await;
    let proxy = common::start_proxy(&format!("http://{addr}")).await;

    let response = common::get(proxy.addr, "/anything").await;
    assert_eq!(response, "HTTP/1.1 502 Bad Gateway\r\nX-Cache: MISS\r\n\r\n");
    assert!(proxy.cache.is_empty());

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn malformed_request_line_is_rejected_and_server_keeps_going() {
    let origin = common::start_mock_origin(200, "fine").await;
    let proxy = common::start_proxy(&origin.url()).await;

    let rejected = common::send_raw(proxy.addr, b"BROKEN\r\n\r\n").await;
    assert_eq!(rejected, "HTTP/1.1 400 Bad Request\r\nX-Cache: MISS\r\n\r\n");
    assert_eq!(origin.calls(), 0);

    let next = common::get(proxy.addr, "/ok").await;
    assert!(next.ends_with("fine"));
    assert_eq!(origin.calls(), 1);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn query_strings_are_separate_entries() {
    let origin = common::start_mock_origin(200, "data").await;
    let proxy = common::start_proxy(&origin.url()).await;

    common::get(proxy.addr, "/a?x=1").await;
    let second = common::get(proxy.addr, "/a?x=2").await;
    assert!(second.contains("X-Cache: MISS\r\n"));
    assert_eq!(origin.calls(), 2);
    assert_eq!(proxy.cache.len(), 2);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn error_replies_are_relayed_but_refetched() {
    let served = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&served);
    let origin = common::start_programmable_origin(move || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                (503, "busy".to_string())
            } else {
                (200, "ready".to_string())
            }
        }
    })
    .await;
    let proxy = common::start_proxy(&origin.url()).await;

    let first = common::get(proxy.addr, "/status").await;
    assert!(first.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
    assert!(first.contains("X-Cache: MISS\r\n"));
    assert!(proxy.cache.is_empty());

    let second = common::get(proxy.addr, "/status").await;
    assert!(second.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(second.contains("X-Cache: MISS\r\n"));

    let third = common::get(proxy.addr, "/status").await;
    assert!(third.contains("X-Cache: HIT\r\n"));
    assert_eq!(origin.calls(), 2);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    let origin = common::start_mock_origin(200, "v1").await;
    let proxy = common::start_proxy(&origin.url()).await;

    common::get(proxy.addr, "/item").await;
    assert_eq!(proxy.cache.clear(), 1);

    let after = common::get(proxy.addr, "/item").await;
    assert!(after.contains("X-Cache: MISS\r\n"));
    assert_eq!(origin.calls(), 2);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_stops_accept_loop_promptly() {
    let origin = common::start_mock_origin(200, "x").await;
    let proxy = common::start_proxy(&origin.url()).await;
    let addr = proxy.addr;

    proxy.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(2), proxy.handle)
        .await
        .expect("accept loop did not stop")
        .unwrap();
    assert!(result.is_ok());

    // The listening socket is released on return.
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
