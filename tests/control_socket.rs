//! Clearing a running proxy's cache through the control socket.
#![cfg(unix)]

use std::sync::Arc;

use caching_proxy::control::{send_command, ControlCommand, ControlReply, ControlServer};

mod common;

#[tokio::test]
async fn clear_cache_command_empties_running_proxy() {
    let origin = common::start_mock_origin(200, "cached").await;
    let proxy = common::start_proxy(&origin.url()).await;

    let path = std::env::temp_dir().join(format!("caching-proxy-it-{}.sock", std::process::id()));
    let control = ControlServer::bind(&path, Arc::clone(&proxy.cache)).unwrap();
    let control_handle = tokio::spawn(control.run(proxy.shutdown.subscribe()));

    common::get(proxy.addr, "/one").await;
    common::get(proxy.addr, "/two").await;
    assert_eq!(
        send_command(&path, ControlCommand::Stats).await.unwrap(),
        ControlReply::entries(2)
    );

    let reply = send_command(&path, ControlCommand::ClearCache).await.unwrap();
    assert_eq!(reply, ControlReply::cleared(2));

    let refetched = common::get(proxy.addr, "/one").await;
    assert!(refetched.contains("X-Cache: MISS\r\n"));
    assert_eq!(origin.calls(), 3);

    proxy.shutdown.trigger();
    control_handle.await.unwrap();
    assert!(proxy.handle.await.unwrap().is_ok());
    assert!(!path.exists());
}
