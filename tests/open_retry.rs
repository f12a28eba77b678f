//! `open()` retries the connect until the server appears.

use std::{sync::Arc, time::Duration};

use htsp::{ConnectionConfig, ConnectionState, HtspConnection, HtspError, push::NullListener};
use htsp_testing::{FakeTvServer, ServerScript};
use tokio::net::TcpListener;

#[tokio::test]
async fn open_waits_for_a_late_server() {
    // Reserve a port, then free it so the first connect attempts fail.
    let reserved = TcpListener::bind("127.0.0.1:0").await.expect("reserve port");
    let addr = reserved.local_addr().expect("addr");
    drop(reserved);

    let config = ConnectionConfig::new(addr.ip().to_string(), addr.port())
        .credentials("viewer", "secret")
        .retry_interval(Duration::from_millis(50));
    let conn = Arc::new(HtspConnection::new(config, Arc::new(NullListener)));

    let opener = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.open().await })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(conn.state(), ConnectionState::Opening, "still retrying");

    let _server = FakeTvServer::spawn_on(addr, ServerScript::default())
        .await
        .expect("bind reserved port");
    opener.await.expect("task").expect("open succeeds once the server is up");
    assert_eq!(conn.state(), ConnectionState::Connected);
    assert!(conn.authenticate().await.expect("handshake"));
    conn.stop().await;
}

#[tokio::test]
async fn stop_cancels_an_in_progress_open() {
    let reserved = TcpListener::bind("127.0.0.1:0").await.expect("reserve port");
    let addr = reserved.local_addr().expect("addr");
    drop(reserved);

    let config = ConnectionConfig::new(addr.ip().to_string(), addr.port())
        .retry_interval(Duration::from_millis(50));
    let conn = Arc::new(HtspConnection::new(config, Arc::new(NullListener)));

    let opener = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.open().await })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(conn.state(), ConnectionState::Opening, "still retrying");

    // The retry loop runs without holding the connection's locks, so stop()
    // must return promptly and the opener must observe the cancellation.
    tokio::time::timeout(Duration::from_secs(1), conn.stop())
        .await
        .expect("stop() returns while open() is retrying");
    let result = tokio::time::timeout(Duration::from_secs(1), opener)
        .await
        .expect("open() exits after stop()")
        .expect("task");
    assert!(matches!(result, Err(HtspError::ConnectionClosed)));
    assert_eq!(conn.state(), ConnectionState::ErrorStopped);
}
