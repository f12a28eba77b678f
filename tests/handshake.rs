//! End-to-end handshake against the scripted loopback server.

use std::sync::Arc;

use htsp::{ConnectionConfig, ConnectionState, HtspConnection, push::NullListener};
use htsp_testing::{FakeTvServer, ServerScript};

fn connection_to(server: &FakeTvServer, password: &str) -> HtspConnection {
    let config = ConnectionConfig::new(server.addr().ip().to_string(), server.addr().port())
        .credentials("viewer", password)
        .client_identity("htsp-tests", "0.1");
    HtspConnection::new(config, Arc::new(NullListener))
}

#[tokio::test]
async fn authenticate_negotiates_session_facts() {
    let mut server = FakeTvServer::spawn(ServerScript {
        server_name: "Tvheadend".to_owned(),
        server_version: "4.3.2".to_owned(),
        protocol_version: 34,
        ..ServerScript::default()
    })
    .await
    .expect("spawn server");

    let conn = connection_to(&server, "secret");
    conn.open().await.expect("open");
    assert_eq!(conn.state(), ConnectionState::Connected);
    assert!(conn.session().is_none(), "no session before authenticate");

    assert!(conn.authenticate().await.expect("handshake"));
    assert_eq!(conn.state(), ConnectionState::Authenticated);
    assert_eq!(conn.server_protocol_version(), Some(34));
    assert_eq!(conn.server_name().as_deref(), Some("Tvheadend"));
    assert_eq!(conn.server_version().as_deref(), Some("4.3.2"));
    assert_eq!(conn.disk_space().as_deref(), Some("410 GiB of 932 GiB"));

    // hello, authenticate, getDiskSpace, then the fire-and-forget enable.
    for expected in ["hello", "authenticate", "getDiskSpace", "enableAsyncMetadata"] {
        let request = server.next_request().await.expect("request seen");
        assert_eq!(request.method(), Some(expected));
    }

    conn.stop().await;
    assert_eq!(conn.state(), ConnectionState::ErrorStopped);
}

#[tokio::test]
async fn wrong_password_is_denied_without_closing() {
    let server = FakeTvServer::spawn(ServerScript::default())
        .await
        .expect("spawn server");

    let conn = connection_to(&server, "not-the-password");
    conn.open().await.expect("open");
    assert!(!conn.authenticate().await.expect("handshake completes"));
    assert_eq!(conn.state(), ConnectionState::Connected);
    assert!(conn.session().is_none());
    conn.stop().await;
}

#[tokio::test]
async fn fire_and_forget_send_carries_no_seq() {
    let mut server = FakeTvServer::spawn(ServerScript::default())
        .await
        .expect("spawn server");

    let conn = connection_to(&server, "secret");
    conn.open().await.expect("open");
    conn.send(htsp::Message::request("enableAsyncMetadata"))
        .await
        .expect("send");

    let request = server.next_request().await.expect("request seen");
    assert_eq!(request.method(), Some("enableAsyncMetadata"));
    assert!(request.seq().is_none());
    conn.stop().await;
}

#[tokio::test]
async fn open_is_idempotent_while_live() {
    let server = FakeTvServer::spawn(ServerScript::default())
        .await
        .expect("spawn server");

    let conn = connection_to(&server, "secret");
    conn.open().await.expect("first open");
    conn.open().await.expect("second open is a no-op");
    assert_eq!(conn.state(), ConnectionState::Connected);
    conn.stop().await;
}
