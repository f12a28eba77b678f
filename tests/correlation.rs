//! Sequence-number correlation under permuted response ordering.

use std::{sync::Arc, time::Duration};

use htsp::{ConnectionConfig, HtspConnection, HtspError, Message, push::NullListener};
use htsp_testing::{FakeTvServer, ServerScript};

fn connection_to(server: &FakeTvServer) -> Arc<HtspConnection> {
    let config = ConnectionConfig::new(server.addr().ip().to_string(), server.addr().port())
        .credentials("viewer", "secret");
    Arc::new(HtspConnection::new(config, Arc::new(NullListener)))
}

#[tokio::test]
async fn permuted_responses_reach_their_own_callers() {
    const REQUESTS: usize = 8;
    // The server buffers every non-handshake reply and flushes the batch in
    // reverse, so no response arrives in submission order.
    let server = FakeTvServer::spawn(ServerScript {
        permute_batch: REQUESTS,
        ..ServerScript::default()
    })
    .await
    .expect("spawn server");

    let conn = connection_to(&server);
    conn.open().await.expect("open");
    assert!(conn.authenticate().await.expect("handshake"));

    let mut tasks = Vec::new();
    for token in 0..i64::try_from(REQUESTS).expect("fits") {
        let conn = Arc::clone(&conn);
        tasks.push(tokio::spawn(async move {
            let response = conn
                .request(Message::request("ping").with("token", token))
                .await
                .expect("response");
            (token, response)
        }));
    }

    for task in tasks {
        let (token, response) = task.await.expect("task");
        // The echo ack proves the response body reached the caller whose
        // request carried this token, not merely some caller.
        assert_eq!(response.get_int("token"), Some(token));
        assert_eq!(response.get_int("success"), Some(1));
    }
    conn.stop().await;
}

#[tokio::test]
async fn stop_aborts_pending_requests() {
    // A large permute batch means the reply for a lone request never flushes.
    let server = FakeTvServer::spawn(ServerScript {
        permute_batch: 100,
        ..ServerScript::default()
    })
    .await
    .expect("spawn server");

    let conn = connection_to(&server);
    conn.open().await.expect("open");

    let pending = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.request(Message::request("ping")).await })
    };
    tokio::task::yield_now().await;
    conn.stop().await;

    let result = pending.await.expect("task");
    assert!(matches!(result, Err(HtspError::ConnectionClosed)));
}

#[tokio::test]
async fn fault_aborts_pending_requests() {
    // The server withholds the reply, then disappears; the pipeline fault
    // must fail the awaiting caller rather than leave it pending.
    let server = FakeTvServer::spawn(ServerScript {
        permute_batch: 100,
        ..ServerScript::default()
    })
    .await
    .expect("spawn server");

    let conn = connection_to(&server);
    conn.open().await.expect("open");

    let pending = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.request(Message::request("ping")).await })
    };
    tokio::task::yield_now().await;
    drop(server);

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("pending request resolves once the pipeline faults")
        .expect("task");
    assert!(matches!(result, Err(HtspError::ConnectionClosed)));
}

#[tokio::test]
async fn request_before_open_is_rejected() {
    let config = ConnectionConfig::new("127.0.0.1", 1);
    let conn = HtspConnection::new(config, Arc::new(NullListener));
    let result = conn.request(Message::request("hello")).await;
    assert!(matches!(result, Err(HtspError::NotConnected)));
}
