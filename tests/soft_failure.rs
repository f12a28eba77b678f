//! The soft-failure policy for mutating DVR requests: refusals are logged,
//! not raised.

use std::{collections::HashMap, sync::Arc};

use htsp::{ConnectionConfig, HtspConnection, Message, push::NullListener};
use htsp_testing::{FakeTvServer, LogCapture, ServerScript, log_capture};
use rstest::rstest;

async fn connection_with_responses(
    responses: HashMap<String, Message>,
) -> (FakeTvServer, HtspConnection) {
    let server = FakeTvServer::spawn(ServerScript {
        responses,
        ..ServerScript::default()
    })
    .await
    .expect("spawn server");
    let config = ConnectionConfig::new(server.addr().ip().to_string(), server.addr().port())
        .credentials("viewer", "secret");
    let conn = HtspConnection::new(config, Arc::new(NullListener));
    conn.open().await.expect("open");
    assert!(conn.authenticate().await.expect("handshake"));
    (server, conn)
}

#[rstest]
#[tokio::test]
async fn refused_mutation_returns_false_and_logs(mut log_capture: LogCapture) {
    let refusal = Message::new().with("success", 0_i64).with("error", "in use");
    let (_server, conn) =
        connection_with_responses(HashMap::from([("cancelDvrEntry".to_owned(), refusal)])).await;

    log_capture.clear();
    let cancelled = conn.cancel_dvr_entry(17).await.expect("soft failure is Ok");
    assert!(!cancelled);

    let message = log_capture
        .error_containing("cancelDvrEntry refused")
        .expect("refusal logged at error level");
    assert!(message.contains("in use"));
    conn.stop().await;
}

#[rstest]
#[tokio::test]
async fn granted_mutation_returns_true(mut log_capture: LogCapture) {
    let (_server, conn) = connection_with_responses(HashMap::new()).await;

    log_capture.clear();
    assert!(conn.add_dvr_entry(99).await.expect("request"));
    assert!(conn.delete_autorec_entry("rule-1").await.expect("request"));

    log_capture.assert_none_containing("refused by server");
    conn.stop().await;
}
