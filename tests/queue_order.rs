//! Property: whatever is sent before the transport opens arrives in order,
//! exactly once.

mod common;

use proptest::prelude::*;

use screener_stream::{MemoryConnector, Request, SessionId};

use common::{connection, next_frame, next_socket};

fn transmitted_sessions(sessions: &[String]) -> Vec<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    runtime.block_on(async {
        let connector = MemoryConnector::new();
        let connection = connection(&connector);

        for session in sessions {
            connection.send_message(Request::unsubscribe(SessionId::new(session.as_str())));
        }

        let socket = next_socket(&connector).await;
        socket.open();

        let mut seen = Vec::with_capacity(sessions.len());
        for _ in sessions {
            let frame = next_frame(&socket).await;
            seen.push(frame["session_id"].as_str().unwrap_or_default().to_string());
        }

        // Nothing beyond what was queued
        connection.send_message(Request::unsubscribe(SessionId::new("end")));
        assert_eq!(next_frame(&socket).await["session_id"], "end");
        assert_eq!(connector.open_count(), 1);

        connection.shutdown();
        seen
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn queued_requests_keep_send_order(sessions in prop::collection::vec("[a-z0-9]{1,12}", 1..24)) {
        let seen = transmitted_sessions(&sessions);
        prop_assert_eq!(seen, sessions);
    }
}
