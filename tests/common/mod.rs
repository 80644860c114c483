//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::timeout;

use screener_stream::transport::MemorySocket;
use screener_stream::{
    ConnectionOptions, ConnectionState, ConnectionStatus, MemoryConnector, RealtimeConnection,
};

/// Endpoint used by every test connection.
pub const URL: &str = "ws://screener.test/ws";

/// Upper bound for any single awaited step.
pub const STEP: Duration = Duration::from_secs(30);

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a connection over `connector` with the default policy.
pub fn connection(connector: &MemoryConnector) -> RealtimeConnection {
    connection_with(connector, ConnectionOptions::default())
}

/// Builds a connection over `connector` with a custom policy.
pub fn connection_with(connector: &MemoryConnector, options: ConnectionOptions) -> RealtimeConnection {
    init_tracing();
    RealtimeConnection::builder()
        .url(URL)
        .options(options)
        .connector(connector.clone())
        .build()
        .expect("build connection")
}

/// Waits for the next transport the connection opens.
pub async fn next_socket(connector: &MemoryConnector) -> MemorySocket {
    timeout(STEP, connector.next_socket())
        .await
        .expect("transport opened in time")
        .expect("connector alive")
}

/// Waits for the next frame the connection transmits, parsed as JSON.
pub async fn next_frame(socket: &MemorySocket) -> Value {
    let frame = timeout(STEP, socket.next_frame())
        .await
        .expect("frame sent in time")
        .expect("transport alive");
    serde_json::from_str(&frame).expect("frame is JSON")
}

/// Waits until the connection status satisfies `predicate`.
pub async fn wait_status(
    connection: &RealtimeConnection,
    predicate: impl FnMut(&ConnectionStatus) -> bool,
) -> ConnectionStatus {
    let mut rx = connection.watch_status();
    let status = timeout(STEP, rx.wait_for(predicate))
        .await
        .expect("status reached in time")
        .expect("event loop alive");
    *status
}

/// Waits until the connection reaches `state`.
pub async fn wait_state(connection: &RealtimeConnection, state: ConnectionState) {
    wait_status(connection, |status| status.state == state).await;
}

/// Connects and completes the open handshake.
pub async fn open_connection(
    connection: &RealtimeConnection,
    connector: &MemoryConnector,
) -> MemorySocket {
    connection.connect();
    let socket = next_socket(connector).await;
    socket.open();
    wait_state(connection, ConnectionState::Open).await;
    socket
}

/// Builds a SCREENER_META_UPDATE frame.
pub fn meta_frame(session: &str, filtered: u64) -> String {
    json!({
        "t": "SCREENER_META_UPDATE",
        "session_id": session,
        "total": 2400,
        "filtered": filtered,
    })
    .to_string()
}

/// Builds a SCREENER_FULL_RESPONSE frame.
pub fn full_frame(session: &str, total: u64) -> String {
    json!({
        "t": "SCREENER_FULL_RESPONSE",
        "session_id": session,
        "c": ["symbol", "close"],
        "d": [["RELIANCE", 2890.5]],
        "total": total,
        "range": [0, 50],
    })
    .to_string()
}
