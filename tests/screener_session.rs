//! Screener session flow over the in-memory transport.

mod common;

use std::sync::Arc;

use serde_json::json;
use tokio::time::timeout;

use screener_stream::screener::auth_on_open;
use screener_stream::{
    MemoryConnector, MessageTag, RealtimeConnection, ScreenerPatch, ScreenerSession, SessionId,
};

use common::{STEP, URL, full_frame, meta_frame, next_frame, next_socket};

#[tokio::test]
async fn test_subscribe_patch_unsubscribe_flow() -> anyhow::Result<()> {
    common::init_tracing();
    let connector = MemoryConnector::new();
    let connection = RealtimeConnection::builder()
        .url(URL)
        .connector(connector.clone())
        .on_open(auth_on_open(None))
        .build()?;

    let session = ScreenerSession::new(&connection, SessionId::new("abc"));
    let other = ScreenerSession::new(&connection, SessionId::new("xyz"));

    let subscribed = session.subscribed();
    session.subscribe(Some("rsi < 30".into()));

    let socket = next_socket(&connector).await;
    socket.open();
    assert_eq!(next_frame(&socket).await["t"], "AUTH");
    assert_eq!(
        next_frame(&socket).await,
        json!({"t": "SCREENER_SUBSCRIBE", "session_id": "abc", "query": "rsi < 30"})
    );

    // Acks for other sessions do not resolve this one
    let other_ack = other.subscribed();
    socket.deliver(r#"{"t":"SCREENER_SUBSCRIBED","session_id":"xyz"}"#);
    socket.deliver(r#"{"t":"SCREENER_SUBSCRIBED","session_id":"abc"}"#);
    timeout(STEP, other_ack).await??;
    let ack = timeout(STEP, subscribed).await??;
    assert_eq!(ack.session_id(), "abc");

    let metas = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let metas_in_listener = Arc::clone(&metas);
    let listener = session.on_meta(move |meta| metas_in_listener.lock().push(meta.filtered));

    let patched = session.patched();
    session.patch(ScreenerPatch::new().with_columns(["symbol", "close"]).with_range(0, 50));
    let patch = next_frame(&socket).await;
    assert_eq!(patch["t"], "SCREENER_PATCH");
    assert_eq!(patch["columns"], json!(["symbol", "close"]));
    assert_eq!(patch["range"], json!([0, 50]));
    assert!(patch.get("filters").is_none());

    socket.deliver(r#"{"t":"SCREENER_PATCHED","session_id":"abc"}"#);
    timeout(STEP, patched).await??;

    let full = session.full_response();
    let meta = session.meta_update();
    socket.deliver(meta_frame("xyz", 1));
    socket.deliver(meta_frame("abc", 12));
    socket.deliver(full_frame("abc", 12));

    let snapshot = timeout(STEP, full).await??;
    assert_eq!(snapshot.as_full().map(|s| s.total), Some(12));
    let update = timeout(STEP, meta).await??;
    assert_eq!(update.as_meta().map(|m| m.filtered), Some(12));
    assert_eq!(*metas.lock(), vec![12]);

    assert!(connection.off(MessageTag::ScreenerMetaUpdate, listener));

    session.unsubscribe();
    assert_eq!(
        next_frame(&socket).await,
        json!({"t": "SCREENER_UNSUBSCRIBE", "session_id": "abc"})
    );

    connection.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_partial_updates_reach_session_listener() -> anyhow::Result<()> {
    let connector = MemoryConnector::new();
    let connection = common::connection(&connector);
    let session = ScreenerSession::generate(&connection);
    let id = session.session_id().clone();

    let rows = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let rows_in_listener = Arc::clone(&rows);
    session.on_partial(move |update| rows_in_listener.lock().extend(update.rows.clone()));

    let wanted = id.clone();
    let done = connection.wait_for(MessageTag::ScreenerPartialResponse, move |msg| {
        msg.session_id() == &wanted
    });

    session.subscribe(None);
    let socket = next_socket(&connector).await;
    socket.open();
    assert!(next_frame(&socket).await.get("query").is_none());

    socket.deliver(
        json!({
            "t": "SCREENER_PARTIAL_RESPONSE",
            "session_id": id.as_str(),
            "d": [{"symbol": "TCS", "close": 4100.0}],
        })
        .to_string(),
    );
    timeout(STEP, done).await??;

    let rows = rows.lock();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["symbol"], "TCS");

    connection.shutdown();
    Ok(())
}
