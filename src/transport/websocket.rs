//! WebSocket client transport.
//!
//! Each opened transport spawns a tokio task that owns the socket and
//! handles:
//!
//! - The connect handshake (reported as `opened`, or `error` + `closed`)
//! - Incoming text frames (reported as `message`)
//! - Outgoing frames from the connection event loop
//! - Close, error and end-of-stream (reported as `closed`)
//!
//! Binary, ping and pong frames are ignored.

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{Connector, Transport, TransportEvents};

// ============================================================================
// Types
// ============================================================================

/// Commands from the transport handle to its socket task.
#[derive(Debug)]
enum Outbound {
    /// Transmit a text frame.
    Frame(String),
    /// Close the socket.
    Close,
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Opens `ws://` / `wss://` transports with `tokio-tungstenite`.
///
/// `wss://` requires the `tls` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn open(&self, url: &Url, events: TransportEvents) -> Box<dyn Transport> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_socket(url.to_string(), outbound_rx, events));

        Box::new(WebSocketTransport { outbound_tx })
    }
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Handle to a socket task.
///
/// Dropping the handle closes the socket.
struct WebSocketTransport {
    outbound_tx: mpsc::UnboundedSender<Outbound>,
}

impl Transport for WebSocketTransport {
    fn send(&mut self, frame: String) -> Result<()> {
        self.outbound_tx
            .send(Outbound::Frame(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&mut self) {
        let _ = self.outbound_tx.send(Outbound::Close);
    }
}

// ============================================================================
// Socket Task
// ============================================================================

/// Socket task: connects, then pumps frames until either side closes.
async fn run_socket(
    url: String,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    events: TransportEvents,
) {
    let generation = events.generation();

    let ws_stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _)) => stream,
            Err(e) => {
                let e = Error::connection(format!("connect to {url}: {e}"));
                warn!(generation, error = %e, "WebSocket connect failed");
                report_failure(&events, &e);
                return;
            }
        },

        // Nothing is sent before open, so anything here means close
        _ = outbound_rx.recv() => {
            debug!(generation, "Connect abandoned by client");
            events.closed("closed by client");
            return;
        }
    };

    debug!(url = %url, generation, "WebSocket connected");
    events.opened();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(generation, len = text.len(), "Frame received");
                        events.message(text.as_str());
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((1005, String::new()));
                        debug!(generation, code, reason = %reason, "WebSocket closed by remote");
                        events.closed(reason);
                        break;
                    }

                    Some(Err(e)) => {
                        let e = Error::from(e);
                        warn!(generation, error = %e, "WebSocket read failed");
                        report_failure(&events, &e);
                        break;
                    }

                    None => {
                        debug!(generation, "WebSocket stream ended");
                        events.closed("stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(Outbound::Frame(json)) => {
                        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                            let e = Error::from(e);
                            warn!(generation, error = %e, "Failed to send frame");
                            report_failure(&events, &e);
                            break;
                        }
                        trace!(generation, "Frame sent");
                    }

                    Some(Outbound::Close) | None => {
                        debug!(generation, "Closing WebSocket");
                        let _ = ws_write.close().await;
                        events.closed("closed by client");
                        break;
                    }
                }
            }
        }
    }

    debug!(generation, "Socket task terminated");
}

/// Reports a fatal socket failure as `error` followed by `closed`.
fn report_failure(events: &TransportEvents, error: &Error) {
    let message = error.to_string();
    events.error(message.clone());
    events.closed(message);
}

// ============================================================================
// Tests
// ============================================================================
