//! In-process transport.
//!
//! [`MemoryConnector`] hands every opened transport's peer side to the
//! caller as a [`MemorySocket`]. The peer decides when the transport opens,
//! what it receives and when it closes, and observes every frame the
//! connection transmits. Used by the test suite and by hosts that embed
//! the client without a network.
//!
//! # Example
//!
//! ```ignore
//! let connector = MemoryConnector::new();
//! let connection = RealtimeConnection::builder()
//!     .url("ws://screener.local/ws")
//!     .connector(connector.clone())
//!     .build()?;
//!
//! connection.send_message(Request::subscribe("s1".into(), None));
//!
//! let socket = connector.next_socket().await.expect("auto-connect");
//! socket.open();
//! let frame = socket.next_frame().await;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};

use super::{Connector, Transport, TransportEvents};

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector producing in-process transports.
///
/// Cheap to clone; clones share the same socket queue.
#[derive(Clone)]
pub struct MemoryConnector {
    inner: Arc<ConnectorInner>,
}

struct ConnectorInner {
    opens: AtomicUsize,
    sockets_tx: mpsc::UnboundedSender<MemorySocket>,
    sockets_rx: Mutex<mpsc::UnboundedReceiver<MemorySocket>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    /// Creates a connector with no sockets opened yet.
    #[must_use]
    pub fn new() -> Self {
        let (sockets_tx, sockets_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ConnectorInner {
                opens: AtomicUsize::new(0),
                sockets_tx,
                sockets_rx: Mutex::new(sockets_rx),
            }),
        }
    }

    /// Returns how many transports have been opened.
    #[inline]
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Waits for the peer side of the next opened transport.
    pub async fn next_socket(&self) -> Option<MemorySocket> {
        self.inner.sockets_rx.lock().await.recv().await
    }

    /// Returns the peer side of the next opened transport, if one is ready.
    #[must_use]
    pub fn try_next_socket(&self) -> Option<MemorySocket> {
        self.inner.sockets_rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, url: &Url, events: TransportEvents) -> Box<dyn Transport> {
        let opens = self.inner.opens.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(url = %url, generation = events.generation(), opens, "Memory transport opened");

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let socket = MemorySocket {
            url: url.clone(),
            events: events.clone(),
            frames_rx: Mutex::new(frames_rx),
            closed_by_client: Arc::clone(&closed),
        };
        let _ = self.inner.sockets_tx.send(socket);

        Box::new(MemoryTransport {
            events,
            frames_tx,
            closed,
        })
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// Client side of an in-process transport.
struct MemoryTransport {
    events: TransportEvents,
    frames_tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl Transport for MemoryTransport {
    fn send(&mut self, frame: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.frames_tx
            .send(frame)
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // A client close still reports `closed`, as a browser socket does
            self.events.closed("closed by client");
        }
    }
}

// ============================================================================
// MemorySocket
// ============================================================================

/// Peer side of an in-process transport.
pub struct MemorySocket {
    url: Url,
    events: TransportEvents,
    frames_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    closed_by_client: Arc<AtomicBool>,
}

impl std::fmt::Debug for MemorySocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySocket")
            .field("url", &self.url.as_str())
            .field("generation", &self.events.generation())
            .field("closed_by_client", &self.is_closed_by_client())
            .finish_non_exhaustive()
    }
}

impl MemorySocket {
    /// Returns the URL the transport was opened for.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the transport generation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    /// Returns `true` once the client closed the transport.
    #[inline]
    #[must_use]
    pub fn is_closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }

    /// Completes the open handshake.
    pub fn open(&self) {
        self.events.opened();
    }

    /// Delivers an inbound text frame to the client.
    pub fn deliver(&self, text: impl Into<String>) {
        self.events.message(text);
    }

    /// Reports a transport error without closing.
    pub fn fail(&self, message: impl Into<String>) {
        self.events.error(message);
    }

    /// Closes the transport from the peer side.
    pub fn close(&self, reason: impl Into<String>) {
        self.events.closed(reason);
    }

    /// Waits for the next frame the client transmits.
    ///
    /// Returns `None` once the client transport is dropped and every sent
    /// frame has been read.
    pub async fn next_frame(&self) -> Option<String> {
        self.frames_rx.lock().await.recv().await
    }

    /// Returns the next transmitted frame, if one is buffered.
    #[must_use]
    pub fn try_next_frame(&self) -> Option<String> {
        self.frames_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Returns every buffered transmitted frame.
    #[must_use]
    pub fn drain_frames(&self) -> Vec<String> {
        let Ok(mut rx) = self.frames_rx.try_lock() else {
            return Vec::new();
        };
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
