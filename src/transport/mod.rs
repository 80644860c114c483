//! Message-oriented transport layer.
//!
//! A transport behaves like a browser socket: opening returns at once, and
//! the outcome (open, inbound text, error, close) arrives later as
//! [`TransportEvent`]s on a [`TransportEvents`] sink owned by the
//! connection event loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   open(url, events)   ┌──────────────────────┐
//! │  RealtimeConnection  │──────────────────────►│  Connector           │
//! │  event loop          │                       │  → Box<dyn Transport>│
//! │                      │◄──── TransportEvent ──│                      │
//! │                      │───── send(frame) ────►│                      │
//! └──────────────────────┘                       └──────────────────────┘
//! ```
//!
//! Every event is stamped with the generation of the transport that
//! produced it, so events from a discarded transport can be ignored.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | `tokio-tungstenite` client transport |
//! | `memory` | In-process transport with a scriptable peer |

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport.
pub mod memory;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryConnector, MemorySocket};
pub use websocket::WebSocketConnector;

// ============================================================================
// TransportEvent
// ============================================================================

/// Lifecycle notification from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Transport is open and can carry frames.
    Opened,
    /// Inbound text frame.
    Message(String),
    /// Transport-level failure. A [`TransportEvent::Closed`] follows when
    /// the failure ends the transport.
    Error(String),
    /// Transport is closed.
    Closed(String),
}

/// Channel carrying generation-stamped events to the event loop.
pub(crate) type EventSender = mpsc::UnboundedSender<(u64, TransportEvent)>;

// ============================================================================
// TransportEvents
// ============================================================================

/// Sink through which a transport reports its lifecycle.
///
/// Reporting never fails; events sent after the connection is gone are
/// discarded.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: EventSender,
}

impl TransportEvents {
    /// Creates a sink for the transport of the given generation.
    pub(crate) fn new(generation: u64, tx: EventSender) -> Self {
        Self { generation, tx }
    }

    /// Returns the generation stamped on every event.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if the receiving connection no longer exists.
    #[inline]
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }

    /// Reports that the transport opened.
    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    /// Reports an inbound text frame.
    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    /// Reports a transport error.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into()));
    }

    /// Reports that the transport closed.
    pub fn closed(&self, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed(reason.into()));
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send((self.generation, event));
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Client side of one open (or opening) transport.
pub trait Transport: Send {
    /// Transmits one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the transport can no longer carry frames.
    fn send(&mut self, frame: String) -> Result<()>;

    /// Starts closing the transport. Idempotent.
    fn close(&mut self);
}

/// Factory for transports bound to an endpoint URL.
pub trait Connector: Send + Sync + 'static {
    /// Begins opening a transport to `url`.
    ///
    /// Must return without waiting for the transport to open; progress is
    /// reported through `events`.
    fn open(&self, url: &Url, events: TransportEvents) -> Box<dyn Transport>;
}

// ============================================================================
// Tests
// ============================================================================
