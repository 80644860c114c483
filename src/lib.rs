//! Screener Stream - reconnecting realtime client for screener sessions.
//!
//! This library keeps one message-oriented connection to a realtime
//! screener endpoint, queues outbound requests until the connection is
//! ready, recovers from unexpected disconnects with bounded exponential
//! backoff, and dispatches inbound typed messages to listeners.
//!
//! # Architecture
//!
//! - **Transport**: opens a socket and reports open/message/error/close
//! - **Event bus**: listener registry keyed by message tag
//! - **Connection**: one event loop task owning transport, queue and
//!   reconnect state, shared through cheap handles
//!
//! Key properties:
//!
//! - Requests are sent exactly once, in `send_message` order, across any
//!   number of reconnects
//! - Runtime transport failures never surface as errors; they feed the
//!   reconnect cycle
//! - Malformed inbound frames are dropped without reaching listeners
//!
//! # Quick Start
//!
//! ```no_run
//! use screener_stream::{MessageTag, RealtimeConnection, Request, Result, SessionId};
//! use screener_stream::screener::auth_on_open;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = RealtimeConnection::builder()
//!         .url("ws://127.0.0.1:8080/ws")
//!         .on_open(auth_on_open(None))
//!         .build()?;
//!
//!     let session = SessionId::new("s1");
//!     let wanted = session.clone();
//!     let snapshot = connection.wait_for(MessageTag::ScreenerFullResponse, move |msg| {
//!         msg.session_id() == &wanted
//!     });
//!
//!     // Connects on demand
//!     connection.send_message(Request::subscribe(session, None));
//!
//!     let snapshot = snapshot.await?;
//!     println!("{:?}", snapshot.as_full().map(|s| s.total));
//!
//!     connection.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | [`RealtimeConnection`], builder, reconnect policy |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | [`EventBus`] listener registry and [`WaitFor`] |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`screener`] | Per-session helper |
//! | [`transport`] | Transport traits, WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Realtime connection handle, builder and policy.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Typed listener registry.
pub mod events;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire protocol message types.
pub mod protocol;

/// Screener session helper.
pub mod screener;

/// Message-oriented transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{
    ConnectionBuilder, ConnectionOptions, ConnectionState, ConnectionStatus, RealtimeConnection,
};

// Error types
pub use error::{Error, Result};

// Event types
pub use events::{EventBus, WaitFor};

// Identifier types
pub use identifiers::{ListenerId, SessionId};

// Protocol types
pub use protocol::{
    Cell, FullSnapshot, MessageTag, MetaUpdate, PartialUpdate, Request, Response, ScreenerPatch,
    SessionAck,
};

// Screener types
pub use screener::ScreenerSession;

// Transport types
pub use transport::{Connector, MemoryConnector, Transport, TransportEvents, WebSocketConnector};
