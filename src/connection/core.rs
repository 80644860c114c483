//! Realtime connection handle.
//!
//! [`RealtimeConnection`] is the public face of the connection event loop.
//! Every operation returns immediately: lifecycle and send operations post
//! a command to the loop, listener operations go straight to the shared
//! [`EventBus`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};
use url::Url;

use crate::error::Result;
use crate::events::{EventBus, WaitFor};
use crate::identifiers::ListenerId;
use crate::protocol::{MessageTag, Request, Response};
use crate::transport::Connector;

use super::builder::ConnectionBuilder;
use super::event_loop::{ConnectionCommand, EventLoop};
use super::options::ConnectionOptions;

// ============================================================================
// Types
// ============================================================================

/// Open hook callback type.
///
/// Called after every successful open. A returned request is transmitted
/// before any queued request.
pub type OpenHandler = Box<dyn Fn() -> Option<Request> + Send + Sync>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Transport lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport created, not yet open.
    Connecting,
    /// Transport open; queued requests are flushed.
    Open,
}

impl ConnectionState {
    /// Returns the state name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Snapshot of the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Consecutive unexpected closes since the last successful open.
    pub reconnect_attempts: u32,
    /// `true` once automatic reconnection has given up. Cleared by
    /// [`RealtimeConnection::connect`] or a successful open.
    pub retries_exhausted: bool,
}

// ============================================================================
// RealtimeConnection
// ============================================================================

/// Reconnecting, message-queued realtime connection.
///
/// Cheap to clone; clones share one event loop, one transport and one
/// listener registry. Construct one per endpoint at application start and
/// hand clones to consumers.
///
/// # Example
///
/// ```ignore
/// let connection = RealtimeConnection::builder()
///     .url("wss://api.example.com/ws")
///     .on_open(|| Some(Request::auth(None)))
///     .build()?;
///
/// let id = connection.on(MessageTag::ScreenerMetaUpdate, |msg| {
///     tracing::info!(?msg, "meta");
/// });
///
/// // Auto-connects; delivered once the socket opens
/// connection.send_message(Request::subscribe("s1".into(), None));
///
/// let snapshot = connection
///     .wait_for(MessageTag::ScreenerFullResponse, |msg| msg.session_id() == "s1")
///     .await?;
///
/// connection.off(MessageTag::ScreenerMetaUpdate, id);
/// connection.shutdown();
/// ```
#[derive(Clone)]
pub struct RealtimeConnection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    url: Url,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    bus: EventBus,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl fmt::Debug for RealtimeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConnection")
            .field("url", &self.inner.url.as_str())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RealtimeConnection - Constructor
// ============================================================================

impl RealtimeConnection {
    /// Returns a builder for a new connection.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Creates a connection to `url` with the default policy and the
    /// WebSocket transport.
    ///
    /// # Errors
    ///
    /// See [`ConnectionBuilder::build`].
    pub fn new(url: impl Into<String>) -> Result<Self> {
        ConnectionBuilder::new().url(url).build()
    }

    /// Spawns the event loop. Must be called inside a tokio runtime.
    pub(crate) fn spawn(
        url: Url,
        options: ConnectionOptions,
        connector: Arc<dyn Connector>,
        on_open: Option<OpenHandler>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let bus = EventBus::new();

        let event_loop = EventLoop::new(
            url.clone(),
            options,
            connector,
            on_open,
            bus.clone(),
            status_tx,
            events_tx,
        );
        tokio::spawn(event_loop.run(command_rx, events_rx));

        debug!(url = %url, ?options, "Realtime connection created");

        Self {
            inner: Arc::new(ConnectionInner {
                url,
                command_tx,
                bus,
                status_rx,
            }),
        }
    }
}

// ============================================================================
// RealtimeConnection - Accessors
// ============================================================================

impl RealtimeConnection {
    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns the latest lifecycle snapshot.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status_rx.borrow()
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    /// Returns `true` if the transport is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns a receiver notified on every lifecycle change.
    #[inline]
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_rx.clone()
    }

    /// Returns the listener registry.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }
}

// ============================================================================
// RealtimeConnection - Lifecycle
// ============================================================================

impl RealtimeConnection {
    /// Opens a transport unless one is already opening or open.
    ///
    /// Failures surface asynchronously through the reconnect cycle. After
    /// automatic reconnection has given up, this starts a fresh retry budget.
    pub fn connect(&self) {
        self.post(ConnectionCommand::Connect);
    }

    /// Closes the transport, cancels any pending reconnect and resets the
    /// attempt counter. Queued requests stay queued.
    pub fn disconnect(&self) {
        self.post(ConnectionCommand::Disconnect);
    }

    /// Queues `request` for in-order transmission, connecting if needed.
    ///
    /// Never fails; the request is sent once the transport is open.
    pub fn send_message(&self, request: Request) {
        trace!(tag = request.tag(), "send_message");
        self.post(ConnectionCommand::Send(request));
    }

    /// Closes the transport and stops the event loop.
    ///
    /// Later operations on any clone are ignored.
    pub fn shutdown(&self) {
        self.post(ConnectionCommand::Shutdown);
    }

    fn post(&self, command: ConnectionCommand) {
        if self.inner.command_tx.send(command).is_err() {
            trace!("Connection event loop stopped, command ignored");
        }
    }
}

// ============================================================================
// RealtimeConnection - Listeners
// ============================================================================

impl RealtimeConnection {
    /// Registers a persistent listener. See [`EventBus::on`].
    pub fn on<F>(&self, tag: MessageTag, listener: F) -> ListenerId
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.inner.bus.on(tag, listener)
    }

    /// Removes a listener. See [`EventBus::off`].
    pub fn off(&self, tag: MessageTag, id: ListenerId) -> bool {
        self.inner.bus.off(tag, id)
    }

    /// Registers a one-shot listener. See [`EventBus::once`].
    pub fn once<F>(&self, tag: MessageTag, listener: F) -> ListenerId
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.inner.bus.once(tag, listener)
    }

    /// Waits for the first matching message. See [`EventBus::wait_for`].
    pub fn wait_for<P>(&self, tag: MessageTag, predicate: P) -> WaitFor
    where
        P: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.inner.bus.wait_for(tag, predicate)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_is_clone_and_debug() {
        fn assert_clone<T: Clone>() {}
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_clone::<RealtimeConnection>();
        assert_debug::<RealtimeConnection>();
    }

    #[test]
    fn test_connection_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RealtimeConnection>();
    }

    #[test]
    fn test_default_status() {
        let status = ConnectionStatus::default();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.reconnect_attempts, 0);
        assert!(!status.retries_exhausted);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(ConnectionState::Connecting.as_str(), "connecting");
    }
}
