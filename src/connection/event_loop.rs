//! Connection event loop.
//!
//! One tokio task owns every piece of mutable connection state: the
//! transport, the outbound queue, the reconnect counter and the reconnect
//! timer. It reacts to three sources, one at a time:
//!
//! - Commands from [`RealtimeConnection`](super::RealtimeConnection) handles
//! - Generation-stamped [`TransportEvent`]s
//! - The reconnect deadline
//!
//! Because only this task mutates the state, no step of a transition can
//! interleave with another.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::events::EventBus;
use crate::protocol::{Request, decode_frame};
use crate::transport::{Connector, EventSender, Transport, TransportEvent, TransportEvents};

use super::core::{ConnectionState, ConnectionStatus, OpenHandler};
use super::options::ConnectionOptions;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
#[derive(Debug)]
pub(crate) enum ConnectionCommand {
    /// Open a transport unless one exists.
    Connect,
    /// Close the transport without reconnecting.
    Disconnect,
    /// Queue a request for transmission.
    Send(Request),
    /// Close the transport and stop the loop.
    Shutdown,
}

// ============================================================================
// EventLoop
// ============================================================================

/// State owned by the event loop task.
pub(crate) struct EventLoop {
    url: Url,
    options: ConnectionOptions,
    connector: Arc<dyn Connector>,
    on_open: Option<OpenHandler>,
    bus: EventBus,
    status_tx: watch::Sender<ConnectionStatus>,
    events_tx: EventSender,

    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    generation: u64,
    queue: VecDeque<Request>,
    attempts: u32,
    exhausted: bool,
    reconnect_at: Option<Instant>,
}

impl EventLoop {
    /// Creates the loop state.
    pub(crate) fn new(
        url: Url,
        options: ConnectionOptions,
        connector: Arc<dyn Connector>,
        on_open: Option<OpenHandler>,
        bus: EventBus,
        status_tx: watch::Sender<ConnectionStatus>,
        events_tx: EventSender,
    ) -> Self {
        Self {
            url,
            options,
            connector,
            on_open,
            bus,
            status_tx,
            events_tx,
            state: ConnectionState::Disconnected,
            transport: None,
            generation: 0,
            queue: VecDeque::new(),
            attempts: 0,
            exhausted: false,
            reconnect_at: None,
        }
    }

    /// Runs until shutdown or until every handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        mut events_rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
    ) {
        debug!(url = %self.url, "Connection event loop started");

        loop {
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Connect) => self.connect(),
                        Some(ConnectionCommand::Disconnect) => self.disconnect(),
                        Some(ConnectionCommand::Send(request)) => self.enqueue(request),

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            break;
                        }

                        None => {
                            debug!("All connection handles dropped");
                            break;
                        }
                    }
                }

                // The loop holds a sender, so this channel never closes
                Some((generation, event)) = events_rx.recv() => {
                    self.handle_transport_event(generation, event);
                }

                () = sleep_until_deadline(reconnect_at) => {
                    self.reconnect_due();
                }
            }
        }

        self.disconnect();

        if !self.queue.is_empty() {
            debug!(pending = self.queue.len(), "Discarding queued messages on shutdown");
        }
        debug!("Connection event loop terminated");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Opens a transport unless one is already opening or open.
    fn connect(&mut self) {
        if self.transport.is_some() {
            trace!(state = ?self.state, "Connect ignored, transport exists");
            return;
        }

        if self.exhausted {
            debug!("Fresh connect after exhausted retries, resetting attempts");
            self.attempts = 0;
            self.exhausted = false;
        }

        self.reconnect_at = None;
        self.open_transport();
    }

    /// Closes the transport without scheduling a reconnect.
    fn disconnect(&mut self) {
        self.reconnect_at = None;
        self.attempts = 0;
        self.exhausted = false;

        if let Some(mut transport) = self.transport.take() {
            transport.close();
            info!(url = %self.url, generation = self.generation, "Disconnected");
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// Queues a request, connecting first if needed, then flushes.
    fn enqueue(&mut self, request: Request) {
        trace!(tag = request.tag(), pending = self.queue.len() + 1, "Request queued");
        self.queue.push_back(request);

        if self.state != ConnectionState::Open {
            self.connect();
        }

        self.flush();
    }

    // ========================================================================
    // Transport Events
    // ========================================================================

    fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation || self.transport.is_none() {
            trace!(generation, current = self.generation, ?event, "Ignoring event from discarded transport");
            return;
        }

        match event {
            TransportEvent::Opened => self.handle_open(),
            TransportEvent::Message(text) => self.handle_message(&text),
            TransportEvent::Error(message) => {
                // Recovery belongs to the close that follows
                warn!(generation, error = %message, "Transport error");
            }
            TransportEvent::Closed(reason) => self.handle_close(&reason),
        }
    }

    fn handle_open(&mut self) {
        self.attempts = 0;
        self.exhausted = false;
        self.set_state(ConnectionState::Open);
        info!(url = %self.url, generation = self.generation, pending = self.queue.len(), "Connection open");

        let frame = self.on_open.as_ref().and_then(|hook| {
            catch_unwind(AssertUnwindSafe(|| hook())).unwrap_or_else(|_| {
                error!("Open hook panicked, no handshake frame sent");
                None
            })
        });
        if let Some(frame) = frame {
            self.transmit_handshake(&frame);
        }

        self.flush();
    }

    fn handle_message(&self, text: &str) {
        match decode_frame(text) {
            Ok(response) => {
                let invoked = self.bus.dispatch(&response);
                trace!(tag = %response.tag(), session_id = %response.session_id(), invoked, "Frame dispatched");
            }

            Err(Error::UnknownTag { tag }) => {
                debug!(tag = %tag, "Dropping frame with unknown tag");
            }

            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping malformed frame");
            }
        }
    }

    fn handle_close(&mut self, reason: &str) {
        self.transport = None;
        self.state = ConnectionState::Disconnected;

        if self.attempts < self.options.max_reconnect_attempts {
            self.attempts += 1;
            let delay = self.options.reconnect_delay(self.attempts);
            self.reconnect_at = Some(Instant::now() + delay);

            info!(
                reason = %reason,
                attempt = self.attempts,
                max = self.options.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "Connection closed, scheduling reconnect"
            );
        } else {
            self.exhausted = true;
            warn!(
                reason = %reason,
                attempts = self.attempts,
                "Connection closed, reconnect attempts exhausted; call connect() to retry"
            );
        }

        self.publish();
    }

    fn reconnect_due(&mut self) {
        self.reconnect_at = None;

        if self.transport.is_none() {
            debug!(attempt = self.attempts, "Reconnecting");
            self.open_transport();
        }
    }

    // ========================================================================
    // Transmission
    // ========================================================================

    /// Transmits queued requests in order while the transport is open.
    fn flush(&mut self) {
        while self.state == ConnectionState::Open {
            let Some(request) = self.queue.front() else {
                break;
            };
            let tag = request.tag();

            let json = match serde_json::to_string(request) {
                Ok(json) => json,
                Err(e) => {
                    error!(tag, error = %e, "Failed to serialize request, dropping it");
                    self.queue.pop_front();
                    continue;
                }
            };

            let Some(transport) = self.transport.as_mut() else {
                break;
            };

            if let Err(e) = transport.send(json) {
                warn!(tag, error = %e, pending = self.queue.len(), "Transmit failed, keeping request queued");
                break;
            }

            self.queue.pop_front();
            trace!(tag, pending = self.queue.len(), "Request sent");
        }
    }

    /// Sends the open-hook frame ahead of the queue.
    fn transmit_handshake(&mut self, frame: &Request) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let result = serde_json::to_string(frame)
            .map_err(Error::from)
            .and_then(|json| transport.send(json));

        match result {
            Ok(()) => trace!(tag = frame.tag(), "Handshake frame sent"),
            Err(e) => warn!(tag = frame.tag(), error = %e, "Failed to send handshake frame"),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn open_transport(&mut self) {
        self.generation += 1;
        let events = TransportEvents::new(self.generation, self.events_tx.clone());

        debug!(url = %self.url, generation = self.generation, attempt = self.attempts, "Opening transport");

        self.transport = Some(self.connector.open(&self.url, events));
        self.set_state(ConnectionState::Connecting);
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(ConnectionStatus {
            state: self.state,
            reconnect_attempts: self.attempts,
            retries_exhausted: self.exhausted,
        });
    }
}

/// Sleeps until `deadline`, or forever if there is none.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
