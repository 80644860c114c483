//! Typed event dispatch.
//!
//! [`EventBus`] maps each inbound [`MessageTag`] to an ordered list of
//! listeners. Three registration kinds share that list, so dispatch order
//! is registration order regardless of kind:
//!
//! | Registration | Fires | Removed |
//! |--------------|-------|---------|
//! | [`EventBus::on`] | every matching message | by [`EventBus::off`] |
//! | [`EventBus::once`] | first matching message | automatically, after firing |
//! | [`EventBus::wait_for`] | first message passing the predicate | automatically, after resolving |
//!
//! Listeners run with the registry lock released, so a listener may
//! register or remove listeners (including itself) while being dispatched.
//! A listener or predicate that panics is logged and skipped; the rest of
//! the dispatch, and the connection driving it, carry on.
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! let id = bus.on(MessageTag::ScreenerMetaUpdate, |msg| {
//!     if let Some(meta) = msg.as_meta() {
//!         println!("{} of {} rows", meta.filtered, meta.total);
//!     }
//! });
//!
//! let snapshot = bus
//!     .wait_for(MessageTag::ScreenerFullResponse, |msg| msg.session_id() == "abc")
//!     .await?;
//!
//! bus.off(MessageTag::ScreenerMetaUpdate, id);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{error, trace};

use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::{MessageTag, Response};

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
///
/// Called with each dispatched message of the registered tag.
pub type Listener = Arc<dyn Fn(&Response) + Send + Sync>;

/// Predicate used by [`EventBus::wait_for`].
type Predicate = Box<dyn Fn(&Response) -> bool + Send + Sync>;

/// Registration kind.
enum Handler {
    Persistent(Listener),
    Once(Listener),
    Waiter(Arc<Waiter>),
}

/// A listener as stored in the registry.
struct Registration {
    id: ListenerId,
    handler: Handler,
}

/// Work collected under the lock and performed after releasing it.
enum Invocation {
    Call(Listener),
    Offer(ListenerId, Arc<Waiter>),
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: FxHashMap<MessageTag, Vec<Registration>>,
}

impl Registry {
    fn insert(&mut self, tag: MessageTag, handler: Handler) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId::from_raw(self.next_id);
        self.listeners
            .entry(tag)
            .or_default()
            .push(Registration { id, handler });
        id
    }
}

// ============================================================================
// Waiter
// ============================================================================

/// Outcome of offering a message to a waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offer {
    /// Predicate rejected the message.
    Pending,
    /// Waiter resolved with this message.
    Resolved,
    /// Waiter already resolved, or its future was dropped.
    Stale,
}

/// Predicate-filtered one-shot registration.
struct Waiter {
    predicate: Predicate,
    tx: Mutex<Option<oneshot::Sender<Response>>>,
}

impl Waiter {
    fn offer(&self, response: &Response) -> Offer {
        let mut slot = self.tx.lock();

        let Some(tx) = slot.as_ref() else {
            return Offer::Stale;
        };

        if tx.is_closed() {
            slot.take();
            return Offer::Stale;
        }

        match catch_unwind(AssertUnwindSafe(|| (self.predicate)(response))) {
            Ok(true) => {}
            Ok(false) => return Offer::Pending,
            Err(_) => {
                error!(tag = %response.tag(), "Waiter predicate panicked, abandoning wait");
                slot.take();
                return Offer::Stale;
            }
        }

        match slot.take().map(|tx| tx.send(response.clone())) {
            Some(Ok(())) => Offer::Resolved,
            _ => Offer::Stale,
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Listener registry keyed by message tag.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        let total: usize = registry.listeners.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("listeners", &total)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a persistent listener for `tag`.
    ///
    /// The listener fires for every matching message until removed with
    /// [`off`](Self::off).
    pub fn on<F>(&self, tag: MessageTag, listener: F) -> ListenerId
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        let id = self
            .registry
            .lock()
            .insert(tag, Handler::Persistent(Arc::new(listener)));
        trace!(%tag, %id, "Listener registered");
        id
    }

    /// Registers a listener that removes itself after its first invocation.
    pub fn once<F>(&self, tag: MessageTag, listener: F) -> ListenerId
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        let id = self
            .registry
            .lock()
            .insert(tag, Handler::Once(Arc::new(listener)));
        trace!(%tag, %id, "One-shot listener registered");
        id
    }

    /// Removes a listener.
    ///
    /// Returns `false` if no listener with `id` is registered for `tag`.
    pub fn off(&self, tag: MessageTag, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();

        let Some(entries) = registry.listeners.get_mut(&tag) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            registry.listeners.remove(&tag);
        }

        if removed {
            trace!(%tag, %id, "Listener removed");
        }
        removed
    }

    /// Returns a future resolving with the first `tag` message accepted by
    /// `predicate`.
    ///
    /// The registration removes itself once resolved. There is no timeout;
    /// race the future against a timer if one is needed. Dropping the future
    /// abandons the wait.
    pub fn wait_for<P>(&self, tag: MessageTag, predicate: P) -> WaitFor
    where
        P: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let waiter = Arc::new(Waiter {
            predicate: Box::new(predicate),
            tx: Mutex::new(Some(tx)),
        });

        let id = self.registry.lock().insert(tag, Handler::Waiter(waiter));
        trace!(%tag, %id, "Waiter registered");

        WaitFor { id, tag, rx }
    }

    /// Returns the number of registrations for `tag`.
    #[must_use]
    pub fn listener_count(&self, tag: MessageTag) -> usize {
        self.registry
            .lock()
            .listeners
            .get(&tag)
            .map_or(0, Vec::len)
    }

    /// Dispatches a message to every registration for its tag.
    ///
    /// Returns the number of listeners invoked (resolved waiters included).
    pub fn dispatch(&self, response: &Response) -> usize {
        let tag = response.tag();

        let invocations = {
            let mut registry = self.registry.lock();
            let Some(entries) = registry.listeners.get_mut(&tag) else {
                return 0;
            };

            let mut invocations = Vec::with_capacity(entries.len());
            entries.retain(|entry| match &entry.handler {
                Handler::Persistent(listener) => {
                    invocations.push(Invocation::Call(Arc::clone(listener)));
                    true
                }
                Handler::Once(listener) => {
                    invocations.push(Invocation::Call(Arc::clone(listener)));
                    false
                }
                Handler::Waiter(waiter) => {
                    invocations.push(Invocation::Offer(entry.id, Arc::clone(waiter)));
                    true
                }
            });
            invocations
        };

        let mut invoked = 0;
        let mut settled = Vec::new();

        for invocation in invocations {
            match invocation {
                Invocation::Call(listener) => {
                    if catch_unwind(AssertUnwindSafe(|| listener(response))).is_err() {
                        error!(%tag, session_id = %response.session_id(), "Listener panicked");
                    }
                    invoked += 1;
                }
                Invocation::Offer(id, waiter) => match waiter.offer(response) {
                    Offer::Pending => {}
                    Offer::Resolved => {
                        invoked += 1;
                        settled.push(id);
                    }
                    Offer::Stale => settled.push(id),
                },
            }
        }

        if !settled.is_empty() {
            let mut registry = self.registry.lock();
            if let Some(entries) = registry.listeners.get_mut(&tag) {
                entries.retain(|entry| !settled.contains(&entry.id));
                if entries.is_empty() {
                    registry.listeners.remove(&tag);
                }
            }
        }

        trace!(%tag, invoked, "Message dispatched");
        invoked
    }
}

// ============================================================================
// WaitFor
// ============================================================================

/// Future returned by [`EventBus::wait_for`].
///
/// Resolves exactly once. Yields [`Error::ChannelClosed`] if the
/// registration is removed (via [`EventBus::off`] with [`WaitFor::id`]) or
/// the bus is dropped before a match arrives.
#[must_use = "futures do nothing unless polled"]
#[derive(Debug)]
pub struct WaitFor {
    id: ListenerId,
    tag: MessageTag,
    rx: oneshot::Receiver<Response>,
}

impl WaitFor {
    /// Returns the registration id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns the awaited tag.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> MessageTag {
        self.tag
    }
}

impl Future for WaitFor {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map_err(Error::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
