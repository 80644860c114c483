//! Screener session helper.
//!
//! Binds a [`RealtimeConnection`] to one [`SessionId`] so callers can send
//! the session's requests and listen for its responses without repeating
//! the id filter everywhere.
//!
//! # Example
//!
//! ```ignore
//! let session = ScreenerSession::generate(&connection);
//! let ack = session.subscribed();
//! session.subscribe(Some("rsi < 30".into()));
//! ack.await?;
//!
//! let meta = session.on_meta(|meta| println!("{} / {}", meta.filtered, meta.total));
//! session.patch(ScreenerPatch::new().with_range(0, 100));
//! let snapshot = session.full_response().await?;
//!
//! session.unsubscribe();
//! connection.off(MessageTag::ScreenerMetaUpdate, meta);
//! ```

// ============================================================================
// Imports
// ============================================================================

use tracing::debug;

use crate::connection::RealtimeConnection;
use crate::events::WaitFor;
use crate::identifiers::{ListenerId, SessionId};
use crate::protocol::{
    FullSnapshot, MessageTag, MetaUpdate, PartialUpdate, Request, Response, ScreenerPatch,
};

// ============================================================================
// Auth Hook
// ============================================================================

/// Returns an open hook sending `{t: "AUTH", token}` after every open.
///
/// Without a token the literal `"no_auth"` is sent.
pub fn auth_on_open(token: Option<String>) -> impl Fn() -> Option<Request> + Send + Sync + 'static {
    move || Some(Request::auth(token.as_deref()))
}

// ============================================================================
// ScreenerSession
// ============================================================================

/// One screener session on a shared connection.
#[derive(Debug, Clone)]
pub struct ScreenerSession {
    connection: RealtimeConnection,
    session_id: SessionId,
}

impl ScreenerSession {
    /// Binds `session_id` to `connection`.
    #[must_use]
    pub fn new(connection: &RealtimeConnection, session_id: SessionId) -> Self {
        Self {
            connection: connection.clone(),
            session_id,
        }
    }

    /// Binds a freshly generated session id to `connection`.
    #[must_use]
    pub fn generate(connection: &RealtimeConnection) -> Self {
        Self::new(connection, SessionId::generate())
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Sends SCREENER_SUBSCRIBE.
    pub fn subscribe(&self, query: Option<String>) {
        debug!(session_id = %self.session_id, "Subscribing screener session");
        self.connection
            .send_message(Request::subscribe(self.session_id.clone(), query));
    }

    /// Sends SCREENER_PATCH.
    pub fn patch(&self, patch: ScreenerPatch) {
        self.connection
            .send_message(Request::patch(self.session_id.clone(), patch));
    }

    /// Sends SCREENER_UNSUBSCRIBE.
    pub fn unsubscribe(&self) {
        debug!(session_id = %self.session_id, "Unsubscribing screener session");
        self.connection
            .send_message(Request::unsubscribe(self.session_id.clone()));
    }

    // ========================================================================
    // One-shot Waits
    // ========================================================================

    /// Waits for this session's SCREENER_SUBSCRIBED.
    pub fn subscribed(&self) -> WaitFor {
        self.wait(MessageTag::ScreenerSubscribed)
    }

    /// Waits for this session's SCREENER_PATCHED.
    pub fn patched(&self) -> WaitFor {
        self.wait(MessageTag::ScreenerPatched)
    }

    /// Waits for this session's next SCREENER_FULL_RESPONSE.
    pub fn full_response(&self) -> WaitFor {
        self.wait(MessageTag::ScreenerFullResponse)
    }

    /// Waits for this session's next SCREENER_META_UPDATE.
    pub fn meta_update(&self) -> WaitFor {
        self.wait(MessageTag::ScreenerMetaUpdate)
    }

    fn wait(&self, tag: MessageTag) -> WaitFor {
        let session_id = self.session_id.clone();
        self.connection
            .wait_for(tag, move |msg| msg.session_id() == &session_id)
    }

    // ========================================================================
    // Persistent Listeners
    // ========================================================================

    /// Calls `listener` with every full snapshot of this session.
    ///
    /// Remove with `off(MessageTag::ScreenerFullResponse, id)`.
    pub fn on_full<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&FullSnapshot) + Send + Sync + 'static,
    {
        self.listen(MessageTag::ScreenerFullResponse, move |msg| {
            if let Some(snapshot) = msg.as_full() {
                listener(snapshot);
            }
        })
    }

    /// Calls `listener` with every partial update of this session.
    ///
    /// Remove with `off(MessageTag::ScreenerPartialResponse, id)`.
    pub fn on_partial<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PartialUpdate) + Send + Sync + 'static,
    {
        self.listen(MessageTag::ScreenerPartialResponse, move |msg| {
            if let Some(update) = msg.as_partial() {
                listener(update);
            }
        })
    }

    /// Calls `listener` with every meta update of this session.
    ///
    /// Remove with `off(MessageTag::ScreenerMetaUpdate, id)`.
    pub fn on_meta<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MetaUpdate) + Send + Sync + 'static,
    {
        self.listen(MessageTag::ScreenerMetaUpdate, move |msg| {
            if let Some(meta) = msg.as_meta() {
                listener(meta);
            }
        })
    }

    fn listen<F>(&self, tag: MessageTag, listener: F) -> ListenerId
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        let session_id = self.session_id.clone();
        self.connection.on(tag, move |msg| {
            if msg.session_id() == &session_id {
                listener(msg);
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::NO_AUTH_TOKEN;

    #[test]
    fn test_auth_hook_with_token() {
        let hook = auth_on_open(Some("secret".into()));
        assert_eq!(
            hook(),
            Some(Request::Auth {
                token: "secret".into()
            })
        );
        // Reusable on every open
        assert!(hook().is_some());
    }

    #[test]
    fn test_auth_hook_without_token() {
        let hook = auth_on_open(None);
        assert_eq!(
            hook(),
            Some(Request::Auth {
                token: NO_AUTH_TOKEN.into()
            })
        );
    }

    #[test]
    fn test_session_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScreenerSession>();
    }
}
