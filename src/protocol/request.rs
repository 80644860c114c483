//! Outbound (client → server) message types.
//!
//! Every frame is a JSON object discriminated by its `t` field.
//!
//! | Tag | Purpose |
//! |-----|---------|
//! | `AUTH` | Handshake frame sent by the consumer after each open |
//! | `SCREENER_SUBSCRIBE` | Start streaming a screener session |
//! | `SCREENER_PATCH` | Change filters/sort/columns/range of a session |
//! | `SCREENER_UNSUBSCRIBE` | Stop streaming a session |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Token sent in the AUTH frame when the user is not signed in.
pub const NO_AUTH_TOKEN: &str = "no_auth";

// ============================================================================
// Request
// ============================================================================

/// A request from client to server.
///
/// Requests are fire-and-forget. The only correlation with responses is the
/// shared [`SessionId`] and the response tag.
///
/// # Format
///
/// ```json
/// { "t": "SCREENER_SUBSCRIBE", "session_id": "abc", "query": "rsi < 30" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// Authenticates the socket.
    Auth {
        /// Access token, or [`NO_AUTH_TOKEN`].
        token: String,
    },

    /// Subscribes to a screener session.
    ScreenerSubscribe {
        /// Session to stream.
        session_id: SessionId,
        /// Optional free-form screener query.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },

    /// Patches the view parameters of a session.
    ScreenerPatch {
        /// Session to patch.
        session_id: SessionId,
        /// Fields to change; absent fields are left untouched server-side.
        #[serde(flatten)]
        patch: ScreenerPatch,
    },

    /// Unsubscribes from a screener session.
    ScreenerUnsubscribe {
        /// Session to stop.
        session_id: SessionId,
    },
}

impl Request {
    /// Creates an AUTH frame, falling back to [`NO_AUTH_TOKEN`].
    #[must_use]
    pub fn auth(token: Option<&str>) -> Self {
        Self::Auth {
            token: token
                .filter(|t| !t.is_empty())
                .unwrap_or(NO_AUTH_TOKEN)
                .to_string(),
        }
    }

    /// Creates a SCREENER_SUBSCRIBE request.
    #[inline]
    #[must_use]
    pub fn subscribe(session_id: SessionId, query: Option<String>) -> Self {
        Self::ScreenerSubscribe { session_id, query }
    }

    /// Creates a SCREENER_PATCH request.
    #[inline]
    #[must_use]
    pub fn patch(session_id: SessionId, patch: ScreenerPatch) -> Self {
        Self::ScreenerPatch { session_id, patch }
    }

    /// Creates a SCREENER_UNSUBSCRIBE request.
    #[inline]
    #[must_use]
    pub fn unsubscribe(session_id: SessionId) -> Self {
        Self::ScreenerUnsubscribe { session_id }
    }

    /// Returns the wire tag.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "AUTH",
            Self::ScreenerSubscribe { .. } => "SCREENER_SUBSCRIBE",
            Self::ScreenerPatch { .. } => "SCREENER_PATCH",
            Self::ScreenerUnsubscribe { .. } => "SCREENER_UNSUBSCRIBE",
        }
    }

    /// Returns the session this request targets, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Auth { .. } => None,
            Self::ScreenerSubscribe { session_id, .. }
            | Self::ScreenerPatch { session_id, .. }
            | Self::ScreenerUnsubscribe { session_id } => Some(session_id),
        }
    }
}

// ============================================================================
// ScreenerPatch
// ============================================================================

/// Optional view changes carried by a SCREENER_PATCH request.
///
/// Filter and sort entries are opaque to the client and passed through.
///
/// # Example
///
/// ```ignore
/// let patch = ScreenerPatch::new()
///     .with_columns(["symbol", "close", "rsi"])
///     .with_range(0, 50);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenerPatch {
    /// Filter expressions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Value>>,

    /// Sort keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Value>>,

    /// Visible column names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    /// Requested row window `[start, end]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(u64, u64)>,
}

impl ScreenerPatch {
    /// Creates an empty patch.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filters: None,
            sort: None,
            columns: None,
            range: None,
        }
    }

    /// Sets the filter expressions.
    #[inline]
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<Value>) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Sets the sort keys.
    #[inline]
    #[must_use]
    pub fn with_sort(mut self, sort: Vec<Value>) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the visible columns.
    #[inline]
    #[must_use]
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the row window.
    #[inline]
    #[must_use]
    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.range = Some((start, end));
        self
    }

    /// Returns `true` if no field is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_none() && self.sort.is_none() && self.columns.is_none() && self.range.is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_serialization() {
        let request = Request::subscribe(SessionId::new("s1"), None);
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value, json!({ "t": "SCREENER_SUBSCRIBE", "session_id": "s1" }));
    }

    #[test]
    fn test_subscribe_with_query() {
        let request = Request::subscribe(SessionId::new("s1"), Some("rsi < 30".into()));
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["query"], "rsi < 30");
    }

    #[test]
    fn test_patch_omits_absent_fields() {
        let patch = ScreenerPatch::new()
            .with_columns(["symbol", "close"])
            .with_range(0, 50);
        let request = Request::patch(SessionId::new("s2"), patch);
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(
            value,
            json!({
                "t": "SCREENER_PATCH",
                "session_id": "s2",
                "columns": ["symbol", "close"],
                "range": [0, 50]
            })
        );
    }

    #[test]
    fn test_patch_with_filters_and_sort() {
        let patch = ScreenerPatch::new()
            .with_filters(vec![json!({ "left": "rsi", "op": "<", "right": 30 })])
            .with_sort(vec![json!({ "column": "volume", "desc": true })]);
        let json = serde_json::to_string(&Request::patch(SessionId::new("s"), patch))
            .expect("serialize");

        assert!(json.contains(r#""filters":[{"#));
        assert!(json.contains(r#""sort":[{"#));
        assert!(!json.contains("columns"));
    }

    #[test]
    fn test_unsubscribe_serialization() {
        let json = serde_json::to_string(&Request::unsubscribe(SessionId::new("s3")))
            .expect("serialize");
        assert_eq!(json, r#"{"t":"SCREENER_UNSUBSCRIBE","session_id":"s3"}"#);
    }

    #[test]
    fn test_auth_token_fallback() {
        assert_eq!(
            Request::auth(None),
            Request::Auth {
                token: NO_AUTH_TOKEN.to_string()
            }
        );
        assert_eq!(
            Request::auth(Some("")),
            Request::Auth {
                token: NO_AUTH_TOKEN.to_string()
            }
        );

        let json = serde_json::to_string(&Request::auth(Some("tok"))).expect("serialize");
        assert_eq!(json, r#"{"t":"AUTH","token":"tok"}"#);
    }

    #[test]
    fn test_tag_and_session_accessors() {
        let request = Request::unsubscribe(SessionId::new("x"));
        assert_eq!(request.tag(), "SCREENER_UNSUBSCRIBE");
        assert_eq!(request.session_id(), Some(&SessionId::new("x")));
        assert_eq!(Request::auth(None).session_id(), None);
    }

    #[test]
    fn test_empty_patch() {
        assert!(ScreenerPatch::new().is_empty());
        assert!(!ScreenerPatch::new().with_range(0, 1).is_empty());
    }
}
