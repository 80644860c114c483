//! Inbound (server → client) message types.
//!
//! Responses arrive asynchronously and are dispatched by their `t` tag to
//! whichever listeners are registered at delivery time.
//!
//! # Response Types
//!
//! | Tag | Payload |
//! |-----|---------|
//! | `SCREENER_SUBSCRIBED` | [`SessionAck`] |
//! | `SCREENER_PATCHED` | [`SessionAck`] |
//! | `SCREENER_FULL_RESPONSE` | [`FullSnapshot`] |
//! | `SCREENER_PARTIAL_RESPONSE` | [`PartialUpdate`] |
//! | `SCREENER_META_UPDATE` | [`MetaUpdate`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// MessageTag
// ============================================================================

/// Discriminant of an inbound message.
///
/// Listener registration is keyed by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageTag {
    /// `SCREENER_SUBSCRIBED`
    ScreenerSubscribed,
    /// `SCREENER_PATCHED`
    ScreenerPatched,
    /// `SCREENER_FULL_RESPONSE`
    ScreenerFullResponse,
    /// `SCREENER_PARTIAL_RESPONSE`
    ScreenerPartialResponse,
    /// `SCREENER_META_UPDATE`
    ScreenerMetaUpdate,
}

impl MessageTag {
    /// Every inbound tag, in wire-declaration order.
    pub const ALL: [Self; 5] = [
        Self::ScreenerSubscribed,
        Self::ScreenerPatched,
        Self::ScreenerFullResponse,
        Self::ScreenerPartialResponse,
        Self::ScreenerMetaUpdate,
    ];

    /// Returns the wire representation.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ScreenerSubscribed => "SCREENER_SUBSCRIBED",
            Self::ScreenerPatched => "SCREENER_PATCHED",
            Self::ScreenerFullResponse => "SCREENER_FULL_RESPONSE",
            Self::ScreenerPartialResponse => "SCREENER_PARTIAL_RESPONSE",
            Self::ScreenerMetaUpdate => "SCREENER_META_UPDATE",
        }
    }

    /// Parses a wire tag.
    #[must_use]
    pub fn from_wire(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_wire(s).ok_or_else(|| Error::unknown_tag(s))
    }
}

// ============================================================================
// Response
// ============================================================================

/// A message from server to client.
///
/// # Format
///
/// ```json
/// { "t": "SCREENER_META_UPDATE", "session_id": "abc", "total": 2400, "filtered": 37 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    /// Subscription acknowledged.
    ScreenerSubscribed(SessionAck),
    /// Patch acknowledged.
    ScreenerPatched(SessionAck),
    /// Full table snapshot.
    ScreenerFullResponse(FullSnapshot),
    /// Changed rows.
    ScreenerPartialResponse(PartialUpdate),
    /// Row counts changed.
    ScreenerMetaUpdate(MetaUpdate),
}

impl Response {
    /// Returns the tag of this message.
    #[must_use]
    pub const fn tag(&self) -> MessageTag {
        match self {
            Self::ScreenerSubscribed(_) => MessageTag::ScreenerSubscribed,
            Self::ScreenerPatched(_) => MessageTag::ScreenerPatched,
            Self::ScreenerFullResponse(_) => MessageTag::ScreenerFullResponse,
            Self::ScreenerPartialResponse(_) => MessageTag::ScreenerPartialResponse,
            Self::ScreenerMetaUpdate(_) => MessageTag::ScreenerMetaUpdate,
        }
    }

    /// Returns the session this message belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::ScreenerSubscribed(ack) | Self::ScreenerPatched(ack) => &ack.session_id,
            Self::ScreenerFullResponse(snapshot) => &snapshot.session_id,
            Self::ScreenerPartialResponse(update) => &update.session_id,
            Self::ScreenerMetaUpdate(meta) => &meta.session_id,
        }
    }

    /// Returns the snapshot payload, if this is a full response.
    #[inline]
    #[must_use]
    pub fn as_full(&self) -> Option<&FullSnapshot> {
        match self {
            Self::ScreenerFullResponse(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Returns the partial payload, if this is a partial response.
    #[inline]
    #[must_use]
    pub fn as_partial(&self) -> Option<&PartialUpdate> {
        match self {
            Self::ScreenerPartialResponse(update) => Some(update),
            _ => None,
        }
    }

    /// Returns the meta payload, if this is a meta update.
    #[inline]
    #[must_use]
    pub fn as_meta(&self) -> Option<&MetaUpdate> {
        match self {
            Self::ScreenerMetaUpdate(meta) => Some(meta),
            _ => None,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Acknowledgement carrying only the session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAck {
    /// Acknowledged session.
    pub session_id: SessionId,
}

/// Full table snapshot of a session's current view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullSnapshot {
    /// Session the snapshot belongs to.
    pub session_id: SessionId,

    /// Column names, parallel to each row.
    #[serde(rename = "c")]
    pub columns: Vec<String>,

    /// Rows of cells.
    #[serde(rename = "d")]
    pub rows: Vec<Vec<Cell>>,

    /// Total matching rows server-side.
    #[serde(deserialize_with = "deserialize_count")]
    pub total: u64,

    /// Row window `[start, end]` this snapshot covers.
    #[serde(deserialize_with = "deserialize_range")]
    pub range: (u64, u64),
}

impl FullSnapshot {
    /// Returns the index of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns a cell by row index and column name.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }
}

/// Changed rows, each a column → value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialUpdate {
    /// Session the update belongs to.
    pub session_id: SessionId,

    /// Changed rows.
    #[serde(rename = "d")]
    pub rows: Vec<Map<String, Value>>,
}

/// Row-count update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaUpdate {
    /// Session the counts belong to.
    pub session_id: SessionId,
    /// Rows in the universe.
    #[serde(deserialize_with = "deserialize_count")]
    pub total: u64,
    /// Rows passing the current filters.
    #[serde(deserialize_with = "deserialize_count")]
    pub filtered: u64,
}

// ============================================================================
// Count Decoding
// ============================================================================

// Counts are any non-negative whole JSON number, `12.0` included.

fn number_to_count(number: &Number) -> Option<u64> {
    if let Some(count) = number.as_u64() {
        return Some(count);
    }
    let value = number.as_f64()?;
    (value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64).then_some(value as u64)
}

fn count_from<E: de::Error>(number: &Number) -> StdResult<u64, E> {
    number_to_count(number)
        .ok_or_else(|| E::custom(format!("expected a non-negative whole number, got {number}")))
}

fn deserialize_count<'de, D>(deserializer: D) -> StdResult<u64, D::Error>
where
    D: Deserializer<'de>,
{
    count_from(&Number::deserialize(deserializer)?)
}

fn deserialize_range<'de, D>(deserializer: D) -> StdResult<(u64, u64), D::Error>
where
    D: Deserializer<'de>,
{
    let (start, end) = <(Number, Number)>::deserialize(deserializer)?;
    Ok((count_from(&start)?, count_from(&end)?))
}

// ============================================================================
// Cell
// ============================================================================

/// A single table cell: string, number or boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    Text(String),
}

impl Cell {
    /// Returns the numeric value, if any.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text value, if any.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean value, if any.
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

// ============================================================================
// Frame Decoding
// ============================================================================

/// Decodes an inbound text frame.
///
/// # Errors
///
/// - [`Error::Json`] if the frame is not JSON
/// - [`Error::MissingTag`] if the frame has no string `t` field
/// - [`Error::UnknownTag`] if `t` names no inbound message
/// - [`Error::Protocol`] if a known tag carries the wrong shape
pub fn decode_frame(text: &str) -> Result<Response> {
    let value: Value = serde_json::from_str(text)?;

    let tag = value
        .get("t")
        .and_then(Value::as_str)
        .ok_or(Error::MissingTag)?;

    let tag = MessageTag::from_wire(tag).ok_or_else(|| Error::unknown_tag(tag))?;

    serde_json::from_value(value).map_err(|e| Error::protocol(format!("{tag}: {e}")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_subscribed() {
        let response =
            decode_frame(r#"{"t":"SCREENER_SUBSCRIBED","session_id":"s1"}"#).expect("decode");
        assert_eq!(response.tag(), MessageTag::ScreenerSubscribed);
        assert_eq!(response.session_id(), &SessionId::new("s1"));
    }

    #[test]
    fn test_decode_full_response() {
        let json_str = r#"{
            "t": "SCREENER_FULL_RESPONSE",
            "session_id": "abc",
            "c": ["symbol", "close", "halted"],
            "d": [["RELIANCE", 2890.5, false], ["TCS", 3999, true]],
            "total": 2,
            "range": [0, 50]
        }"#;

        let response = decode_frame(json_str).expect("decode");
        let snapshot = response.as_full().expect("full snapshot");

        assert_eq!(snapshot.columns, vec!["symbol", "close", "halted"]);
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.range, (0, 50));
        assert_eq!(snapshot.cell(0, "symbol").and_then(Cell::as_str), Some("RELIANCE"));
        assert_eq!(snapshot.cell(1, "close").and_then(Cell::as_f64), Some(3999.0));
        assert_eq!(snapshot.cell(1, "halted").and_then(Cell::as_bool), Some(true));
        assert_eq!(snapshot.cell(5, "close"), None);
        assert_eq!(snapshot.cell(0, "missing"), None);
    }

    #[test]
    fn test_decode_partial_response() {
        let json_str = r#"{
            "t": "SCREENER_PARTIAL_RESPONSE",
            "session_id": "abc",
            "d": [{"symbol": "INFY", "close": 1520.1}]
        }"#;

        let response = decode_frame(json_str).expect("decode");
        let update = response.as_partial().expect("partial");
        assert_eq!(update.rows.len(), 1);
        assert_eq!(update.rows[0]["symbol"], "INFY");
    }

    #[test]
    fn test_decode_meta_update() {
        let response = decode_frame(
            r#"{"t":"SCREENER_META_UPDATE","session_id":"m","total":2400,"filtered":37}"#,
        )
        .expect("decode");

        let meta = response.as_meta().expect("meta");
        assert_eq!(meta.total, 2400);
        assert_eq!(meta.filtered, 37);
        assert!(response.as_full().is_none());
    }

    #[test]
    fn test_decode_counts_sent_as_floats() {
        let response = decode_frame(
            r#"{"t":"SCREENER_META_UPDATE","session_id":"m","total":2400.0,"filtered":12.0}"#,
        )
        .expect("decode");
        assert_eq!(response.as_meta().map(|m| (m.total, m.filtered)), Some((2400, 12)));

        let response = decode_frame(
            r#"{"t":"SCREENER_FULL_RESPONSE","session_id":"f","c":[],"d":[],"total":3.0,"range":[0.0,50]}"#,
        )
        .expect("decode");
        let snapshot = response.as_full().expect("full snapshot");
        assert_eq!((snapshot.total, snapshot.range), (3, (0, 50)));
    }

    #[test]
    fn test_decode_rejects_negative_or_fractional_counts() {
        for frame in [
            r#"{"t":"SCREENER_META_UPDATE","session_id":"m","total":-1,"filtered":0}"#,
            r#"{"t":"SCREENER_META_UPDATE","session_id":"m","total":10,"filtered":1.5}"#,
            r#"{"t":"SCREENER_FULL_RESPONSE","session_id":"f","c":[],"d":[],"total":1,"range":[-5,5]}"#,
        ] {
            let err = decode_frame(frame).unwrap_err();
            assert!(matches!(err, Error::Protocol { ref message } if message.contains("non-negative")));
        }
    }

    #[test]
    fn test_decode_null_cell() {
        let response = decode_frame(
            r#"{"t":"SCREENER_FULL_RESPONSE","session_id":"n","c":["pe"],"d":[[null]],"total":1,"range":[0,1]}"#,
        )
        .expect("decode");
        assert_eq!(response.as_full().and_then(|s| s.cell(0, "pe")), Some(&Cell::Null));
    }

    #[test]
    fn test_decode_invalid_json() {
        let err = decode_frame("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_decode_missing_tag() {
        let err = decode_frame(r#"{"session_id":"s1"}"#).unwrap_err();
        assert!(matches!(err, Error::MissingTag));

        let err = decode_frame(r#"{"t":42}"#).unwrap_err();
        assert!(matches!(err, Error::MissingTag));

        let err = decode_frame("[1,2,3]").unwrap_err();
        assert!(matches!(err, Error::MissingTag));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let err = decode_frame(r#"{"t":"PONG"}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownTag { ref tag } if tag == "PONG"));
    }

    #[test]
    fn test_decode_wrong_shape() {
        let err = decode_frame(r#"{"t":"SCREENER_META_UPDATE","session_id":"m"}"#).unwrap_err();
        assert!(
            matches!(err, Error::Protocol { ref message } if message.starts_with("SCREENER_META_UPDATE"))
        );
        assert!(err.is_frame_error());
    }

    #[test]
    fn test_tag_wire_names() {
        for tag in MessageTag::ALL {
            assert_eq!(MessageTag::from_wire(tag.as_str()), Some(tag));
            assert_eq!(tag.as_str().parse::<MessageTag>().expect("parse"), tag);
        }
        assert!("SCREENER_SUBSCRIBE".parse::<MessageTag>().is_err());
    }
}
