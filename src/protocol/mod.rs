//! Wire protocol message types.
//!
//! JSON text frames discriminated by a `t` field.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Request`] | Client → Server | Auth and screener session control |
//! | [`Response`] | Server → Client | Session acks, snapshots, updates |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `request` | Outbound requests and patch builder |
//! | `response` | Inbound responses, tags and frame decoding |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound request types.
pub mod request;

/// Inbound response types.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use request::{NO_AUTH_TOKEN, Request, ScreenerPatch};
pub use response::{
    Cell, FullSnapshot, MessageTag, MetaUpdate, PartialUpdate, Response, SessionAck, decode_frame,
};
