//! Realtime connection: lifecycle, queueing, reconnection and dispatch.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RealtimeConnection`] | Shared handle: connect, send, listen |
//! | [`ConnectionBuilder`] | Fluent configuration builder |
//! | [`ConnectionOptions`] | Reconnect policy |
//! | [`ConnectionStatus`] | Observable lifecycle snapshot |
//!
//! # Lifecycle
//!
//! ```text
//!              connect() / send_message()
//! Disconnected ──────────────────────────► Connecting ──opened──► Open
//!      ▲  ▲                                    │                   │
//!      │  └──── reconnect timer ◄── closed ────┴───────────────────┘
//!      │        (while attempts < max)
//!      └──────── disconnect() (no reconnect)
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for connection configuration.
pub mod builder;

/// Connection handle and lifecycle types.
pub mod core;

/// Event loop task owning the connection state.
mod event_loop;

/// Reconnect policy.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{ConnectionBuilder, ENDPOINT_ENV_VAR};
pub use self::core::{ConnectionState, ConnectionStatus, OpenHandler, RealtimeConnection};
pub use options::ConnectionOptions;
