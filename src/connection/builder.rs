//! Builder pattern for connection configuration.
//!
//! # Example
//!
//! ```no_run
//! use screener_stream::{RealtimeConnection, Request};
//!
//! # async fn example() -> screener_stream::Result<()> {
//! let connection = RealtimeConnection::builder()
//!     .url("ws://127.0.0.1:8080/ws")
//!     .max_reconnect_attempts(8)
//!     .on_open(|| Some(Request::auth(None)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Request;
use crate::transport::{Connector, WebSocketConnector};

use super::core::{OpenHandler, RealtimeConnection};
use super::options::ConnectionOptions;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable read by [`ConnectionBuilder::from_env`].
pub const ENDPOINT_ENV_VAR: &str = "SCREENER_WS_URL";

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`RealtimeConnection`].
///
/// Use [`RealtimeConnection::builder()`] to create a new builder.
#[derive(Default)]
pub struct ConnectionBuilder {
    /// Endpoint URL, validated on build.
    url: Option<String>,
    /// Reconnect policy.
    options: ConnectionOptions,
    /// Transport factory; WebSocket when unset.
    connector: Option<Arc<dyn Connector>>,
    /// Handshake hook.
    on_open: Option<OpenHandler>,
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("custom_connector", &self.connector.is_some())
            .field("on_open", &self.on_open.is_some())
            .finish()
    }
}

// ============================================================================
// ConnectionBuilder Implementation
// ============================================================================

impl ConnectionBuilder {
    /// Creates a builder with no endpoint and the default policy.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder whose endpoint is read from [`ENDPOINT_ENV_VAR`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the variable is unset or not unicode.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(ENDPOINT_ENV_VAR)
            .map_err(|e| Error::config(format!("{ENDPOINT_ENV_VAR}: {e}")))?;
        Ok(Self::new().url(url))
    }

    /// Sets the endpoint URL (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replaces the whole reconnect policy.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the number of automatic reconnect attempts.
    #[inline]
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.options = self.options.with_max_reconnect_attempts(attempts);
        self
    }

    /// Sets the delay before the first reconnect attempt.
    #[inline]
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.options = self.options.with_base_delay(delay);
        self
    }

    /// Uses a custom transport factory.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets the hook run after every successful open.
    ///
    /// A returned request is transmitted before queued requests.
    #[inline]
    #[must_use]
    pub fn on_open<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Option<Request> + Send + Sync + 'static,
    {
        self.on_open = Some(Box::new(hook));
        self
    }

    /// Validates the configuration and spawns the connection event loop.
    ///
    /// The connection starts disconnected.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no URL is set, the policy is invalid, or no
    ///   tokio runtime is running
    /// - [`Error::InvalidUrl`] if the URL does not parse or is not `ws`/`wss`
    pub fn build(self) -> Result<RealtimeConnection> {
        let url = self.validate_url()?;
        self.options.validate()?;

        if Handle::try_current().is_err() {
            return Err(Error::config(
                "a tokio runtime is required to build a connection",
            ));
        }

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector));

        Ok(RealtimeConnection::spawn(
            url,
            self.options,
            connector,
            self.on_open,
        ))
    }

    fn validate_url(&self) -> Result<Url> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| Error::config("endpoint URL not set"))?;

        let url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e.to_string()))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::invalid_url(
                raw,
                format!("scheme must be ws or wss, got {other}"),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryConnector;

    #[test]
    fn test_missing_url() {
        let err = ConnectionBuilder::new().validate_url().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_invalid_url() {
        let err = ConnectionBuilder::new()
            .url("not a url")
            .validate_url()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_rejects_http_scheme() {
        let err = ConnectionBuilder::new()
            .url("https://example.com/ws")
            .validate_url()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { ref reason, .. } if reason.contains("https")));
    }

    #[test]
    fn test_accepts_ws_and_wss() {
        for raw in ["ws://127.0.0.1:9000/ws", "wss://example.com/stream"] {
            let url = ConnectionBuilder::new().url(raw).validate_url().expect("valid");
            assert_eq!(url.as_str(), raw);
        }
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let err = ConnectionBuilder::new()
            .url("ws://127.0.0.1:9000/ws")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { ref message } if message.contains("tokio")));
    }

    #[test]
    fn test_build_rejects_bad_policy() {
        let err = ConnectionBuilder::new()
            .url("ws://127.0.0.1:9000/ws")
            .options(ConnectionOptions::new().with_backoff_factor(0.0))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_policy_setters() {
        let builder = ConnectionBuilder::new()
            .max_reconnect_attempts(9)
            .base_delay(Duration::from_millis(50));
        assert_eq!(builder.options.max_reconnect_attempts, 9);
        assert_eq!(builder.options.base_delay, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_build_starts_disconnected() {
        let connection = ConnectionBuilder::new()
            .url("ws://127.0.0.1:9000/ws")
            .connector(MemoryConnector::new())
            .build()
            .expect("build");

        assert_eq!(connection.url().as_str(), "ws://127.0.0.1:9000/ws");
        assert!(!connection.is_open());
        connection.shutdown();
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let builder = ConnectionBuilder::new().on_open(|| None);
        let debug = format!("{builder:?}");
        assert!(debug.contains("on_open: true"));
    }
}
