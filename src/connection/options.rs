//! Reconnect policy configuration.
//!
//! After an unexpected close the connection retries up to
//! `max_reconnect_attempts` times, waiting
//! `base_delay * backoff_factor^(attempt - 1)` before each attempt.
//! With the defaults that is roughly 1000, 1500, 2250, 3375 and 5062 ms.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use screener_stream::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_max_reconnect_attempts(10)
//!     .with_base_delay(Duration::from_millis(250));
//!
//! assert_eq!(options.reconnect_delay(3), Duration::from_micros(562_500));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of automatic reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default growth factor between consecutive reconnect delays.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.5;

/// Upper bound on any single reconnect delay.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(3600);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Reconnect policy of a [`RealtimeConnection`](super::RealtimeConnection).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionOptions {
    /// Automatic reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,

    /// Growth factor between consecutive delays.
    pub backoff_factor: f64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with the default policy.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }

    /// Creates options that never reconnect automatically.
    #[inline]
    #[must_use]
    pub const fn no_reconnect() -> Self {
        Self {
            max_reconnect_attempts: 0,
            base_delay: DEFAULT_BASE_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the number of automatic reconnect attempts.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the delay before the first reconnect attempt.
    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the growth factor between consecutive delays.
    #[inline]
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }
}

// ============================================================================
// Policy
// ============================================================================

impl ConnectionOptions {
    /// Returns the delay before reconnect attempt number `attempt` (1-based).
    ///
    /// Capped at one hour.
    #[must_use]
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);

        Duration::try_from_secs_f64(secs)
            .map_or(MAX_RECONNECT_DELAY, |delay| delay.min(MAX_RECONNECT_DELAY))
    }

    /// Checks that the policy is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the backoff factor is not a finite
    /// number of at least 1.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::config(format!(
                "backoff factor must be a finite number >= 1, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();
        assert_eq!(options.max_reconnect_attempts, 5);
        assert_eq!(options.base_delay, Duration::from_millis(1000));
        assert_eq!(options.backoff_factor, 1.5);
        assert_eq!(options, ConnectionOptions::new());
    }

    #[test]
    fn test_default_delay_schedule() {
        let options = ConnectionOptions::new();
        let delays: Vec<u128> = (1..=5)
            .map(|attempt| options.reconnect_delay(attempt).as_micros())
            .collect();

        assert_eq!(
            delays,
            vec![1_000_000, 1_500_000, 2_250_000, 3_375_000, 5_062_500]
        );
    }

    #[test]
    fn test_attempt_zero_uses_base_delay() {
        let options = ConnectionOptions::new();
        assert_eq!(options.reconnect_delay(0), options.base_delay);
    }

    #[test]
    fn test_delay_is_capped() {
        let options = ConnectionOptions::new().with_max_reconnect_attempts(u32::MAX);
        assert_eq!(options.reconnect_delay(10_000), MAX_RECONNECT_DELAY);
        assert_eq!(options.reconnect_delay(u32::MAX), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn test_builder_methods() {
        let options = ConnectionOptions::new()
            .with_max_reconnect_attempts(2)
            .with_base_delay(Duration::from_millis(100))
            .with_backoff_factor(2.0);

        assert_eq!(options.reconnect_delay(1), Duration::from_millis(100));
        assert_eq!(options.reconnect_delay(2), Duration::from_millis(200));
        assert_eq!(options.reconnect_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_no_reconnect() {
        assert_eq!(ConnectionOptions::no_reconnect().max_reconnect_attempts, 0);
    }

    #[test]
    fn test_validate() {
        assert!(ConnectionOptions::new().validate().is_ok());
        assert!(ConnectionOptions::new().with_backoff_factor(1.0).validate().is_ok());
        assert!(ConnectionOptions::new().with_backoff_factor(0.5).validate().is_err());
        assert!(ConnectionOptions::new().with_backoff_factor(f64::NAN).validate().is_err());
        assert!(ConnectionOptions::new().with_backoff_factor(f64::INFINITY).validate().is_err());
    }
}
