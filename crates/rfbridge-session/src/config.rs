//! Session tuning knobs.

use std::time::Duration;

/// How long to wait for the firmware's handshake line after a reset.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a result line after issuing a command.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How many decoded events the broadcast channel buffers per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Timeouts and buffer depths for a [`Session`](crate::Session).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rfbridge_session::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_handshake_timeout(Duration::from_secs(10))
///     .with_response_timeout(Duration::from_millis(500));
///
/// assert_eq!(config.response_timeout, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for the handshake line during connect.
    pub handshake_timeout: Duration,

    /// Deadline for each command's result line.
    pub response_timeout: Duration,

    /// Broadcast buffer depth for decoded events. A subscriber that lags
    /// further than this behind the wire loses the oldest events.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Set the handshake deadline.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the per-command response deadline.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the event broadcast buffer depth.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
