//! Connection lifecycle states for a firmware session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The lifecycle state of one serial session.
///
/// A session starts in `Connecting` the moment it takes ownership of the
/// transport, reaches `Ready` once the firmware's handshake line arrives,
/// and ends in either `Disconnected` (orderly shutdown) or `Error` (the
/// transport died or the handshake never came). Both end states are
/// terminal: a failed session is abandoned and replaced by connecting a
/// fresh transport.
///
/// State changes are published through a `tokio::sync::watch` channel; see
/// [`Session::state_changes`](crate::Session::state_changes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport is attached.
    Disconnected,

    /// Transport attached, reset sent, waiting for the handshake line.
    Connecting,

    /// Handshake complete; commands are accepted.
    Ready,

    /// The transport failed or the handshake timed out.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Error => "error",
        };
        write!(f, "{}", state_str)
    }
}

impl ConnectionState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use rfbridge_session::ConnectionState;
    ///
    /// assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Ready));
    /// assert!(!ConnectionState::Disconnected.can_transition_to(ConnectionState::Ready));
    /// ```
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        matches!(
            (self, target),
            // From Disconnected
            (ConnectionState::Disconnected, ConnectionState::Connecting)
            // From Connecting
            | (
                ConnectionState::Connecting,
                ConnectionState::Ready | ConnectionState::Error | ConnectionState::Disconnected
            )
            // From Ready
            | (
                ConnectionState::Ready,
                ConnectionState::Error | ConnectionState::Disconnected
            )
        )
    }

    /// Whether this state ends the session.
    ///
    /// Terminal states never change again; waiting on the state watch for
    /// a terminal state is how [`Session::disconnect`](crate::Session::disconnect)
    /// knows the I/O task is gone.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Error
        )
    }
}
