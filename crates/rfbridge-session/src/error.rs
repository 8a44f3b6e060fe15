use std::time::Duration;

use rfbridge_core::Pin;
use rfbridge_protocol::PinRole;
use thiserror::Error;

use crate::state::ConnectionState;

/// Why a single command/response exchange failed.
///
/// Carried as the `source` of the operation-level variants on [`Error`].
/// `Timeout` and `Rejected` leave the session usable; `Cancelled` and
/// `Disconnected` mean the session is going or gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// No result line arrived before the deadline.
    #[error("no response within {timeout:?}")]
    Timeout { timeout: Duration },

    /// The firmware answered with an error result.
    #[error("firmware rejected the command: {}", payload.as_deref().unwrap_or("no detail"))]
    Rejected { payload: Option<String> },

    /// The session was disconnected while the command was in flight.
    #[error("command abandoned before a response arrived")]
    Cancelled,

    /// The serial link died while the command was in flight.
    #[error("serial link lost before a response arrived")]
    Disconnected,
}

/// Errors surfaced by [`Session`](crate::Session) operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The firmware never sent its handshake line during connect.
    #[error("no handshake within {timeout:?}")]
    HandshakeTimeout { timeout: Duration },

    /// The operation requires the session to be in the ready state.
    #[error("session is {state}, not ready")]
    NotReady { state: ConnectionState },

    /// A pin-configuration command failed.
    #[error("failed to configure {role} pin {pin}")]
    ConfigurationFailed {
        role: PinRole,
        pin: Pin,
        #[source]
        source: TransactionError,
    },

    /// A transmit command failed. `repetition` counts from 1.
    #[error("failed to transmit '{protocol}' on repetition {repetition}")]
    TransmitFailed {
        protocol: String,
        repetition: u8,
        #[source]
        source: TransactionError,
    },

    /// A ping command failed outright. A ping that completes but echoes
    /// the wrong token is not an error; it reports as `Ok(false)`.
    #[error("ping failed")]
    PingFailed {
        #[source]
        source: TransactionError,
    },

    /// The field values could not be encoded for the named protocol.
    #[error("encode failed: {0}")]
    Encode(#[from] rfbridge_pulse::Error),

    /// A transaction failed outside any more specific operation.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

pub type Result<T> = std::result::Result<T, Error>;
