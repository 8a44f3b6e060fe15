//! Session controller for a transceiver firmware link.
//!
//! One [`Session`] owns one serial transport through a background I/O
//! task. The task serializes command/response transactions, watches their
//! deadlines, decodes unsolicited RF reports through a shared
//! [`ProtocolRegistry`](rfbridge_pulse::ProtocolRegistry) and fans the
//! resulting events out to broadcast subscribers. Connection lifecycle is
//! published as [`ConnectionState`] through a watch channel.
//!
//! Connecting performs the firmware handshake; after that the session
//! accepts pin configuration, transmissions, pings and subscriptions
//! until it is disconnected or the transport dies.

pub mod config;
pub mod error;
pub mod session;
pub mod state;

pub use config::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT, SessionConfig,
};
pub use error::{Error, Result, TransactionError};
pub use session::Session;
pub use state::ConnectionState;
