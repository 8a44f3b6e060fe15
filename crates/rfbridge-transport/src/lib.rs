//! Byte transports for talking to the transceiver firmware.
//!
//! The session layer is generic over anything that reads and writes
//! bytes; this crate supplies the two implementations that matter:
//! a real serial port ([`serial::open`]) and an in-memory pair
//! ([`MockSerial`]) for tests and development without hardware.

pub mod error;
pub mod mock;
pub mod serial;

pub use error::{Error, Result};
pub use mock::{MockSerial, MockSerialHandle};

use tokio::io::{AsyncRead, AsyncWrite};

/// Anything that can carry the firmware's byte stream.
///
/// Blanket-implemented, so a `SerialStream`, a mock pair or one half of
/// a `tokio::io::duplex` all qualify without ceremony.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
