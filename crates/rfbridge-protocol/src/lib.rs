//! Wire protocol spoken over the serial link to the transceiver firmware.
//!
//! The protocol is plain text, one command or report per line. This crate
//! holds the three pieces the rest of the workspace builds on:
//!
//! - [`Command`]: host-to-firmware commands and their exact wire form
//! - [`FirmwareLine`]: classification of every line the firmware sends
//! - [`LineCodec`]: a Tokio codec gluing both to a `Framed` transport
//!
//! No timing, retries or session state here; that lives in the session
//! layer. This crate only answers "what do these bytes mean".

pub mod codec;
pub mod command;
pub mod error;
pub mod line;

pub use codec::LineCodec;
pub use command::{Command, PinRole};
pub use error::{Error, Result};
pub use line::FirmwareLine;
