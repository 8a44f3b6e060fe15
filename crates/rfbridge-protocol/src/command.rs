//! Host-to-firmware commands and their wire form.

use crate::error::Error;
use rfbridge_core::{Pin, PulseTrain};
use std::fmt;
use std::num::NonZeroU8;
use std::str::FromStr;

/// Which duty a GPIO pin is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    Receive,
    Transmit,
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinRole::Receive => write!(f, "receive"),
            PinRole::Transmit => write!(f, "transmit"),
        }
    }
}

impl FromStr for PinRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receive" => Ok(PinRole::Receive),
            "transmit" => Ok(PinRole::Transmit),
            other => Err(Error::MalformedCommand {
                line: other.to_string(),
            }),
        }
    }
}

/// One command the host can issue.
///
/// `Display` renders the exact wire form without the line terminator;
/// `FromStr` parses it back, which the firmware emulator relies on.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Reboot the firmware. Answered by a fresh `ready` banner instead of
    /// a result line.
    Reset,
    /// Liveness probe. The firmware answers `RES OK <token>`.
    Ping { token: String },
    /// Assign a pin to receiving or transmitting.
    SetPin { role: PinRole, pin: Pin },
    /// Transmit a pulse train, optionally repeated by the firmware.
    Send {
        train: PulseTrain,
        repeat: Option<NonZeroU8>,
    },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Reset => write!(f, "RESET"),
            Command::Ping { token } => write!(f, "PING {token}"),
            Command::SetPin { role, pin } => write!(f, "PIN {role} {pin}"),
            Command::Send { train, repeat: None } => write!(f, "SEND {train}"),
            Command::Send {
                train,
                repeat: Some(repeat),
            } => write!(f, "SEND {train} {repeat}"),
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedCommand {
            line: line.to_string(),
        };

        if line == "RESET" {
            return Ok(Command::Reset);
        }
        if let Some(token) = line.strip_prefix("PING ") {
            if token.is_empty() {
                return Err(malformed());
            }
            return Ok(Command::Ping {
                token: token.to_string(),
            });
        }
        if let Some(rest) = line.strip_prefix("PIN ") {
            let (role, pin) = rest.split_once(' ').ok_or_else(|| malformed())?;
            return Ok(Command::SetPin {
                role: role.parse()?,
                pin: pin.parse().map_err(|_| malformed())?,
            });
        }
        if let Some(rest) = line.strip_prefix("SEND ") {
            let (list, repeat) = match rest.split_once(' ') {
                Some((list, count)) => {
                    let repeat = count.parse::<NonZeroU8>().map_err(|_| malformed())?;
                    (list, Some(repeat))
                }
                None => (rest, None),
            };
            return Ok(Command::Send {
                train: list.parse().map_err(|_| malformed())?,
                repeat,
            });
        }
        Err(malformed())
    }
}
