//! Classification of inbound firmware lines.
//!
//! The firmware talks in single text lines. Five shapes matter to the
//! host; everything else on the wire is boot chatter or line noise and is
//! dropped by the codec without becoming an error.

use rfbridge_core::PulseTrain;
use std::fmt;

/// One classified line from the firmware.
#[derive(Debug, Clone, PartialEq)]
pub enum FirmwareLine {
    /// Boot banner. Sent once after reset, gating the handshake.
    Ready,
    /// Command echo. The firmware repeats every command before acting on
    /// it, which is useful in debug logs but carries no result.
    Echo(String),
    /// Successful command result with an optional payload.
    Ok(Option<String>),
    /// Failed command result with an optional payload.
    Error(Option<String>),
    /// A received pulse train, reported while a receive pin is armed.
    Received(PulseTrain),
}

impl FirmwareLine {
    /// Classify a line, without its terminator.
    ///
    /// Returns `None` for anything that is not one of the five known
    /// shapes, including an `RF` line whose pulse list does not parse.
    /// Unclassified lines are noise, not protocol errors.
    #[must_use]
    pub fn parse(line: &str) -> Option<FirmwareLine> {
        if line == "ready" {
            return Some(FirmwareLine::Ready);
        }
        if let Some(text) = line.strip_prefix("ECHO ") {
            return Some(FirmwareLine::Echo(text.to_string()));
        }
        if let Some(rest) = line.strip_prefix("RES OK") {
            return Self::parse_payload(rest).map(FirmwareLine::Ok);
        }
        if let Some(rest) = line.strip_prefix("RES ERROR") {
            return Self::parse_payload(rest).map(FirmwareLine::Error);
        }
        if let Some(list) = line.strip_prefix("RF ") {
            return list.parse::<PulseTrain>().ok().map(FirmwareLine::Received);
        }
        None
    }

    /// The remainder of a `RES OK` / `RES ERROR` line: nothing, or a
    /// space followed by the payload. Any other shape is noise.
    fn parse_payload(rest: &str) -> Option<Option<String>> {
        if rest.is_empty() {
            Some(None)
        } else {
            rest.strip_prefix(' ').map(|payload| Some(payload.to_string()))
        }
    }

    /// Whether this line completes a pending command.
    #[must_use]
    pub fn is_result(&self) -> bool {
        matches!(self, FirmwareLine::Ok(_) | FirmwareLine::Error(_))
    }
}

impl fmt::Display for FirmwareLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareLine::Ready => write!(f, "ready"),
            FirmwareLine::Echo(text) => write!(f, "ECHO {text}"),
            FirmwareLine::Ok(None) => write!(f, "RES OK"),
            FirmwareLine::Ok(Some(payload)) => write!(f, "RES OK {payload}"),
            FirmwareLine::Error(None) => write!(f, "RES ERROR"),
            FirmwareLine::Error(Some(payload)) => write!(f, "RES ERROR {payload}"),
            FirmwareLine::Received(train) => write!(f, "RF {train}"),
        }
    }
}
