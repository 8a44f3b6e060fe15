//! Tokio codec for the firmware's line protocol.
//!
//! This module provides a Tokio-compatible codec pairing the two halves
//! of the serial conversation:
//! - [`Decoder`]: yields classified [`FirmwareLine`]s from the byte stream
//! - [`Encoder<Command>`]: renders commands with their line terminator
//!
//! # Noise handling
//!
//! Serial links are noisy: boot banners, voltage glitches and partial
//! transmissions all arrive as lines that match no protocol shape. The
//! decoder drops them with a debug log and a running counter instead of
//! erroring, because one garbage line must not tear down the session.
//! Inbound `\r\n` terminators are tolerated; outbound lines always end
//! in `\n`.
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use tokio_util::codec::Framed;
//! use rfbridge_protocol::{Command, LineCodec};
//!
//! # async fn example() -> rfbridge_protocol::Result<()> {
//! # let serial = tokio::io::empty();
//! let mut framed = Framed::new(serial, LineCodec::new());
//!
//! framed.send(Command::Reset).await?;
//! if let Some(line) = framed.next().await {
//!     println!("firmware said: {:?}", line?);
//! }
//! # Ok(())
//! # }
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::line::FirmwareLine;

/// Default maximum line length in bytes (8 KB).
///
/// A full-length `RF` report stays well under this. Anything longer is a
/// peer that is not speaking the protocol.
const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

/// Tokio codec for newline-delimited firmware traffic.
#[derive(Debug)]
pub struct LineCodec {
    /// Maximum bytes allowed to accumulate without a line terminator.
    max_line_length: usize,

    /// Lines received that matched no known shape.
    dropped_lines: u64,

    /// Inside an oversized line, discarding bytes until its terminator.
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default line length limit.
    pub fn new() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            dropped_lines: 0,
            discarding: false,
        }
    }

    /// Create a codec with a custom line length limit.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            dropped_lines: 0,
            discarding: false,
        }
    }

    /// The configured line length limit.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// How many unclassifiable lines have been dropped so far.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }

    /// Take one terminated line off the front of the buffer, without its
    /// terminator and with a trailing `\r` stripped.
    fn take_line(src: &mut BytesMut) -> Option<BytesMut> {
        let newline = src.iter().position(|&b| b == b'\n')?;
        let mut raw = src.split_to(newline + 1);
        raw.truncate(newline);
        if raw.last() == Some(&b'\r') {
            raw.truncate(raw.len() - 1);
        }
        Some(raw)
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = FirmwareLine;
    type Error = Error;

    /// Extract the next classified line.
    ///
    /// Consumes as many complete lines as needed, dropping noise, until a
    /// known shape or the end of the buffered data. A line that grows past
    /// the length limit without a terminator is discarded wholesale, up to
    /// and including its eventual terminator; parsing resynchronizes on
    /// the line after it.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FirmwareLine>> {
        loop {
            if self.discarding {
                let Some(newline) = src.iter().position(|&b| b == b'\n') else {
                    src.clear();
                    return Ok(None);
                };
                let _ = src.split_to(newline + 1);
                self.discarding = false;
                self.dropped_lines += 1;
                debug!(
                    dropped = self.dropped_lines,
                    "Oversized line ended; resuming normal parsing"
                );
                continue;
            }

            let Some(raw) = Self::take_line(src) else {
                if src.len() > self.max_line_length {
                    debug!(
                        limit = self.max_line_length,
                        "Line exceeds length limit; discarding until its terminator"
                    );
                    self.discarding = true;
                    continue;
                }
                return Ok(None);
            };

            match std::str::from_utf8(&raw).ok().and_then(FirmwareLine::parse) {
                Some(line) => return Ok(Some(line)),
                None => {
                    self.dropped_lines += 1;
                    debug!(
                        line = %String::from_utf8_lossy(&raw),
                        dropped = self.dropped_lines,
                        "Dropped unclassifiable line"
                    );
                }
            }
        }
    }

    /// On EOF a partial trailing line is noise, not an error. The link
    /// dying mid-line already surfaces as the stream ending.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<FirmwareLine>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                if !src.is_empty() || self.discarding {
                    self.dropped_lines += 1;
                    self.discarding = false;
                    debug!(bytes = src.len(), "Dropped unterminated tail at end of stream");
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Command> for LineCodec {
    type Error = Error;

    /// Render a command as its wire line.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedCommand` if the rendered form contains a
    /// line terminator, which would smuggle a second command.
    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        let line = item.to_string();
        if line.contains(['\r', '\n']) {
            return Err(Error::MalformedCommand { line });
        }
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
