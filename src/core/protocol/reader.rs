//! Terminator-delimited line reader over a polled byte channel

use super::TERMINATOR;
use crate::core::transport::{SerialChannel, TransportError};
use bytes::{BufMut, Bytes, BytesMut};

/// Longest line kept while waiting for a terminator
pub const MAX_LINE_LEN: usize = 4096;

/// Accumulates polled bytes into complete lines.
///
/// Bytes of an unfinished line are kept between calls, so a line that
/// arrives in pieces is returned exactly once, when its terminator shows up.
/// A line longer than [`MAX_LINE_LEN`] is dropped whole: everything up to and
/// including its terminator is skipped.
#[derive(Debug, Default)]
pub struct LineReader {
    pending: BytesMut,
    discarding: bool,
}

impl LineReader {
    /// Create an empty reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of the current unfinished line
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Whether the reader is skipping the rest of an overlong line
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Read one line, terminator included.
    ///
    /// Returns an empty buffer when the channel has nothing pending right now.
    pub fn read_line<C>(&mut self, channel: &mut C) -> Result<Bytes, TransportError>
    where
        C: SerialChannel + ?Sized,
    {
        while let Some(byte) = channel.read_byte()? {
            if self.discarding {
                if byte == TERMINATOR {
                    tracing::debug!("Overlong line skipped");
                    self.discarding = false;
                }
                continue;
            }
            self.pending.put_u8(byte);
            if byte == TERMINATOR {
                let line = self.pending.split().freeze();
                tracing::trace!(line = %hex::encode(&line), "Line received");
                return Ok(line);
            }
            if self.pending.len() > MAX_LINE_LEN {
                tracing::warn!(len = self.pending.len(), "Dropping unterminated line");
                self.pending.clear();
                self.discarding = true;
            }
        }
        Ok(Bytes::new())
    }

    /// Read every line of the current burst.
    ///
    /// After each line the channel's unread input is discarded. A channel
    /// failure aborts the burst and is returned as the error.
    pub fn read_lines<C>(&mut self, channel: &mut C) -> Result<Vec<String>, TransportError>
    where
        C: SerialChannel + ?Sized,
    {
        let mut lines = Vec::new();
        loop {
            let line = match self.read_line(channel) {
                Ok(line) => line,
                Err(e) => {
                    self.pending.clear();
                    return Err(e);
                }
            };
            if line.is_empty() {
                break;
            }
            if let Err(e) = channel.discard_input() {
                self.pending.clear();
                return Err(e);
            }
            lines.push(decode_line(&line));
        }
        Ok(lines)
    }
}

/// Decode a received line as text, without its terminator
pub fn decode_line(line: &[u8]) -> String {
    let body = line.strip_suffix(&[TERMINATOR]).unwrap_or(line);
    String::from_utf8_lossy(body).into_owned()
}
