//! Newline-delimited payload codec shared by the TCP client and the relay

use super::BusError;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Longest accepted bus payload
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

/// Line codec that skips oversized payloads instead of failing the stream.
///
/// `Framed` ends the stream after any decode error, so an oversized line is
/// dropped here and decoding resumes after its newline.
#[derive(Debug)]
pub struct PayloadCodec {
    inner: LinesCodec,
    skipped: u64,
}

impl PayloadCodec {
    /// Codec with the [`MAX_PAYLOAD_LEN`] limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_PAYLOAD_LEN)
    }

    /// Codec with a custom payload limit
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            skipped: 0,
        }
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn codec_error(err: LinesCodecError) -> BusError {
    match err {
        LinesCodecError::Io(e) => BusError::IoError(e),
        other => BusError::Codec(other.to_string()),
    }
}

impl Decoder for PayloadCodec {
    type Item = String;
    type Error = BusError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, BusError> {
        loop {
            match self.inner.decode(buf) {
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    self.skipped += 1;
                    tracing::warn!(skipped = self.skipped, "Dropping oversized bus payload");
                }
                other => return other.map_err(codec_error),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, BusError> {
        loop {
            match self.inner.decode_eof(buf) {
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    self.skipped += 1;
                    tracing::warn!(skipped = self.skipped, "Dropping oversized bus payload");
                }
                other => return other.map_err(codec_error),
            }
        }
    }
}

impl Encoder<String> for PayloadCodec {
    type Error = BusError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), BusError> {
        self.inner.encode(line, buf).map_err(codec_error)
    }
}
