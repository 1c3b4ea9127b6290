//! Channel used when no device is attached

use super::{SerialChannel, TransportError};

/// A channel with nothing behind it.
///
/// Reads never produce data. Writes are logged and reported as successful.
#[derive(Debug, Default)]
pub struct OfflineChannel {
    bytes_written: u64,
}

impl OfflineChannel {
    /// Create a new offline channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl SerialChannel for OfflineChannel {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        Ok(None)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        tracing::info!(data = ?String::from_utf8_lossy(data), "Offline write");
        self.bytes_written += data.len() as u64;
        Ok(data.len())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "offline".to_string()
    }

    fn is_offline(&self) -> bool {
        true
    }
}
