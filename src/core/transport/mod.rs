//! Device channel layer
//!
//! Supports:
//! - Serial ports (RS-232, USB-Serial) polled without blocking
//! - Offline mode with no hardware attached
//! - Scripted in-memory devices for tests and benchmarks

mod offline;
pub mod scripted;
mod serial;

pub use offline::OfflineChannel;
pub use scripted::{ScriptedChannel, ScriptedHandle};
pub use serial::{list_ports, Framing, SerialConfig, SerialFlowControl, SerialTransport};

use thiserror::Error;

/// Channel error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid port settings
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A byte channel to one physical device.
///
/// Reads are polls: `read_byte` returns `Ok(None)` when nothing is pending
/// and must never wait for future bytes.
#[cfg_attr(test, mockall::automock)]
pub trait SerialChannel: Send {
    /// Poll a single byte
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Write data, returning the number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Drop input the driver has buffered but nobody has read yet
    fn discard_input(&mut self) -> Result<(), TransportError>;

    /// Human readable description of the channel
    fn describe(&self) -> String;

    /// Whether a real device sits behind this channel
    fn is_offline(&self) -> bool {
        false
    }
}
