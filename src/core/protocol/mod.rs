//! Serial line protocol
//!
//! ASCII text, one carriage return per line in both directions:
//!
//! | Frame | Direction | Meaning |
//! |---|---|---|
//! | `Name,?` | send | query stored identity |
//! | `?Name,<value>` | receive | identity response (value may be empty) |
//! | `Name,<value>` | send | persist identity on device |
//! | `Find,<value>` | send | trigger locate indicator |
//! | `D,<amount>` | send | dispense `amount` units |
//! | `Read...` | send | request buffered telemetry lines |

pub mod reader;
pub mod writer;

pub use reader::{decode_line, LineReader};
pub use writer::{frame_command, write_command};

use crate::core::transport::{SerialChannel, TransportError};

/// Line terminator
pub const TERMINATOR: u8 = b'\r';

/// Query for the identity stored on the device
pub const NAME_QUERY: &str = "Name,?";

/// Prefix of the device's identity response
pub const NAME_RESPONSE_PREFIX: &str = "?Name,";

/// Command persisting `name` on the device
pub fn name_command(name: &str) -> String {
    format!("Name,{name}")
}

/// Device-facing side of a bridge: one channel plus its line reader
pub struct DeviceLink {
    channel: Box<dyn SerialChannel>,
    reader: LineReader,
}

impl DeviceLink {
    /// Wrap a channel
    pub fn new(channel: Box<dyn SerialChannel>) -> Self {
        Self {
            channel,
            reader: LineReader::new(),
        }
    }

    /// Read the lines of the current burst
    pub fn read_lines(&mut self) -> Result<Vec<String>, TransportError> {
        self.reader.read_lines(self.channel.as_mut())
    }

    /// Send one command
    pub fn send_command(&mut self, command: &str) -> Result<usize, TransportError> {
        write_command(self.channel.as_mut(), command)
    }

    /// Whether the link runs without a device
    pub fn is_offline(&self) -> bool {
        self.channel.is_offline()
    }

    /// Description of the underlying channel
    pub fn describe(&self) -> String {
        self.channel.describe()
    }
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("channel", &self.channel.describe())
            .field("pending", &self.reader.pending().len())
            .finish()
    }
}
