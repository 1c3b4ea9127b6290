//! Serial port channel implementation

use super::{SerialChannel, TransportError};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::str::FromStr;
use std::time::Duration;

/// Flow control on the device line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialFlowControl {
    /// None
    #[default]
    None,
    /// RTS/CTS
    Hardware,
    /// XON/XOFF
    Software,
}

impl From<SerialFlowControl> for FlowControl {
    fn from(flow: SerialFlowControl) -> Self {
        match flow {
            SerialFlowControl::None => FlowControl::None,
            SerialFlowControl::Hardware => FlowControl::Hardware,
            SerialFlowControl::Software => FlowControl::Software,
        }
    }
}

/// Character framing in the usual `8N1` notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    /// Bits per character
    pub data_bits: DataBits,
    /// Parity bit
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
}

impl Default for Framing {
    fn default() -> Self {
        Self {
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl FromStr for Framing {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::ConfigError(format!("invalid framing {s:?}"));
        let bytes = s.trim().as_bytes();
        let &[data, parity, stop] = bytes else {
            return Err(invalid());
        };

        let data_bits = match data {
            b'5' => DataBits::Five,
            b'6' => DataBits::Six,
            b'7' => DataBits::Seven,
            b'8' => DataBits::Eight,
            _ => return Err(invalid()),
        };
        let parity = match parity.to_ascii_uppercase() {
            b'N' => Parity::None,
            b'O' => Parity::Odd,
            b'E' => Parity::Even,
            _ => return Err(invalid()),
        };
        let stop_bits = match stop {
            b'1' => StopBits::One,
            b'2' => StopBits::Two,
            _ => return Err(invalid()),
        };

        Ok(Self {
            data_bits,
            parity,
            stop_bits,
        })
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = match self.data_bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "{data}{parity}{stop}")
    }
}

impl Serialize for Framing {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Framing {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Device port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name (e.g., /dev/ttyACM0, COM3). Empty means not configured.
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Character framing
    pub framing: Framing,
    /// Flow control
    pub flow_control: SerialFlowControl,
}

impl SerialConfig {
    /// Settings for `port` at `baud_rate`, 8N1 without flow control
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            framing: Framing::default(),
            flow_control: SerialFlowControl::None,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(String::new(), 9600)
    }
}

fn open_error(port: &str, err: serialport::Error) -> TransportError {
    match err.kind() {
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(ErrorKind::NotFound) => {
            TransportError::PortNotFound(port.to_string())
        }
        serialport::ErrorKind::Io(ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied(port.to_string())
        }
        _ => TransportError::ConnectionFailed(format!("{port}: {err}")),
    }
}

/// Serial port channel.
///
/// The port is opened with a zero read timeout so every read is a poll.
pub struct SerialTransport {
    config: SerialConfig,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open the configured port
    pub fn open(config: SerialConfig) -> Result<Self, TransportError> {
        if config.port.is_empty() {
            return Err(TransportError::PortNotFound("<unset>".to_string()));
        }

        let Framing {
            data_bits,
            parity,
            stop_bits,
        } = config.framing;
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(config.flow_control.into())
            .timeout(Duration::ZERO)
            .open()
            .map_err(|e| open_error(&config.port, e))?;

        tracing::info!(
            port = %config.port,
            baud = config.baud_rate,
            framing = %config.framing,
            "Serial port opened"
        );

        Ok(Self { config, port })
    }
}

impl SerialChannel for SerialTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let mut byte = 0u8;
        match self.port.read(std::slice::from_mut(&mut byte)) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte)),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(data.len())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::IoError(e.into()))
    }

    fn describe(&self) -> String {
        format!(
            "{} @ {} baud {}",
            self.config.port, self.config.baud_rate, self.config.framing
        )
    }
}

/// Serial ports present on this machine
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}
