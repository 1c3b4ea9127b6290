//! CLI Exit Codes
//!
//! Exit codes reported to whatever supervises the bridge process.

use crate::config::ConfigError;
use crate::core::bus::BusError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;

    /// Bus unreachable or lost
    pub const BUS_ERROR: u8 = 18;

    /// Exit code for a device channel failure
    pub fn for_transport(err: &TransportError) -> u8 {
        match err {
            TransportError::PortNotFound(_) => Self::PORT_NOT_FOUND,
            TransportError::PermissionDenied(_) => Self::PERMISSION_DENIED,
            TransportError::ConfigError(_) => Self::CONFIG_ERROR,
            TransportError::ConnectionFailed(_) | TransportError::IoError(_) => {
                Self::CONNECTION_FAILED
            }
        }
    }

    /// Exit code for a bus failure
    pub fn for_bus(_err: &BusError) -> u8 {
        Self::BUS_ERROR
    }

    /// Exit code for a configuration failure
    pub fn for_config(_err: &ConfigError) -> u8 {
        Self::CONFIG_ERROR
    }

    /// Convert to a process exit code
    pub fn exit(code: u8) -> ExitCode {
        ExitCode::from(code)
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        7 => "Permission denied",
        8 => "Configuration error",
        14 => "Port not found",
        18 => "Bus error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 7, 8, 14, 18] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}
