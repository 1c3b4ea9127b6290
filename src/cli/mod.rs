//! CLI Module
//!
//! Provides command-line support code:
//! - Exit codes for supervisors and scripts

pub mod exit_codes;

pub use exit_codes::{exit_code_description, print_exit_codes, ExitCodes};
