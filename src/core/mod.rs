//! Core module containing the bridge functionality
//!
//! This module provides:
//! - Device channels (serial port, offline, scripted)
//! - Serial line protocol (line reader, command writer)
//! - Bus identity and its startup negotiation
//! - Publish/subscribe bus seam with in-process, TCP client and relay implementations
//! - Command classification and the dispatch loop
//! - Telemetry side channel

pub mod bridge;
pub mod bus;
pub mod command;
pub mod dispatch;
pub mod identity;
pub mod negotiate;
pub mod protocol;
pub mod telemetry;
pub mod transport;
