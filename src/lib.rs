//! # Linebridge Core Library
//!
//! Bridges one line-oriented serial device onto a shared publish/subscribe
//! message bus. Every bridge on the bus has a unique identity; it answers
//! only commands addressed to that identity and writes them to its device.
//!
//! ## Features
//!
//! - Non-blocking serial polling with a carriage-return line protocol
//! - Identity negotiation with the device at startup
//! - Offline mode with a fixed identity and no hardware
//! - In-process, TCP client and TCP relay bus implementations
//! - Telemetry events and metrics through `tracing`
//! - CLI with exit codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use linebridge_core::{Bridge, BridgeSettings, DeviceLink, OfflineChannel, TcpBus, TracingTelemetry};
//! use rand::SeedableRng;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let link = DeviceLink::new(Box::new(OfflineChannel::new()));
//!     let bus = TcpBus::connect("127.0.0.1:7878", Duration::from_secs(5)).await?;
//!     let mut rng = rand::rngs::StdRng::from_entropy();
//!
//!     let mut bridge = Bridge::start(
//!         link,
//!         bus,
//!         Arc::new(TracingTelemetry),
//!         &BridgeSettings::default(),
//!         &mut rng,
//!     )
//!     .await;
//!
//!     bridge.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod utils;

// Re-exports for convenience
pub use crate::cli::ExitCodes;
pub use crate::config::BridgeConfig;
pub use crate::core::bridge::{Bridge, BridgeSettings, BridgeStats};
pub use crate::core::bus::{BusError, BusMessage, BusRelay, LocalBus, MessageBus, TcpBus};
pub use crate::core::command::CommandKind;
pub use crate::core::dispatch::DispatchOutcome;
pub use crate::core::identity::Identity;
pub use crate::core::negotiate::{IdentityNegotiator, NegotiationState};
pub use crate::core::protocol::{DeviceLink, LineReader};
pub use crate::core::telemetry::{MemoryTelemetry, Telemetry, TelemetryEvent, TracingTelemetry};
pub use crate::core::transport::{
    OfflineChannel, ScriptedChannel, SerialChannel, SerialConfig, SerialTransport, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
