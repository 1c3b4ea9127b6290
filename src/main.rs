//! Linebridge - serial device to message bus bridge
//!
//! Runs one bridge per device, or the TCP relay the bridges share.

use anyhow::Context;
use clap::{Parser, Subcommand};
use linebridge_core::cli::{print_exit_codes, ExitCodes};
use linebridge_core::config::BridgeConfig;
use linebridge_core::core::transport::list_ports;
use linebridge_core::utils::logging::{self, LogGuard};
use linebridge_core::{
    Bridge, BusRelay, DeviceLink, OfflineChannel, SerialChannel, SerialTransport, TcpBus,
    Telemetry, TracingTelemetry,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Linebridge CLI
#[derive(Parser, Debug)]
#[command(
    name = "linebridge",
    version,
    about = "Bridge a line-oriented serial device onto a publish/subscribe bus",
    long_about = None
)]
struct Cli {
    /// Debug level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON log lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bridge a device onto the bus
    Run {
        /// Serial port name (e.g., /dev/ttyACM0, COM3)
        #[arg(short, long, env = "SERIAL_PORT")]
        port: Option<String>,

        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Bus relay address (host:port)
        #[arg(long, env = "BUS_ADDR")]
        bus: Option<String>,

        /// Run without a device, announcing the offline identity.
        /// Any `DEBUG` value other than a false-like one enables it.
        #[arg(long, env = "DEBUG", value_parser = clap::builder::FalseyValueParser::new())]
        offline: bool,
    },

    /// Run the bus relay
    Relay {
        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:7878")]
        listen: String,
    },

    /// List available serial ports
    ListPorts,

    /// Show exit code table
    ExitCodes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCodes::exit(ExitCodes::INVALID_ARGS)
            } else {
                ExitCodes::exit(ExitCodes::SUCCESS)
            };
        }
    };

    let mut config = match BridgeConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCodes::exit(ExitCodes::for_config(&e));
        }
    };
    if cli.json_logs {
        config.logging.json = true;
    }

    let _guard: LogGuard = match logging::init(&config.logging, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCodes::exit(ExitCodes::ERROR);
        }
    };

    let code = match execute(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Fatal error");
            ExitCodes::ERROR
        }
    };
    ExitCodes::exit(code)
}

async fn execute(command: Commands, mut config: BridgeConfig) -> anyhow::Result<u8> {
    match command {
        Commands::Run {
            port,
            baud,
            bus,
            offline,
        } => {
            if let Some(port) = port {
                config.serial.port = port;
            }
            if let Some(baud) = baud {
                config.serial.baud_rate = baud;
            }
            if let Some(bus) = bus {
                config.bus.address = bus;
            }
            config.offline |= offline;
            run_bridge(config).await
        }
        Commands::Relay { listen } => run_relay(&listen).await,
        Commands::ListPorts => {
            let ports = list_ports()?;
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            for port in &ports {
                println!("{} [{:?}]", port.port_name, port.port_type);
            }
            Ok(ExitCodes::SUCCESS)
        }
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(ExitCodes::SUCCESS)
        }
    }
}

async fn run_bridge(config: BridgeConfig) -> anyhow::Result<u8> {
    let settings = match config.bridge_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Ok(ExitCodes::for_config(&e));
        }
    };
    let telemetry: Arc<dyn Telemetry> = Arc::new(TracingTelemetry);

    let channel: Box<dyn SerialChannel> = if config.offline {
        tracing::info!("Offline mode, no device attached");
        Box::new(OfflineChannel::new())
    } else {
        match SerialTransport::open(config.serial.clone()) {
            Ok(port) => Box::new(port),
            Err(e) => {
                tracing::error!(port = %config.serial.port, error = %e, "Could not open serial port");
                telemetry.notice_error("serial_open", &e);
                return Ok(ExitCodes::for_transport(&e));
            }
        }
    };

    let bus = match TcpBus::connect(&config.bus.address, config.bus.connect_timeout()).await {
        Ok(bus) => bus,
        Err(e) => {
            tracing::error!(address = %config.bus.address, error = %e, "Could not reach bus");
            telemetry.notice_error("bus_connect", &e);
            return Ok(ExitCodes::for_bus(&e));
        }
    };

    let cancel = install_ctrlc()?;
    let mut rng = StdRng::from_entropy();
    let mut bridge = Bridge::start(
        DeviceLink::new(channel),
        bus,
        Arc::clone(&telemetry),
        &settings,
        &mut rng,
    )
    .await;

    let result = bridge.run(cancel).await;
    let stats = bridge.stats();
    tracing::info!(
        received = stats.received,
        forwarded = stats.forwarded,
        malformed = stats.malformed,
        read_failures = stats.read_failures,
        write_failures = stats.write_failures,
        "Bridge stopped"
    );

    match result {
        Ok(()) => Ok(ExitCodes::SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "Bus connection lost");
            telemetry.notice_error("bus_receive", &e);
            Ok(ExitCodes::for_bus(&e))
        }
    }
}

async fn run_relay(listen: &str) -> anyhow::Result<u8> {
    let relay = match BusRelay::bind(listen).await {
        Ok(relay) => relay,
        Err(e) => {
            tracing::error!(address = listen, error = %e, "Could not bind relay");
            return Ok(ExitCodes::for_bus(&e));
        }
    };
    let cancel = install_ctrlc()?;
    relay.run(cancel).await;
    Ok(ExitCodes::SUCCESS)
}

fn install_ctrlc() -> anyhow::Result<CancellationToken> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, shutting down");
        token.cancel();
    })
    .context("failed to install Ctrl+C handler")?;
    Ok(cancel)
}
