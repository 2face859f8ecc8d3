//! relaybank Server
//!
//! REST API server exposing the relays of a UDIN serial board or a
//! DAEnetIP2 network controller as one-byte files `r1..rN`.
//!
//! Settings come from the TOML config file; command-line flags override
//! individual values. `--mock` runs against a simulated device.

mod api;
mod config;
mod hardware;
mod relay_files;
mod shutdown;

use anyhow::Result;
use api::AppState;
use clap::Parser;
use config::Overrides;
use relaybank_core::{default_config_path, DeviceKind};
use relay_files::RelayFiles;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// relaybank API Server
#[derive(Parser, Debug)]
#[command(name = "relaybankd")]
#[command(version, about = "Relay controller API server", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging, including every line and datagram on the wire
    #[arg(short, long)]
    verbose: bool,

    /// Enable mock mode (run without hardware for testing/development)
    #[arg(long)]
    mock: bool,

    /// Device family (udin, daenet)
    #[arg(short, long)]
    kind: Option<DeviceKind>,

    /// Serial device path for UDIN (e.g. /dev/ttyUSB0), or agent host[:port] for DAEnetIP2
    #[arg(short = 'D', long)]
    device: Option<String>,

    /// SNMP community string (DAEnetIP2 only)
    #[arg(long)]
    community: Option<String>,

    /// Number of relays to expose (DAEnetIP2 only, at most 16)
    #[arg(short, long)]
    relays: Option<usize>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            kind: self.kind,
            device: self.device.clone(),
            community: self.community.clone(),
            relays: self.relays,
            bind: self.bind.clone(),
            port: self.port,
            debug_wire: self.verbose,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.verbose);

    info!("relaybank server starting...");

    // Determine config path: CLI flag > env var > default
    let config_path = args.config.clone().unwrap_or_else(|| {
        std::env::var("RELAYBANK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let mut static_config = config::load_static_config(&config_path).await?;
    args.overrides().apply(&mut static_config);
    config::log_config(&static_config);

    let bind_addr = format!(
        "{}:{}",
        static_config.server.bind, static_config.server.port
    );

    let bank = match hardware::connection::connect_device(&static_config, args.mock).await {
        Ok(bank) => bank,
        Err(e) => {
            error!(
                "Device connection failed: {}. Use --mock for testing without hardware.",
                e
            );
            std::process::exit(1);
        }
    };

    if bank.relay_count() == 0 {
        warn!("No relays available; POST /api/v0/device/reinitialize to retry");
    } else {
        info!("{} with {} relays", bank.model(), bank.relay_count());
    }

    let bank_for_shutdown = bank.clone();
    let app_state = AppState::new(RelayFiles::new(bank), args.mock);

    // Set up API router
    let app = api::create_router(app_state);

    // Start server
    info!("Starting server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("relaybank API Server listening on {}", bind_addr);
    info!("Server ready!");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown::close_device(&bank_for_shutdown).await;
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_to_overrides() {
        let args = Args::parse_from([
            "relaybankd",
            "--kind",
            "daenet",
            "-D",
            "10.0.0.7",
            "--community",
            "secret",
            "-r",
            "8",
            "-p",
            "9000",
        ]);
        let overrides = args.overrides();

        assert_eq!(overrides.kind, Some(DeviceKind::Daenet));
        assert_eq!(overrides.device.as_deref(), Some("10.0.0.7"));
        assert_eq!(overrides.community.as_deref(), Some("secret"));
        assert_eq!(overrides.relays, Some(8));
        assert_eq!(overrides.port, Some(9000));
        assert!(!overrides.debug_wire);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Args::try_parse_from(["relaybankd", "--kind", "modbus"]).is_err());
    }
}
