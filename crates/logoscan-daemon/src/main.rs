//! logoscan Daemon - Main entry point
//!
//! Runs LOGO! discovery on every attached subnet, either once or in the
//! background until interrupted.

mod config;

use anyhow::Result;
use clap::Parser;
use logoscan_core::DiscoveredDevice;
use logoscan_discovery::{DiscoveryEvent, DiscoveryService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "logoscan")]
#[command(about = "Discover LOGO! controllers on locally attached networks")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "logoscan.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Keep scanning in the background until Ctrl-C
    #[arg(long)]
    watch: bool,

    /// Print discovered devices as JSON
    #[arg(long)]
    json: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("logoscan v{}", env!("CARGO_PKG_VERSION"));

    if args.write_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let config = config::load_config(&args.config)?;

    let service = Arc::new(DiscoveryService::new(config.discovery));

    let discovery = service.config();
    info!(
        port = discovery.port,
        workers = discovery.workers(),
        connect_timeout_ms = discovery.connect_timeout_ms,
        "Configuration loaded"
    );

    if args.watch {
        watch(service, args.json).await
    } else {
        scan_once(service, args.json).await
    }
}

/// Run a single scan and print what it found
async fn scan_once(service: Arc<DiscoveryService>, json: bool) -> Result<()> {
    let mut rx = service.subscribe();
    let collector = tokio::spawn(async move {
        let mut devices = Vec::new();
        loop {
            match rx.recv().await {
                Ok(DiscoveryEvent::DeviceDiscovered(device)) => devices.push(device),
                Ok(DiscoveryEvent::ScanCompleted { .. }) | Err(RecvError::Closed) => break,
                Ok(DiscoveryEvent::ScanStarted) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed discovery events");
                }
            }
        }
        devices
    });

    let summary = service.start_scan().await;
    let mut devices = collector.await?;
    devices.sort_by_key(|d| d.address);

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        println!(
            "Discovered {} devices ({} addresses probed):",
            devices.len(),
            summary.candidates
        );
        for device in &devices {
            print_device(device);
        }
    }

    Ok(())
}

/// Scan in the background and print devices as they are found
async fn watch(service: Arc<DiscoveryService>, json: bool) -> Result<()> {
    let mut rx = service.subscribe();
    service.start_background_discovery();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(DiscoveryEvent::DeviceDiscovered(device)) => {
                    if json {
                        println!("{}", serde_json::to_string(&device)?);
                    } else {
                        print_device(&device);
                    }
                }
                Ok(DiscoveryEvent::ScanCompleted { candidates, found }) => {
                    info!(candidates, found, "Background scan finished");
                }
                Ok(DiscoveryEvent::ScanStarted) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed discovery events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    service.stop_background_discovery().await;
    Ok(())
}

fn print_device(device: &DiscoveredDevice) {
    println!("  - {} ({}) at {}:{}", device.name, device.id, device.address, device.port);
}
