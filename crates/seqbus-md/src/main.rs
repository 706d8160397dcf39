// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! seqbus-md - market-data ingester.
//!
//! Subscribes to an HTTP/SSE top-of-book stream and republishes each
//! tick as a `TopOfBookCommand` on the command group, targeted at the
//! broadcast instance by default.
//!
//! # Usage
//!
//! ```bash
//! # Feed endpoint from MD_SOURCE_HOST / MD_SOURCE_PORT / MD_SOURCE_PATH
//! seqbus-md
//!
//! # Explicit endpoint
//! seqbus-md --host 127.0.0.1 --port 8000 --path /stream/AAPL
//! ```

mod feed;
mod sse;

use anyhow::{Context, Result};
use clap::Parser;
use seqbus::config::{load_dotenv, BusConfig, MULTICAST_TTL};
use seqbus::identity::InstanceRegistry;
use seqbus::transport::{DatagramSender, McastSender};
use seqbus::wire::WireMessage;
use sse::{SseEndpoint, SseSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "seqbus-md")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SSE market-data feed for the seqbus multicast bus")]
struct Cli {
    /// Environment file to load before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Feed host (falls back to MD_SOURCE_HOST, then 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Feed port (falls back to MD_SOURCE_PORT, then 8000)
    #[arg(long)]
    port: Option<u16>,

    /// Feed path (falls back to MD_SOURCE_PATH, then /stream/AAPL)
    #[arg(long)]
    path: Option<String>,

    /// Target instance for published commands (0 = broadcast)
    #[arg(long, default_value = "0")]
    target: u64,

    /// Verbose mode (show internal logs)
    #[arg(short, long)]
    verbose: bool,
}

fn endpoint_from(cli: &Cli) -> Result<SseEndpoint> {
    let host = match &cli.host {
        Some(host) => host.clone(),
        None => std::env::var("MD_SOURCE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
    };
    let port = match cli.port {
        Some(port) => port,
        None => match std::env::var("MD_SOURCE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("MD_SOURCE_PORT: '{}' is not a port number", value))?,
            Err(_) => 8000,
        },
    };
    let path = match &cli.path {
        Some(path) => path.clone(),
        None => std::env::var("MD_SOURCE_PATH").unwrap_or_else(|_| "/stream/AAPL".to_string()),
    };
    Ok(SseEndpoint { host, port, path })
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("seqbus=debug,seqbus_md=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("seqbus=info,seqbus_md=info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(err) = run(&cli) {
        eprintln!("seqbus-md error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    load_dotenv(&cli.env_file);
    let config = BusConfig::from_env().context("invalid bus configuration")?;
    let endpoint = endpoint_from(cli)?;
    let md_instance = InstanceRegistry::with_defaults()
        .lookup("MD")
        .context("instance registry is missing MD")?;

    tracing::info!(
        feed = %format!("{}:{}{}", endpoint.host, endpoint.port, endpoint.path),
        commands = %format!("{}:{}", config.cmd_addr, config.cmd_port),
        target = cli.target,
        "starting market-data feed"
    );

    let sender = Arc::new(
        McastSender::new(config.cmd_addr, config.cmd_port, MULTICAST_TTL)
            .context("failed to open the command sender socket")?,
    );

    let target = cli.target;
    let publish_sender = Arc::clone(&sender);
    let mut source = SseSource::new(
        endpoint,
        Arc::new(move |payload| {
            let Some(command) = feed::parse_tick(payload, target, md_instance) else {
                return;
            };
            if let Err(err) = publish_sender.send(&command.encode()) {
                tracing::warn!(symbol = %command.symbol, error = %err, "command send failed");
            }
        }),
    );
    source.start().context("failed to start the feed worker")?;

    let running = Arc::new(AtomicBool::new(true));
    let run_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        run_flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install the signal handler")?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    source.stop();
    tracing::info!("market-data feed shutdown complete");
    Ok(())
}
