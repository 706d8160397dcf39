// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! seqbus-ping - request side of the ping/pong demo pair.
//!
//! Publishes `PING` text commands targeted at the pong instance and logs
//! the sequenced `PONG` replies it receives back.

use anyhow::{Context, Result};
use clap::Parser;
use seqbus::bus::EventReceiver;
use seqbus::config::{load_dotenv, BusConfig, MULTICAST_TTL};
use seqbus::identity::InstanceRegistry;
use seqbus::transport::{DatagramSender, McastSender};
use seqbus::wire::{TextCommand, TextEvent, WireMessage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "seqbus-ping")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish PING commands and log sequenced replies")]
struct Cli {
    /// Environment file to load before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Interval between pings, milliseconds
    #[arg(short, long, default_value = "1000")]
    interval: u64,

    /// Number of pings to send (0 = until interrupted)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Verbose mode (show internal logs)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("seqbus=debug,seqbus_ping=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("seqbus=info,seqbus_ping=info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(err) = run(&cli) {
        eprintln!("seqbus-ping error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    load_dotenv(&cli.env_file);
    let config = BusConfig::from_env().context("invalid bus configuration")?;
    let registry = InstanceRegistry::with_defaults();
    let own_id = registry.lookup("PING").context("instance registry")?;
    let pong_id = registry.lookup("PONG").context("instance registry")?;

    let sender = McastSender::new(config.cmd_addr, config.cmd_port, MULTICAST_TTL)
        .context("failed to open the command sender socket")?;

    let acked = Arc::new(AtomicU64::new(0));
    let acked_clone = Arc::clone(&acked);
    let mut events = EventReceiver::new(
        own_id,
        config.events_addr,
        config.events_port,
        config.receiver_options(),
    );
    events.subscribe::<TextEvent>(move |ev| {
        if ev.text == "PONG" {
            acked_clone.fetch_add(1, Ordering::Relaxed);
            tracing::info!(seq = ev.seq, sid = ev.sid, "received PONG");
        }
    });
    events
        .start()
        .context("failed to start the event receiver")?;

    tracing::info!(
        commands = %format!("{}:{}", config.cmd_addr, config.cmd_port),
        events = %format!("{}:{}", config.events_addr, config.events_port),
        instance = own_id,
        "ping started"
    );

    let running = Arc::new(AtomicBool::new(true));
    let run_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        run_flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install the signal handler")?;

    let mut sent = 0u64;
    while running.load(Ordering::SeqCst) {
        let command = TextCommand {
            tin: pong_id,
            sid: own_id,
            text: "PING".to_string(),
        };
        match sender.send(&command.encode()) {
            Ok(()) => {
                sent += 1;
                tracing::debug!(sent, "published PING");
            }
            Err(err) => tracing::warn!(error = %err, "PING send failed"),
        }
        if cli.count != 0 && sent >= cli.count {
            break;
        }
        std::thread::sleep(Duration::from_millis(cli.interval));
    }

    // allow in-flight replies to land before tearing down
    std::thread::sleep(Duration::from_millis(200));
    events.stop();
    tracing::info!(
        sent,
        acked = acked.load(Ordering::Relaxed),
        "ping shutdown complete"
    );
    Ok(())
}
