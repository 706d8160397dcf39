// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! seqbus-pong - reply side of the ping/pong demo pair.
//!
//! Listens for sequenced `PING` text events targeted at its own
//! instance and answers each with a `PONG` command targeted back at the
//! originator.

use anyhow::{Context, Result};
use clap::Parser;
use seqbus::bus::EventReceiver;
use seqbus::config::{load_dotenv, BusConfig, MULTICAST_TTL};
use seqbus::identity::InstanceRegistry;
use seqbus::transport::{DatagramSender, McastSender};
use seqbus::wire::{TextCommand, TextEvent, WireMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "seqbus-pong")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Answer sequenced PING events with PONG commands")]
struct Cli {
    /// Environment file to load before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Verbose mode (show internal logs)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("seqbus=debug,seqbus_pong=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("seqbus=info,seqbus_pong=info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(err) = run(&cli) {
        eprintln!("seqbus-pong error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    load_dotenv(&cli.env_file);
    let config = BusConfig::from_env().context("invalid bus configuration")?;
    let registry = InstanceRegistry::with_defaults();
    let own_id = registry.lookup("PONG").context("instance registry")?;

    let sender = Arc::new(
        McastSender::new(config.cmd_addr, config.cmd_port, MULTICAST_TTL)
            .context("failed to open the command sender socket")?,
    );

    let mut events = EventReceiver::new(
        own_id,
        config.events_addr,
        config.events_port,
        config.receiver_options(),
    );
    let reply_sender = Arc::clone(&sender);
    events.subscribe::<TextEvent>(move |ev| {
        if ev.text != "PING" {
            return;
        }
        tracing::info!(seq = ev.seq, sid = ev.sid, "received PING");
        let reply = TextCommand {
            tin: ev.sid,
            sid: own_id,
            text: "PONG".to_string(),
        };
        match reply_sender.send(&reply.encode()) {
            Ok(()) => tracing::debug!(target_instance = ev.sid, "sent PONG"),
            Err(err) => tracing::warn!(error = %err, "PONG send failed"),
        }
    });
    events
        .start()
        .context("failed to start the event receiver")?;

    tracing::info!(
        commands = %format!("{}:{}", config.cmd_addr, config.cmd_port),
        events = %format!("{}:{}", config.events_addr, config.events_port),
        instance = own_id,
        "pong started"
    );

    let running = Arc::new(AtomicBool::new(true));
    let run_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        run_flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install the signal handler")?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    events.stop();
    tracing::info!("pong shutdown complete");
    Ok(())
}
