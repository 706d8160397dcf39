// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! seqbus-sequencer - the total-order sequencer daemon.
//!
//! Joins the command group, orders every accepted command, promotes it to
//! its event counterpart and republishes on the event group.
//!
//! # Usage
//!
//! ```bash
//! # Reference deployment (groups from the environment / .env file)
//! seqbus-sequencer
//!
//! # Echo every promoted event to the log
//! seqbus-sequencer --echo
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use seqbus::bus::{CommandBus, CommandReceiver};
use seqbus::config::{load_dotenv, BusConfig, MULTICAST_TTL};
use seqbus::sequencer::{Sequencer, TextAdapter, TopOfBookAdapter};
use seqbus::transport::McastSender;
use seqbus::wire::{TextCommand, TextEvent, TopOfBookCommand, TopOfBookEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "seqbus-sequencer")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Total-order sequencer for the seqbus multicast bus")]
struct Cli {
    /// Environment file to load before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log every promoted event through an in-process subscriber
    #[arg(long)]
    echo: bool,

    /// Verbose mode (show internal logs)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("seqbus=debug,seqbus_sequencer=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("seqbus=info,seqbus_sequencer=info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(err) = run(&cli) {
        eprintln!("seqbus-sequencer error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    load_dotenv(&cli.env_file);
    let config = BusConfig::from_env().context("invalid bus configuration")?;

    tracing::info!(
        commands = %format!("{}:{}", config.cmd_addr, config.cmd_port),
        events = %format!("{}:{}", config.events_addr, config.events_port),
        dedup = config.dedup,
        "starting sequencer"
    );

    let event_sender = Arc::new(
        McastSender::new(config.events_addr, config.events_port, MULTICAST_TTL)
            .context("failed to open the event sender socket")?,
    );
    let command_rx = CommandReceiver::new(
        config.cmd_addr,
        config.cmd_port,
        config.receiver_options(),
        Arc::new(CommandBus::new()),
    );

    let mut sequencer = Sequencer::new(event_sender, command_rx);
    sequencer.register_pipeline::<TextCommand, _>(TextAdapter);
    sequencer.register_pipeline::<TopOfBookCommand, _>(TopOfBookAdapter);

    if cli.echo {
        sequencer.subscribe_to_events::<TextEvent>(|ev| {
            tracing::info!(seq = ev.seq, sid = ev.sid, tin = ev.tin, text = %ev.text, "event");
        });
        sequencer.subscribe_to_events::<TopOfBookEvent>(|ev| {
            tracing::info!(
                seq = ev.seq,
                sid = ev.sid,
                tin = ev.tin,
                symbol = %ev.symbol,
                bid = ev.bid_price,
                ask = ev.ask_price,
                "event"
            );
        });
    }

    sequencer
        .start()
        .context("failed to start the sequencer")?;

    let running = Arc::new(AtomicBool::new(true));
    let run_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        run_flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install the signal handler")?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    sequencer.stop();
    let (accepted, emitted, failed) = sequencer.metrics().snapshot();
    tracing::info!(accepted, emitted, failed, "sequencer shutdown complete");
    Ok(())
}
