// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! seqbus-scrappy - audit file sink.
//!
//! Joins the event group without a target filter and appends one
//! pipe-delimited line per event to the output file, flushed
//! immediately:
//!
//! ```text
//! #=1|SID=18|TIN=81|TEXT=PING
//! #=2|SID=4|TIN=0|SYMBOL=AAPL|BID_PRICE=150.25|BID_SIZE=100|ASK_PRICE=150.3|ASK_SIZE=200
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use seqbus::bus::EventReceiver;
use seqbus::config::{load_dotenv, BusConfig};
use seqbus::wire::{TextEvent, TopOfBookEvent};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "seqbus-scrappy")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Append every sequenced event to a pipe-delimited file")]
struct Cli {
    /// Output file (falls back to SCRAPPY_FILE, then sequenced_events.txt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Environment file to load before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Verbose mode (show internal logs)
    #[arg(short, long)]
    verbose: bool,
}

fn text_line(ev: &TextEvent) -> String {
    format!("#={}|SID={}|TIN={}|TEXT={}", ev.seq, ev.sid, ev.tin, ev.text)
}

fn top_of_book_line(ev: &TopOfBookEvent) -> String {
    format!(
        "#={}|SID={}|TIN={}|SYMBOL={}|BID_PRICE={}|BID_SIZE={}|ASK_PRICE={}|ASK_SIZE={}",
        ev.seq, ev.sid, ev.tin, ev.symbol, ev.bid_price, ev.bid_size, ev.ask_price, ev.ask_size
    )
}

/// Append one line and flush; a sink that buffers loses the tail on
/// SIGKILL, which defeats an audit log.
fn append_line(file: &Mutex<File>, line: &str) {
    let mut file = match file.lock() {
        Ok(file) => file,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(err) = writeln!(file, "{}", line).and_then(|()| file.flush()) {
        tracing::warn!(error = %err, "failed to append event line");
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("seqbus=debug,seqbus_scrappy=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("seqbus=info,seqbus_scrappy=info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(err) = run(cli) {
        eprintln!("seqbus-scrappy error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    load_dotenv(&cli.env_file);
    let config = BusConfig::from_env().context("invalid bus configuration")?;
    let output = cli
        .output
        .or_else(|| std::env::var("SCRAPPY_FILE").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("sequenced_events.txt"));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&output)
        .with_context(|| format!("failed to open output file {}", output.display()))?;
    let file = Arc::new(Mutex::new(file));

    let mut events = EventReceiver::promiscuous(
        config.events_addr,
        config.events_port,
        config.receiver_options(),
    );
    let text_file = Arc::clone(&file);
    events.subscribe::<TextEvent>(move |ev| {
        append_line(&text_file, &text_line(&ev));
    });
    let tob_file = Arc::clone(&file);
    events.subscribe::<TopOfBookEvent>(move |ev| {
        append_line(&tob_file, &top_of_book_line(&ev));
    });
    events
        .start()
        .context("failed to start the event receiver")?;

    tracing::info!(
        events = %format!("{}:{}", config.events_addr, config.events_port),
        output = %output.display(),
        "scrappy started"
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
    tracing::info!("scrappy shutdown complete");
    Ok(())
}
