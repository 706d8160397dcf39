// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # seqbus - Total-order sequencing bus over UDP multicast
//!
//! Distributed producers publish typed **commands** on one multicast
//! group; a single **sequencer** totally orders them, promotes each to
//! its **event** counterpart with an authoritative `(seq, timestamp)`
//! pair, and republishes on a second group. Consumers join the event
//! group, filter by target instance, detect gaps and dispatch typed
//! handlers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seqbus::bus::{CommandBus, CommandReceiver};
//! use seqbus::config::{BusConfig, MULTICAST_TTL};
//! use seqbus::sequencer::{Sequencer, TextAdapter, TopOfBookAdapter};
//! use seqbus::transport::McastSender;
//! use seqbus::wire::{TextCommand, TopOfBookCommand};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BusConfig::from_env()?;
//!     let sender = Arc::new(McastSender::new(
//!         config.events_addr,
//!         config.events_port,
//!         MULTICAST_TTL,
//!     )?);
//!     let command_rx = CommandReceiver::new(
//!         config.cmd_addr,
//!         config.cmd_port,
//!         config.receiver_options(),
//!         Arc::new(CommandBus::new()),
//!     );
//!
//!     let mut sequencer = Sequencer::new(sender, command_rx);
//!     sequencer.register_pipeline::<TextCommand, _>(TextAdapter);
//!     sequencer.register_pipeline::<TopOfBookCommand, _>(TopOfBookAdapter);
//!     sequencer.start()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! producer(s) --cmd group--> [sequencer]
//!     queue -> assign seq+ts -> adapt(cmd)->event -> encode -> evt group
//! evt group --> [event receiver(s)]
//!     dedup -> tag peek -> target filter -> order check -> typed handler
//! ```
//!
//! ## Modules Overview
//!
//! - [`transport`] - multicast send/receive with duplicate suppression
//! - [`wire`] - message types, tag registry and the varint codec
//! - [`bus`] - typed command/event subscription layers
//! - [`sequencer`] - the ordering and promotion core
//! - [`identity`] - participant name → instance-id registry
//! - [`config`] - environment-driven configuration
//!
//! ## Guarantees
//!
//! Event sequence numbers start at 1, are strictly increasing and never
//! reordered; timestamps are non-decreasing. Delivery stays best-effort
//! datagram: consumers observe gaps, they are not repaired.

pub mod bus;
pub mod config;
pub mod identity;
pub mod sequencer;
pub mod transport;
pub mod wire;

pub use bus::{CommandBus, CommandReceiver, EventReceiver, SeqPolicy};
pub use config::{BusConfig, ConfigError};
pub use identity::{InstanceId, InstanceRegistry};
pub use sequencer::Sequencer;
pub use transport::{DatagramSender, McastReceiver, McastSender};
pub use wire::{
    MessageType, TextCommand, TextEvent, TopOfBookCommand, TopOfBookEvent, WireMessage,
};
