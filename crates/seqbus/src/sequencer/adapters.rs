// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command→event promotion adapters.
//!
//! An adapter is a pure function from an accepted command plus the
//! sequencer-authoritative `(seq, sid, timestamp)` triple to the
//! promoted event. Producer-set fields pass through verbatim; only the
//! sequencer-owned fields are written here.

use crate::identity::InstanceId;
use crate::wire::{Command, TextCommand, TextEvent, TopOfBookCommand, TopOfBookEvent};

/// Promotion from one command type to its event counterpart.
pub trait EventAdapter<C: Command>: Send + Sync + 'static {
    fn make_event(&self, command: &C, seq: u64, sender_id: InstanceId, timestamp: u64)
        -> C::Promoted;
}

/// `TextCommand` → `TextEvent`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAdapter;

impl EventAdapter<TextCommand> for TextAdapter {
    fn make_event(
        &self,
        command: &TextCommand,
        seq: u64,
        sender_id: InstanceId,
        timestamp: u64,
    ) -> TextEvent {
        TextEvent {
            tin: command.tin,
            sid: sender_id,
            seq,
            timestamp,
            text: command.text.clone(),
        }
    }
}

/// `TopOfBookCommand` → `TopOfBookEvent`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopOfBookAdapter;

impl EventAdapter<TopOfBookCommand> for TopOfBookAdapter {
    fn make_event(
        &self,
        command: &TopOfBookCommand,
        seq: u64,
        sender_id: InstanceId,
        timestamp: u64,
    ) -> TopOfBookEvent {
        TopOfBookEvent {
            tin: command.tin,
            sid: sender_id,
            seq,
            timestamp,
            symbol: command.symbol.clone(),
            bid_price: command.bid_price,
            bid_size: command.bid_size,
            ask_price: command.ask_price,
            ask_size: command.ask_size,
            exchange_time: command.exchange_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_adapter_writes_only_sequencer_fields() {
        let cmd = TextCommand {
            tin: 81,
            sid: 18,
            text: "PING".to_string(),
        };
        let ev = TextAdapter.make_event(&cmd, 7, 18, 123_456);
        assert_eq!(ev.seq, 7);
        assert_eq!(ev.sid, 18);
        assert_eq!(ev.timestamp, 123_456);
        assert_eq!(ev.tin, 81);
        assert_eq!(ev.text, "PING");
    }

    #[test]
    fn top_of_book_adapter_preserves_the_quintuple() {
        let cmd = TopOfBookCommand {
            tin: 0,
            sid: 4,
            symbol: "AAPL".to_string(),
            bid_price: 150.25,
            bid_size: 100,
            ask_price: 150.30,
            ask_size: 200,
            exchange_time: 1_700_000_000_000_000,
        };
        let ev = TopOfBookAdapter.make_event(&cmd, 2, 4, 55);
        assert_eq!(ev.symbol, "AAPL");
        assert_eq!(ev.bid_price, 150.25);
        assert_eq!(ev.bid_size, 100);
        assert_eq!(ev.ask_price, 150.30);
        assert_eq!(ev.ask_size, 200);
        assert_eq!(ev.exchange_time, 1_700_000_000_000_000);
        assert_eq!((ev.seq, ev.sid, ev.timestamp), (2, 4, 55));
    }
}
