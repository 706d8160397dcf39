// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tick JSON → `TopOfBookCommand` adaptation.

use seqbus::wire::TopOfBookCommand;
use serde::Deserialize;

/// Shape of one feed tick. Sizes arrive as JSON numbers (possibly
/// floating point); the feed rejects negatives rather than wrapping.
#[derive(Debug, Deserialize)]
pub struct FeedTick {
    pub symbol: String,
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    /// Seconds since epoch, fractional.
    pub timestamp: f64,
}

/// Parse one `data:` payload into a command targeted at `target_instance`
/// from `sender_instance`. Malformed ticks yield `None`; the feed drops
/// them and keeps streaming.
#[must_use]
pub fn parse_tick(json: &str, target_instance: u64, sender_instance: u64) -> Option<TopOfBookCommand> {
    let tick: FeedTick = match serde_json::from_str(json) {
        Ok(tick) => tick,
        Err(err) => {
            log::warn!("[MD] dropping malformed tick: {}", err);
            return None;
        }
    };
    if tick.bid_size < 0.0 || tick.ask_size < 0.0 || tick.timestamp < 0.0 {
        log::warn!("[MD] dropping tick with negative size/timestamp for {}", tick.symbol);
        return None;
    }

    Some(TopOfBookCommand {
        tin: target_instance,
        sid: sender_instance,
        symbol: tick.symbol,
        bid_price: tick.bid_price,
        bid_size: tick.bid_size as u64,
        ask_price: tick.ask_price,
        ask_size: tick.ask_size as u64,
        exchange_time: (tick.timestamp * 1_000_000.0) as u64,
    })
}
