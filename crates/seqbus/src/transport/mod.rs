// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP multicast transport: sender, receiver worker, duplicate window.
//!
//! One sender socket per publishing participant, one receiver worker per
//! joined group. The receiver fans each datagram out to every registered
//! handler on its own thread; handlers must not block indefinitely.
//!
//! ```text
//! send(bytes) ----> group:port ----> recv worker -> dedup -> handler fanout
//! ```

pub mod dedup;
pub mod receiver;
pub mod sender;

pub use dedup::{fnv1a_64, DedupWindow};
pub use receiver::{DatagramHandler, McastReceiver, ReceiverMetrics, ReceiverOptions};
pub use sender::{DatagramSender, McastSender};

/// Receive buffer ceiling; payloads must fit a single UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;
