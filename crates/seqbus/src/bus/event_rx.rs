// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event-side typed subscription (consumer ingress).
//!
//! Per-event pipeline: tag peek → decode → target-instance filter →
//! sequence check → typed handler. One sequence tracker is shared by all
//! subscriptions of a receiver; the global sequence is interleaved across
//! event types, so tracking it per subscription would manufacture gaps.

use crate::identity::{InstanceId, BROADCAST_INSTANCE};
use crate::transport::{McastReceiver, ReceiverOptions};
use crate::wire::{peek_tag, Event, WireMessage};
use parking_lot::Mutex;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Initial expectation for the first observed sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqPolicy {
    /// Expect the stream from its beginning (`seq = 1`). The baseline:
    /// a sequencer restart implies a consumer restart.
    StartAtOne,
    /// Adopt the first observed sequence as in-order. Useful for
    /// consumers joining an already-running stream.
    FirstSeen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Deliver,
    Gap { expected: u64 },
    Stale,
}

#[derive(Debug)]
struct SeqTracker {
    expected: Option<u64>,
}

impl SeqTracker {
    fn new(policy: SeqPolicy) -> Self {
        Self {
            expected: match policy {
                SeqPolicy::StartAtOne => Some(1),
                SeqPolicy::FirstSeen => None,
            },
        }
    }

    fn observe(&mut self, seq: u64) -> Disposition {
        let expected = match self.expected {
            Some(expected) => expected,
            None => {
                self.expected = Some(seq + 1);
                return Disposition::Deliver;
            }
        };
        if seq < expected {
            return Disposition::Stale;
        }
        if seq == expected {
            self.expected = Some(expected + 1);
            return Disposition::Deliver;
        }
        // A gap never advances the expectation: the missing events may
        // still arrive and must be deliverable as in-order then.
        Disposition::Gap { expected }
    }
}

/// Consumer-side counters.
#[derive(Debug, Default)]
pub struct EventMetrics {
    pub delivered: AtomicU64,
    pub filtered: AtomicU64,
    pub stale_dropped: AtomicU64,
    pub gaps: AtomicU64,
    pub decode_failures: AtomicU64,
}

impl EventMetrics {
    /// `(delivered, filtered, stale, gaps, decode_failures)` snapshot.
    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.delivered.load(Ordering::Relaxed),
            self.filtered.load(Ordering::Relaxed),
            self.stale_dropped.load(Ordering::Relaxed),
            self.gaps.load(Ordering::Relaxed),
            self.decode_failures.load(Ordering::Relaxed),
        )
    }
}

/// Typed event consumer on the event multicast group.
///
/// `own_id = Some(x)` delivers events with `tin == x` or the broadcast
/// target `0`; `None` (promiscuous, see [`promiscuous`](Self::promiscuous))
/// delivers everything and suits audit sinks.
pub struct EventReceiver {
    receiver: McastReceiver,
    own_id: Option<InstanceId>,
    tracker: Arc<Mutex<SeqTracker>>,
    metrics: Arc<EventMetrics>,
}

impl EventReceiver {
    #[must_use]
    pub fn new(own_id: InstanceId, group: Ipv4Addr, port: u16, opts: ReceiverOptions) -> Self {
        Self::with_policy(own_id, group, port, opts, SeqPolicy::StartAtOne)
    }

    #[must_use]
    pub fn with_policy(
        own_id: InstanceId,
        group: Ipv4Addr,
        port: u16,
        opts: ReceiverOptions,
        policy: SeqPolicy,
    ) -> Self {
        Self {
            receiver: McastReceiver::new(group, port, opts),
            own_id: Some(own_id),
            tracker: Arc::new(Mutex::new(SeqTracker::new(policy))),
            metrics: Arc::new(EventMetrics::default()),
        }
    }

    /// Receiver without a target filter; every event is delivered.
    #[must_use]
    pub fn promiscuous(group: Ipv4Addr, port: u16, opts: ReceiverOptions) -> Self {
        Self {
            receiver: McastReceiver::new(group, port, opts),
            own_id: None,
            tracker: Arc::new(Mutex::new(SeqTracker::new(SeqPolicy::FirstSeen))),
            metrics: Arc::new(EventMetrics::default()),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<EventMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Register interest in one event type.
    pub fn subscribe<E: Event>(&self, handler: impl Fn(E) + Send + Sync + 'static) {
        let own_id = self.own_id;
        let tracker = Arc::clone(&self.tracker);
        let metrics = Arc::clone(&self.metrics);
        self.receiver.subscribe(Arc::new(move |data, src| {
            if peek_tag(data) != Some(E::TYPE) {
                return;
            }
            let event = match E::decode(data) {
                Ok(event) => event,
                Err(err) => {
                    metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "[EVT-RX] dropping undecodable {:?} datagram from {}: {}",
                        E::TYPE,
                        src,
                        err
                    );
                    return;
                }
            };

            if let Some(own) = own_id {
                let tin = event.tin();
                if tin != own && tin != BROADCAST_INSTANCE {
                    metrics.filtered.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }

            let disposition = tracker.lock().observe(event.seq());
            match disposition {
                Disposition::Deliver => {
                    metrics.delivered.fetch_add(1, Ordering::Relaxed);
                    handler(event);
                }
                Disposition::Gap { expected } => {
                    metrics.gaps.fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "[EVT-RX] sequence gap: expected {}, got {} (dispatching anyway)",
                        expected,
                        event.seq()
                    );
                    metrics.delivered.fetch_add(1, Ordering::Relaxed);
                    handler(event);
                }
                Disposition::Stale => {
                    metrics.stale_dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[EVT-RX] dropping stale seq {}", event.seq());
                }
            }
        }));
    }

    /// Feed a datagram through the same dispatch path without a socket
    /// (in-process wiring, tests).
    pub fn deliver(&self, data: &[u8]) {
        self.receiver.inject(data);
    }

    pub fn start(&mut self) -> io::Result<()> {
        self.receiver.start()
    }

    pub fn stop(&mut self) {
        self.receiver.stop();
    }
}
