// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end pipeline scenarios: command datagram in, sequenced event
//! datagram out, consumer dispatch. No sockets; the wire is a recording
//! sender and the receivers' in-process delivery path.

use parking_lot::Mutex;
use seqbus::bus::{CommandBus, CommandReceiver, EventReceiver, SeqPolicy};
use seqbus::sequencer::{Sequencer, TextAdapter, TopOfBookAdapter};
use seqbus::transport::{DatagramSender, ReceiverOptions};
use seqbus::wire::{TextCommand, TextEvent, TopOfBookCommand, TopOfBookEvent, WireMessage};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

const EVENTS_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);
const CMD_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 2);

/// Captures every datagram the sequencer emits.
struct RecordingSender {
    datagrams: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSender {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            datagrams: Mutex::new(Vec::new()),
        })
    }

    fn datagrams(&self) -> Vec<Vec<u8>> {
        self.datagrams.lock().clone()
    }
}

impl DatagramSender for RecordingSender {
    fn send(&self, data: &[u8]) -> io::Result<()> {
        self.datagrams.lock().push(data.to_vec());
        Ok(())
    }

    fn send_with_ttl(&self, data: &[u8], _ttl: u32) -> io::Result<()> {
        self.send(data)
    }
}

fn full_sequencer(recorder: Arc<RecordingSender>) -> Sequencer {
    let command_rx = CommandReceiver::new(
        CMD_GROUP,
        30002,
        ReceiverOptions::default(),
        Arc::new(CommandBus::new()),
    );
    let sequencer = Sequencer::new(recorder, command_rx);
    sequencer.register_pipeline::<TextCommand, _>(TextAdapter);
    sequencer.register_pipeline::<TopOfBookCommand, _>(TopOfBookAdapter);
    sequencer
}

fn wait_for_emitted(sequencer: &Sequencer, want: u64) {
    let metrics = sequencer.metrics();
    for _ in 0..200 {
        let (_, emitted, failed) = metrics.snapshot();
        if emitted + failed >= want {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("sequencer never emitted {} events", want);
}

fn consumer(own_id: u64) -> (EventReceiver, Arc<Mutex<Vec<TextEvent>>>) {
    let rx = EventReceiver::new(own_id, EVENTS_GROUP, 30001, ReceiverOptions::default());
    let seen: Arc<Mutex<Vec<TextEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    rx.subscribe::<TextEvent>(move |ev| {
        seen_clone.lock().push(ev);
    });
    (rx, seen)
}

// S1: producer 18 sends PING targeted at 81; consumer 81 gets exactly one
// event with the authoritative header.
#[test]
fn basic_text_round_trip() {
    let recorder = RecordingSender::new();
    let mut sequencer = full_sequencer(Arc::clone(&recorder));
    sequencer.start_detached().expect("start should succeed");

    let cmd = TextCommand {
        tin: 81,
        sid: 18,
        text: "PING".to_string(),
    };
    sequencer.deliver_command(&cmd.encode());
    wait_for_emitted(&sequencer, 1);
    sequencer.stop();

    let (consumer_rx, seen) = consumer(81);
    for datagram in recorder.datagrams() {
        consumer_rx.deliver(&datagram);
    }

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].seq, 1);
    assert_eq!(seen[0].sid, 18);
    assert_eq!(seen[0].tin, 81);
    assert_eq!(seen[0].text, "PING");
    assert!(seen[0].timestamp > 0);
}

// S2: three commands come out as seq 1, 2, 3 in command order.
#[test]
fn multiple_commands_keep_arrival_order() {
    let recorder = RecordingSender::new();
    let mut sequencer = full_sequencer(Arc::clone(&recorder));
    sequencer.start_detached().expect("start should succeed");

    for text in ["MSG1", "MSG2", "MSG3"] {
        let cmd = TextCommand {
            tin: 81,
            sid: 18,
            text: text.to_string(),
        };
        sequencer.deliver_command(&cmd.encode());
    }
    wait_for_emitted(&sequencer, 3);
    sequencer.stop();

    let (consumer_rx, seen) = consumer(81);
    for datagram in recorder.datagrams() {
        consumer_rx.deliver(&datagram);
    }

    let seen = seen.lock();
    let seqs: Vec<u64> = seen.iter().map(|ev| ev.seq).collect();
    let texts: Vec<&str> = seen.iter().map(|ev| ev.text.as_str()).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(texts, vec!["MSG1", "MSG2", "MSG3"]);
}

// S3: only the targeted instance dispatches the event.
#[test]
fn target_instance_filtering() {
    let recorder = RecordingSender::new();
    let mut sequencer = full_sequencer(Arc::clone(&recorder));
    sequencer.start_detached().expect("start should succeed");

    let cmd = TextCommand {
        tin: 18,
        sid: 81,
        text: "X".to_string(),
    };
    sequencer.deliver_command(&cmd.encode());
    wait_for_emitted(&sequencer, 1);
    sequencer.stop();

    let (target_rx, target_seen) = consumer(18);
    let (other_rx, other_seen) = consumer(81);
    for datagram in recorder.datagrams() {
        target_rx.deliver(&datagram);
        other_rx.deliver(&datagram);
    }

    assert_eq!(target_seen.lock().len(), 1);
    assert_eq!(other_seen.lock().len(), 0);
}

// S4: one text and one top-of-book command through the same stream;
// a consumer subscribed to both tags sees both, seq 1 and 2.
#[test]
fn tag_multiplexed_stream() {
    let recorder = RecordingSender::new();
    let mut sequencer = full_sequencer(Arc::clone(&recorder));
    sequencer.start_detached().expect("start should succeed");

    let text_cmd = TextCommand {
        tin: 7,
        sid: 18,
        text: "hello".to_string(),
    };
    let tob_cmd = TopOfBookCommand {
        tin: 7,
        sid: 4,
        symbol: "AAPL".to_string(),
        bid_price: 150.25,
        bid_size: 100,
        ask_price: 150.30,
        ask_size: 200,
        exchange_time: 1_700_000_000_000_000,
    };
    sequencer.deliver_command(&text_cmd.encode());
    sequencer.deliver_command(&tob_cmd.encode());
    wait_for_emitted(&sequencer, 2);
    sequencer.stop();

    let rx = EventReceiver::new(7, EVENTS_GROUP, 30001, ReceiverOptions::default());
    let texts: Arc<Mutex<Vec<TextEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let tobs: Arc<Mutex<Vec<TopOfBookEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let texts_clone = Arc::clone(&texts);
    rx.subscribe::<TextEvent>(move |ev| texts_clone.lock().push(ev));
    let tobs_clone = Arc::clone(&tobs);
    rx.subscribe::<TopOfBookEvent>(move |ev| tobs_clone.lock().push(ev));

    for datagram in recorder.datagrams() {
        rx.deliver(&datagram);
    }

    let texts = texts.lock();
    let tobs = tobs.lock();
    assert_eq!(texts.len(), 1);
    assert_eq!(tobs.len(), 1);
    assert_eq!(texts[0].seq, 1);
    assert_eq!(tobs[0].seq, 2);
    assert_eq!(tobs[0].symbol, "AAPL");
    assert_eq!(tobs[0].bid_price, 150.25);
    assert_eq!(tobs[0].bid_size, 100);
    assert_eq!(tobs[0].ask_price, 150.30);
    assert_eq!(tobs[0].ask_size, 200);
}

// S6: with 1..=4 already delivered, arrivals 5, 7, 6 dispatch as
// 5, 7 (gap logged), 6; the expectation only advances on contiguous
// delivery.
#[test]
fn gap_is_observable_and_non_fatal() {
    let (consumer_rx, seen) = consumer(81);
    let make = |seq: u64| {
        TextEvent {
            tin: 81,
            sid: 18,
            seq,
            timestamp: 1_000 + seq,
            text: format!("m{}", seq),
        }
        .encode()
    };

    for seq in [1, 2, 3, 4, 5, 7, 6] {
        consumer_rx.deliver(&make(seq));
    }

    let seqs: Vec<u64> = seen.lock().iter().map(|ev| ev.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5, 7, 6]);
    assert_eq!(consumer_rx.metrics().gaps.load(std::sync::atomic::Ordering::Relaxed), 1);
}

// Replayed duplicates below the expectation are silently dropped.
#[test]
fn replayed_events_are_dropped() {
    let (consumer_rx, seen) = consumer(81);
    let make = |seq: u64| {
        TextEvent {
            tin: 81,
            sid: 18,
            seq,
            timestamp: 1_000 + seq,
            text: "dup".to_string(),
        }
        .encode()
    };

    for seq in [1, 2, 1, 2, 3] {
        consumer_rx.deliver(&make(seq));
    }
    let seqs: Vec<u64> = seen.lock().iter().map(|ev| ev.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

// Consumers joining mid-stream with the first-seen policy adopt the
// stream without a synthetic gap.
#[test]
fn first_seen_policy_joins_mid_stream() {
    let rx = EventReceiver::with_policy(
        81,
        EVENTS_GROUP,
        30001,
        ReceiverOptions::default(),
        SeqPolicy::FirstSeen,
    );
    let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    rx.subscribe::<TextEvent>(move |ev| seen_clone.lock().push(ev.seq));

    for seq in [900, 901, 902] {
        let ev = TextEvent {
            tin: 81,
            sid: 18,
            seq,
            timestamp: seq,
            text: "late".to_string(),
        };
        rx.deliver(&ev.encode());
    }
    assert_eq!(*seen.lock(), vec![900, 901, 902]);
    assert_eq!(rx.metrics().gaps.load(std::sync::atomic::Ordering::Relaxed), 0);
}
