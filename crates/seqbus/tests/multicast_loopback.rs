// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Live-socket scenarios over loopback multicast. These need working
//! multicast on the host and are ignored in CI the same way the rest of
//! the socket suite is.

use parking_lot::Mutex;
use seqbus::bus::{CommandBus, CommandReceiver, EventReceiver};
use seqbus::sequencer::{Sequencer, TextAdapter, TopOfBookAdapter};
use seqbus::transport::{McastReceiver, McastSender, ReceiverOptions};
use seqbus::wire::{TextCommand, TextEvent, WireMessage};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const EVENTS_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);
const CMD_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 2);

#[test]
#[ignore = "requires UDP socket, flaky in CI"]
fn command_to_event_over_the_wire() {
    let events_port = 31101;
    let cmd_port = 31102;

    let event_sender = Arc::new(
        McastSender::new(EVENTS_GROUP, events_port, 1).expect("event sender should open"),
    );
    let command_rx = CommandReceiver::new(
        CMD_GROUP,
        cmd_port,
        ReceiverOptions::default(),
        Arc::new(CommandBus::new()),
    );
    let mut sequencer = Sequencer::new(event_sender, command_rx);
    sequencer.register_pipeline::<TextCommand, _>(TextAdapter);
    sequencer.register_pipeline::<seqbus::wire::TopOfBookCommand, _>(TopOfBookAdapter);
    sequencer.start().expect("sequencer start should succeed");

    let mut consumer = EventReceiver::new(81, EVENTS_GROUP, events_port, ReceiverOptions::default());
    let seen: Arc<Mutex<Vec<TextEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    consumer.subscribe::<TextEvent>(move |ev| seen_clone.lock().push(ev));
    consumer.start().expect("consumer start should succeed");

    let producer =
        McastSender::new(CMD_GROUP, cmd_port, 1).expect("producer sender should open");
    let cmd = TextCommand {
        tin: 81,
        sid: 18,
        text: "PING".to_string(),
    };
    use seqbus::transport::DatagramSender;
    producer.send(&cmd.encode()).expect("command send should succeed");

    std::thread::sleep(Duration::from_millis(500));
    consumer.stop();
    sequencer.stop();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1, "consumer should see exactly one event");
    assert_eq!(seen[0].seq, 1);
    assert_eq!(seen[0].sid, 18);
    assert_eq!(seen[0].text, "PING");
}

#[test]
#[ignore = "requires UDP socket, flaky in CI"]
fn duplicate_datagram_within_window_dispatches_once() {
    let port = 31103;
    let mut rx = McastReceiver::new(EVENTS_GROUP, port, ReceiverOptions::default());
    let hits = Arc::new(AtomicU64::new(0));
    let hits_clone = Arc::clone(&hits);
    rx.subscribe(Arc::new(move |_data, _src| {
        hits_clone.fetch_add(1, Ordering::Relaxed);
    }));
    rx.start().expect("receiver start should succeed");

    use seqbus::transport::DatagramSender;
    let tx = McastSender::new(EVENTS_GROUP, port, 1).expect("sender should open");
    tx.send(b"repeated payload").expect("send should succeed");
    std::thread::sleep(Duration::from_millis(50));
    tx.send(b"repeated payload").expect("send should succeed");

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(hits.load(Ordering::Relaxed), 1, "second copy is inside the window");

    // outside the window the same payload is a fresh delivery
    std::thread::sleep(Duration::from_millis(400));
    tx.send(b"repeated payload").expect("send should succeed");
    std::thread::sleep(Duration::from_millis(200));
    rx.stop();
    assert_eq!(hits.load(Ordering::Relaxed), 2);
}
