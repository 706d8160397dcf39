// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command-side typed subscription (sequencer ingress).

use crate::bus::CommandBus;
use crate::transport::{McastReceiver, ReceiverOptions};
use crate::wire::{peek_tag, Command, WireMessage};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Wraps the raw multicast receiver on the command group; each
/// `subscribe::<C>()` attaches a tag-filtered datagram handler that
/// decodes `C` and publishes it on the in-process bus with the sender id
/// imputed from the command's own `sid` field.
pub struct CommandReceiver {
    receiver: McastReceiver,
    bus: Arc<CommandBus>,
}

impl CommandReceiver {
    #[must_use]
    pub fn new(group: Ipv4Addr, port: u16, opts: ReceiverOptions, bus: Arc<CommandBus>) -> Self {
        Self {
            receiver: McastReceiver::new(group, port, opts),
            bus,
        }
    }

    #[must_use]
    pub fn bus(&self) -> Arc<CommandBus> {
        Arc::clone(&self.bus)
    }

    /// Register interest in one command type. Mismatched tags are ignored
    /// on this subscription; decode failures are logged and dropped,
    /// never fatal.
    pub fn subscribe<C: Command>(&self) {
        let bus = Arc::clone(&self.bus);
        self.receiver.subscribe(Arc::new(move |data, src| {
            if peek_tag(data) != Some(C::TYPE) {
                return;
            }
            match C::decode(data) {
                Ok(command) => {
                    let sender_id = command.sid();
                    bus.publish(&command, sender_id);
                }
                Err(err) => {
                    log::warn!(
                        "[CMD-RX] dropping undecodable {:?} datagram from {}: {}",
                        C::TYPE,
                        src,
                        err
                    );
                }
            }
        }));
    }

    /// Feed a datagram through the same decode path without a socket
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{TextCommand, TopOfBookCommand};
    use parking_lot::Mutex;

    fn receiver_with_bus() -> (CommandReceiver, Arc<CommandBus>) {
        let bus = Arc::new(CommandBus::new());
        let rx = CommandReceiver::new(
            Ipv4Addr::new(239, 255, 0, 2),
            31012,
            ReceiverOptions::default(),
            Arc::clone(&bus),
        );
        (rx, bus)
    }

    #[test]
    fn delivers_decoded_command_with_imputed_sender() {
        let (rx, bus) = receiver_with_bus();
        rx.subscribe::<TextCommand>();

        let seen: Arc<Mutex<Vec<(TextCommand, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe::<TextCommand>(move |cmd, sender_id| {
            seen_clone.lock().push((cmd.clone(), sender_id));
        });

        let cmd = TextCommand {
            tin: 81,
            sid: 18,
            text: "PING".to_string(),
        };
        rx.deliver(&cmd.encode());

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, cmd);
        assert_eq!(seen[0].1, 18);
    }

    #[test]
    fn foreign_tags_are_ignored_by_the_subscription() {
        let (rx, bus) = receiver_with_bus();
        rx.subscribe::<TextCommand>();

        let hits = Arc::new(Mutex::new(0u32));
        let hits_clone = Arc::clone(&hits);
        bus.subscribe::<TextCommand>(move |_cmd, _sid| {
            *hits_clone.lock() += 1;
        });

        let tob = TopOfBookCommand {
            symbol: "AAPL".to_string(),
            ..TopOfBookCommand::default()
        };
        rx.deliver(&tob.encode());
        assert_eq!(*hits.lock(), 0);
    }

    #[test]
    fn undecodable_payload_is_dropped_not_fatal() {
        let (rx, bus) = receiver_with_bus();
        rx.subscribe::<TextCommand>();

        let hits = Arc::new(Mutex::new(0u32));
        let hits_clone = Arc::clone(&hits);
        bus.subscribe::<TextCommand>(move |_cmd, _sid| {
            *hits_clone.lock() += 1;
        });

        // correct leading tag, torn payload
        rx.deliver(&[0x08, 0x01, 0x32, 0x7f]);
        assert_eq!(*hits.lock(), 0);

        // the subscription still works afterwards
        let cmd = TextCommand {
            tin: 1,
            sid: 2,
            text: "still alive".to_string(),
        };
        rx.deliver(&cmd.encode());
        assert_eq!(*hits.lock(), 1);
    }
}
