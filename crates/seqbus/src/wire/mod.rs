// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire format for bus commands and events.
//!
//! Every datagram on the bus is one serialized structured message whose
//! first field is the message type, encoded so that the leading bytes are
//! `0x08` followed by the type tag as a varint. Receivers rely on that
//! layout to demultiplex by tag without decoding the payload (see
//! [`peek_tag`]).
//!
//! ```text
//! +------+---------+----------------------------------+
//! | 0x08 | tag (1) | remaining fields (varint/LEN/f64)|
//! +------+---------+----------------------------------+
//! ```
//!
//! Field numbers are shared across all message types: `message_type`=1,
//! `tin`=2, `sid`=3, `seq`=4, `timestamp`=5, payload fields from 6.

pub mod codec;
pub mod messages;

pub use codec::{WireError, WireReader, WireWriter};
pub use messages::{
    Command, Event, MessageType, TextCommand, TextEvent, TopOfBookCommand, TopOfBookEvent,
    WireMessage,
};

/// Key of the leading `message_type` field: field 1, varint wire type.
pub const MESSAGE_TYPE_KEY: u8 = 0x08;

/// Recover the message type tag from the leading bytes of a datagram
/// without decoding the rest.
///
/// Returns `None` when the datagram does not start with the `message_type`
/// field or carries a tag outside the registry.
#[must_use]
pub fn peek_tag(data: &[u8]) -> Option<MessageType> {
    if data.first() != Some(&MESSAGE_TYPE_KEY) {
        return None;
    }
    let mut reader = WireReader::new(&data[1..]);
    let raw = reader.read_varint().ok()?;
    MessageType::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_recovers_tag_from_prefix() {
        let cmd = TextCommand {
            tin: 81,
            sid: 18,
            text: "PING".to_string(),
        };
        let bytes = cmd.encode();
        assert_eq!(bytes[0], MESSAGE_TYPE_KEY);
        assert_eq!(bytes[1], MessageType::TextCommand as u8);
        assert_eq!(peek_tag(&bytes), Some(MessageType::TextCommand));
    }

    #[test]
    fn peek_rejects_foreign_prefix() {
        assert_eq!(peek_tag(&[]), None);
        assert_eq!(peek_tag(&[0x12, 0x03]), None);
        // message_type field present but tag not in the registry
        assert_eq!(peek_tag(&[0x08, 0x63]), None);
    }

    #[test]
    fn all_tags_peek_to_their_type() {
        let text_ev = TextEvent {
            seq: 1,
            ..TextEvent::default()
        };
        let tob_cmd = TopOfBookCommand::default();
        let tob_ev = TopOfBookEvent::default();
        assert_eq!(peek_tag(&text_ev.encode()), Some(MessageType::TextEvent));
        assert_eq!(
            peek_tag(&tob_cmd.encode()),
            Some(MessageType::TopOfBookCommand)
        );
        assert_eq!(peek_tag(&tob_ev.encode()), Some(MessageType::TopOfBookEvent));
    }
}
