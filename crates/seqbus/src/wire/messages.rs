// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message type registry and the typed command/event records.
//!
//! Commands are produced by participants on the command group; the
//! sequencer promotes each to its event counterpart (tag mapping 1→2,
//! 3→4) and is the sole writer of `seq` and `timestamp`. All other
//! fields a producer sets are preserved verbatim by the adapters.

use super::codec::{WireError, WireReader, WireWriter, WIRE_VARINT};

const FIELD_MESSAGE_TYPE: u32 = 1;
const FIELD_TIN: u32 = 2;
const FIELD_SID: u32 = 3;
const FIELD_SEQ: u32 = 4;
const FIELD_TIMESTAMP: u32 = 5;
const FIELD_TEXT: u32 = 6;
const FIELD_SYMBOL: u32 = 6;
const FIELD_BID_PRICE: u32 = 7;
const FIELD_BID_SIZE: u32 = 8;
const FIELD_ASK_PRICE: u32 = 9;
const FIELD_ASK_SIZE: u32 = 10;
const FIELD_EXCHANGE_TIME: u32 = 11;

/// Wire tag carried as the first field of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    TextCommand = 1,
    TextEvent = 2,
    TopOfBookCommand = 3,
    TopOfBookEvent = 4,
}

impl MessageType {
    /// Map a raw wire tag back into the registry.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(MessageType::TextCommand),
            2 => Some(MessageType::TextEvent),
            3 => Some(MessageType::TopOfBookCommand),
            4 => Some(MessageType::TopOfBookEvent),
            _ => None,
        }
    }

    /// Command→event promotion mapping (1→2, 3→4). Event tags have no
    /// counterpart and map to `None`.
    #[must_use]
    pub fn promote(self) -> Option<Self> {
        match self {
            MessageType::TextCommand => Some(MessageType::TextEvent),
            MessageType::TopOfBookCommand => Some(MessageType::TopOfBookEvent),
            MessageType::TextEvent | MessageType::TopOfBookEvent => None,
        }
    }

    #[must_use]
    pub fn is_command(self) -> bool {
        matches!(self, MessageType::TextCommand | MessageType::TopOfBookCommand)
    }
}

/// A record that can cross the wire as one datagram.
pub trait WireMessage: Sized + Send + Sync + 'static {
    /// Wire tag this type serializes under.
    const TYPE: MessageType;

    fn encode(&self) -> Vec<u8>;
    fn decode(data: &[u8]) -> Result<Self, WireError>;

    /// Target instance id (0 = broadcast).
    fn tin(&self) -> u64;
    /// Sender instance id (0 = unidentified producer).
    fn sid(&self) -> u64;
}

/// A producer-originated record, promotable to an event.
pub trait Command: WireMessage + Clone {
    type Promoted: Event;
}

/// A sequencer-authoritative record.
pub trait Event: WireMessage + Clone {
    fn seq(&self) -> u64;
    fn timestamp(&self) -> u64;
}

/// Decode the leading `message_type` field and check it against `expected`.
fn read_message_type(reader: &mut WireReader<'_>, expected: MessageType) -> Result<(), WireError> {
    let (field, wire_type) = reader.read_key()?;
    if field != FIELD_MESSAGE_TYPE || wire_type != WIRE_VARINT {
        return Err(WireError::MissingMessageType);
    }
    let raw = reader.read_varint()?;
    if raw != expected as u64 {
        return Err(WireError::WrongMessageType {
            expected: expected as u8,
            found: raw,
        });
    }
    Ok(())
}

// ===== Text =====

/// Free-form text command (request/reply demo traffic).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextCommand {
    pub tin: u64,
    pub sid: u64,
    pub text: String,
}

/// Sequenced counterpart of [`TextCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextEvent {
    pub tin: u64,
    pub sid: u64,
    pub seq: u64,
    pub timestamp: u64,
    pub text: String,
}

impl WireMessage for TextCommand {
    const TYPE: MessageType = MessageType::TextCommand;

    fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_u64_always(FIELD_MESSAGE_TYPE, Self::TYPE as u64);
        w.put_u64(FIELD_TIN, self.tin);
        w.put_u64(FIELD_SID, self.sid);
        w.put_str(FIELD_TEXT, &self.text);
        w.into_bytes()
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(data);
        read_message_type(&mut r, Self::TYPE)?;
        let mut msg = TextCommand::default();
        while !r.is_empty() {
            let (field, wire_type) = r.read_key()?;
            match field {
                FIELD_TIN => msg.tin = r.read_varint()?,
                FIELD_SID => msg.sid = r.read_varint()?,
                FIELD_TEXT => msg.text = r.read_string()?,
                _ => r.skip(wire_type)?,
            }
        }
        Ok(msg)
    }

    fn tin(&self) -> u64 {
        self.tin
    }

    fn sid(&self) -> u64 {
        self.sid
    }
}

impl Command for TextCommand {
    type Promoted = TextEvent;
}

impl WireMessage for TextEvent {
    const TYPE: MessageType = MessageType::TextEvent;

    fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_u64_always(FIELD_MESSAGE_TYPE, Self::TYPE as u64);
        w.put_u64(FIELD_TIN, self.tin);
        w.put_u64(FIELD_SID, self.sid);
        w.put_u64(FIELD_SEQ, self.seq);
        w.put_u64(FIELD_TIMESTAMP, self.timestamp);
        w.put_str(FIELD_TEXT, &self.text);
        w.into_bytes()
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(data);
        read_message_type(&mut r, Self::TYPE)?;
        let mut msg = TextEvent::default();
        while !r.is_empty() {
            let (field, wire_type) = r.read_key()?;
            match field {
                FIELD_TIN => msg.tin = r.read_varint()?,
                FIELD_SID => msg.sid = r.read_varint()?,
                FIELD_SEQ => msg.seq = r.read_varint()?,
                FIELD_TIMESTAMP => msg.timestamp = r.read_varint()?,
                FIELD_TEXT => msg.text = r.read_string()?,
                _ => r.skip(wire_type)?,
            }
        }
        Ok(msg)
    }

    fn tin(&self) -> u64 {
        self.tin
    }

    fn sid(&self) -> u64 {
        self.sid
    }
}

impl Event for TextEvent {
    fn seq(&self) -> u64 {
        self.seq
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

// ===== Top of book =====

/// Best bid/offer snapshot produced by the market-data ingester.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopOfBookCommand {
    pub tin: u64,
    pub sid: u64,
    pub symbol: String,
    pub bid_price: f64,
    pub bid_size: u64,
    pub ask_price: f64,
    pub ask_size: u64,
    pub exchange_time: u64,
}

/// Sequenced counterpart of [`TopOfBookCommand`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopOfBookEvent {
    pub tin: u64,
    pub sid: u64,
    pub seq: u64,
    pub timestamp: u64,
    pub symbol: String,
    pub bid_price: f64,
    pub bid_size: u64,
    pub ask_price: f64,
    pub ask_size: u64,
    pub exchange_time: u64,
}

impl WireMessage for TopOfBookCommand {
    const TYPE: MessageType = MessageType::TopOfBookCommand;

    fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_u64_always(FIELD_MESSAGE_TYPE, Self::TYPE as u64);
        w.put_u64(FIELD_TIN, self.tin);
        w.put_u64(FIELD_SID, self.sid);
        w.put_str(FIELD_SYMBOL, &self.symbol);
        w.put_f64(FIELD_BID_PRICE, self.bid_price);
        w.put_u64(FIELD_BID_SIZE, self.bid_size);
        w.put_f64(FIELD_ASK_PRICE, self.ask_price);
        w.put_u64(FIELD_ASK_SIZE, self.ask_size);
        w.put_u64(FIELD_EXCHANGE_TIME, self.exchange_time);
        w.into_bytes()
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(data);
        read_message_type(&mut r, Self::TYPE)?;
        let mut msg = TopOfBookCommand::default();
        while !r.is_empty() {
            let (field, wire_type) = r.read_key()?;
            match field {
                FIELD_TIN => msg.tin = r.read_varint()?,
                FIELD_SID => msg.sid = r.read_varint()?,
                FIELD_SYMBOL => msg.symbol = r.read_string()?,
                FIELD_BID_PRICE => msg.bid_price = r.read_f64()?,
                FIELD_BID_SIZE => msg.bid_size = r.read_varint()?,
                FIELD_ASK_PRICE => msg.ask_price = r.read_f64()?,
                FIELD_ASK_SIZE => msg.ask_size = r.read_varint()?,
                FIELD_EXCHANGE_TIME => msg.exchange_time = r.read_varint()?,
                _ => r.skip(wire_type)?,
            }
        }
        Ok(msg)
    }

    fn tin(&self) -> u64 {
        self.tin
    }

    fn sid(&self) -> u64 {
        self.sid
    }
}

impl Command for TopOfBookCommand {
    type Promoted = TopOfBookEvent;
}

impl WireMessage for TopOfBookEvent {
    const TYPE: MessageType = MessageType::TopOfBookEvent;

    fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_u64_always(FIELD_MESSAGE_TYPE, Self::TYPE as u64);
        w.put_u64(FIELD_TIN, self.tin);
        w.put_u64(FIELD_SID, self.sid);
        w.put_u64(FIELD_SEQ, self.seq);
        w.put_u64(FIELD_TIMESTAMP, self.timestamp);
        w.put_str(FIELD_SYMBOL, &self.symbol);
        w.put_f64(FIELD_BID_PRICE, self.bid_price);
        w.put_u64(FIELD_BID_SIZE, self.bid_size);
        w.put_f64(FIELD_ASK_PRICE, self.ask_price);
        w.put_u64(FIELD_ASK_SIZE, self.ask_size);
        w.put_u64(FIELD_EXCHANGE_TIME, self.exchange_time);
        w.into_bytes()
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(data);
        read_message_type(&mut r, Self::TYPE)?;
        let mut msg = TopOfBookEvent::default();
        while !r.is_empty() {
            let (field, wire_type) = r.read_key()?;
            match field {
                FIELD_TIN => msg.tin = r.read_varint()?,
                FIELD_SID => msg.sid = r.read_varint()?,
                FIELD_SEQ => msg.seq = r.read_varint()?,
                FIELD_TIMESTAMP => msg.timestamp = r.read_varint()?,
                FIELD_SYMBOL => msg.symbol = r.read_string()?,
                FIELD_BID_PRICE => msg.bid_price = r.read_f64()?,
                FIELD_BID_SIZE => msg.bid_size = r.read_varint()?,
                FIELD_ASK_PRICE => msg.ask_price = r.read_f64()?,
                FIELD_ASK_SIZE => msg.ask_size = r.read_varint()?,
                FIELD_EXCHANGE_TIME => msg.exchange_time = r.read_varint()?,
                _ => r.skip(wire_type)?,
            }
        }
        Ok(msg)
    }

    fn tin(&self) -> u64 {
        self.tin
    }

    fn sid(&self) -> u64 {
        self.sid
    }
}

impl Event for TopOfBookEvent {
    fn seq(&self) -> u64 {
        self.seq
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}
