//! Protocol Messages
//!
//! Fixed-layout binary wire format shared by the host and the player.
//! Every message starts with the 4-byte magic cookie and a 1-byte type
//! tag; all integers are big-endian.
//!
//! ```text
//! Offer          [magic 4][0x2][port u16][name 32]             39 bytes
//! Request        [magic 4][0x3][rounds u8][team 32]            38 bytes
//! ServerPayload  [magic 4][0x4][result u8][rank u16][suit u8]   9 bytes
//! ClientPayload  [magic 4][0x4][decision 5]                    10 bytes
//! ```
//!
//! This is the only module that knows byte offsets.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::core::card::Card;
use crate::game::events::Outcome;
use crate::game::round::Decision;
use crate::MAGIC_COOKIE;

/// Fixed width of the name fields (Offer, Request).
pub const NAME_LEN: usize = 32;
/// Fixed width of the decision field.
pub const DECISION_LEN: usize = 5;
/// Magic cookie + type tag.
pub const HEADER_LEN: usize = 5;

/// Offer size on the wire.
pub const OFFER_SIZE: usize = HEADER_LEN + 2 + NAME_LEN;
/// Request size on the wire.
pub const REQUEST_SIZE: usize = HEADER_LEN + 1 + NAME_LEN;
/// Server payload size on the wire.
pub const SERVER_PAYLOAD_SIZE: usize = HEADER_LEN + 1 + 2 + 1;
/// Client payload size on the wire.
pub const CLIENT_PAYLOAD_SIZE: usize = HEADER_LEN + DECISION_LEN;

// =============================================================================
// ERRORS
// =============================================================================

/// Decode-time protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer bytes than the fixed message size.
    #[error("malformed message: expected {expected} bytes, got {actual}")]
    MalformedMessage {
        /// Required size.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Leading 4 bytes are not the magic cookie.
    #[error("bad magic cookie {0:#010x}")]
    BadMagic(u32),

    /// Type tag differs from what the caller expects.
    #[error("unexpected message type {actual:#x}, expected {expected:#x}")]
    UnexpectedType {
        /// Tag the caller asked for.
        expected: u8,
        /// Tag found in the buffer.
        actual: u8,
    },

    /// Decision field is neither "Hittt" nor "Stand".
    #[error("invalid decision {0:?}, expected \"Hittt\" or \"Stand\"")]
    InvalidDecision(String),

    /// Server payload result byte outside 0..=3.
    #[error("unknown result code {0:#x}")]
    UnknownResultCode(u8),
}

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Wire type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Host availability broadcast.
    Offer = 0x2,
    /// Player handshake.
    Request = 0x3,
    /// Per-event game data, both directions.
    Payload = 0x4,
}

/// A fixed-size message with a pure encode/decode pair.
pub trait WireMessage: Sized {
    /// Exact encoded length.
    const SIZE: usize;
    /// Type tag.
    const TYPE: MessageType;

    /// Encode. Never fails.
    fn encode(&self) -> Bytes;

    /// Decode from the front of `buf`; trailing bytes are ignored.
    fn decode(buf: &[u8]) -> Result<Self, ProtocolError>;
}

/// Validate size, magic and type; return the body after the header.
fn check_header(buf: &[u8], size: usize, expected: MessageType) -> Result<&[u8], ProtocolError> {
    if buf.len() < size {
        return Err(ProtocolError::MalformedMessage {
            expected: size,
            actual: buf.len(),
        });
    }

    let mut head = &buf[..HEADER_LEN];
    let magic = head.get_u32();
    if magic != MAGIC_COOKIE {
        return Err(ProtocolError::BadMagic(magic));
    }

    let tag = head.get_u8();
    if tag != expected as u8 {
        return Err(ProtocolError::UnexpectedType {
            expected: expected as u8,
            actual: tag,
        });
    }

    Ok(&buf[HEADER_LEN..size])
}

fn header(size: usize, kind: MessageType) -> BytesMut {
    let mut out = BytesMut::with_capacity(size);
    out.put_u32(MAGIC_COOKIE);
    out.put_u8(kind as u8);
    out
}

/// Truncate to 32 bytes on a char boundary and NUL-pad.
fn put_name(out: &mut BytesMut, name: &str) {
    let mut end = name.len().min(NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    out.put_slice(&name.as_bytes()[..end]);
    out.put_bytes(0, NAME_LEN - end);
}

fn get_name(field: &[u8]) -> String {
    let end = field.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// =============================================================================
// OFFER (host -> broadcast)
// =============================================================================

/// Host availability broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    /// TCP port the host accepts sessions on.
    pub port: u16,
    /// Host display name.
    pub name: String,
}

impl WireMessage for Offer {
    const SIZE: usize = OFFER_SIZE;
    const TYPE: MessageType = MessageType::Offer;

    fn encode(&self) -> Bytes {
        let mut out = header(Self::SIZE, Self::TYPE);
        out.put_u16(self.port);
        put_name(&mut out, &self.name);
        out.freeze()
    }

    fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut body = check_header(buf, Self::SIZE, Self::TYPE)?;
        let port = body.get_u16();
        Ok(Self {
            port,
            name: get_name(body),
        })
    }
}

// =============================================================================
// REQUEST (player -> host)
// =============================================================================

/// Handshake: how many rounds, and who is playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Rounds to play.
    pub rounds: u8,
    /// Team name.
    pub team_name: String,
}

impl WireMessage for Request {
    const SIZE: usize = REQUEST_SIZE;
    const TYPE: MessageType = MessageType::Request;

    fn encode(&self) -> Bytes {
        let mut out = header(Self::SIZE, Self::TYPE);
        out.put_u8(self.rounds);
        put_name(&mut out, &self.team_name);
        out.freeze()
    }

    fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut body = check_header(buf, Self::SIZE, Self::TYPE)?;
        let rounds = body.get_u8();
        Ok(Self {
            rounds,
            team_name: get_name(body),
        })
    }
}

// =============================================================================
// SERVER PAYLOAD (host -> player)
// =============================================================================

/// Result byte of a server payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RoundResult {
    /// Round still running; a card is attached.
    Continue = 0x0,
    /// Push.
    Tie = 0x1,
    /// Player lost.
    Loss = 0x2,
    /// Player won.
    Win = 0x3,
}

impl RoundResult {
    /// Parse a result byte.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x0 => Ok(RoundResult::Continue),
            0x1 => Ok(RoundResult::Tie),
            0x2 => Ok(RoundResult::Loss),
            0x3 => Ok(RoundResult::Win),
            other => Err(ProtocolError::UnknownResultCode(other)),
        }
    }

    /// Outcome for a terminal code.
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            RoundResult::Continue => None,
            RoundResult::Tie => Some(Outcome::Tie),
            RoundResult::Loss => Some(Outcome::Loss),
            RoundResult::Win => Some(Outcome::Win),
        }
    }
}

impl From<Outcome> for RoundResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Tie => RoundResult::Tie,
            Outcome::Loss => RoundResult::Loss,
            Outcome::Win => RoundResult::Win,
        }
    }
}

impl From<Option<Outcome>> for RoundResult {
    fn from(outcome: Option<Outcome>) -> Self {
        outcome.map_or(RoundResult::Continue, RoundResult::from)
    }
}

/// A dealt card, a round outcome, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPayload {
    /// Result code.
    pub result: RoundResult,
    /// Card rank, 0 when no card is attached.
    pub rank: u16,
    /// Card suit, 0 when no card is attached.
    pub suit: u8,
}

impl ServerPayload {
    /// Card dealt mid-round.
    pub fn dealt(card: Card) -> Self {
        Self::with_card(RoundResult::Continue, card)
    }

    /// Card that also closes the round (bust or dealer bust).
    pub fn with_card(result: RoundResult, card: Card) -> Self {
        Self {
            result,
            rank: card.rank() as u16,
            suit: card.suit() as u8,
        }
    }

    /// Final comparison result with the card fields zeroed.
    pub fn outcome(result: RoundResult) -> Self {
        Self {
            result,
            rank: 0,
            suit: 0,
        }
    }

    /// Attached card, if the fields hold a valid one.
    pub fn card(&self) -> Option<Card> {
        Card::from_wire(self.rank, self.suit)
    }
}

impl WireMessage for ServerPayload {
    const SIZE: usize = SERVER_PAYLOAD_SIZE;
    const TYPE: MessageType = MessageType::Payload;

    fn encode(&self) -> Bytes {
        let mut out = header(Self::SIZE, Self::TYPE);
        out.put_u8(self.result as u8);
        out.put_u16(self.rank);
        out.put_u8(self.suit);
        out.freeze()
    }

    fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut body = check_header(buf, Self::SIZE, Self::TYPE)?;
        let result = RoundResult::from_u8(body.get_u8())?;
        let rank = body.get_u16();
        let suit = body.get_u8();
        Ok(Self { result, rank, suit })
    }
}

// =============================================================================
// CLIENT PAYLOAD (player -> host)
// =============================================================================

impl Decision {
    /// Exact 5-byte wire literal. "Hit" is sent as `Hittt`, not padded.
    pub fn wire_literal(self) -> &'static [u8; DECISION_LEN] {
        match self {
            Decision::Hit => b"Hittt",
            Decision::Stand => b"Stand",
        }
    }

    /// Exact match against the two literals; no trimming, no case folding.
    pub fn from_wire(field: &[u8]) -> Result<Self, ProtocolError> {
        if field == Decision::Hit.wire_literal() {
            Ok(Decision::Hit)
        } else if field == Decision::Stand.wire_literal() {
            Ok(Decision::Stand)
        } else {
            Err(ProtocolError::InvalidDecision(
                String::from_utf8_lossy(field).into_owned(),
            ))
        }
    }
}

/// Player decision message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientPayload {
    /// Hit or Stand.
    pub decision: Decision,
}

impl WireMessage for ClientPayload {
    const SIZE: usize = CLIENT_PAYLOAD_SIZE;
    const TYPE: MessageType = MessageType::Payload;

    fn encode(&self) -> Bytes {
        let mut out = header(Self::SIZE, Self::TYPE);
        out.put_slice(self.decision.wire_literal());
        out.freeze()
    }

    fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let body = check_header(buf, Self::SIZE, Self::TYPE)?;
        Ok(Self {
            decision: Decision::from_wire(body)?,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
