//! Playing cards.
//!
//! A card has no intrinsic blackjack value; [`Card::points`] gives the
//! face value with the Ace counted high, and the hand decides whether
//! an Ace drops to 1.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest rank (Ace).
pub const ACE: u8 = 1;
/// Jack.
pub const JACK: u8 = 11;
/// Queen.
pub const QUEEN: u8 = 12;
/// Highest rank (King).
pub const KING: u8 = 13;

/// Card suit, numbered as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Suit {
    /// Hearts (0)
    Hearts = 0,
    /// Diamonds (1)
    Diamonds = 1,
    /// Clubs (2)
    Clubs = 2,
    /// Spades (3)
    Spades = 3,
}

impl Suit {
    /// All suits in wire order.
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    /// Parse a wire suit index.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Unicode suit symbol.
    pub fn symbol(self) -> char {
        match self {
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
            Suit::Clubs => '♣',
            Suit::Spades => '♠',
        }
    }
}

/// A single card: rank 1..=13 (Ace..King) and a suit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Card {
    rank: u8,
    suit: Suit,
}

impl Card {
    /// Build a card, rejecting ranks outside 1..=13.
    pub fn new(rank: u8, suit: Suit) -> Option<Self> {
        (ACE..=KING).contains(&rank).then_some(Self { rank, suit })
    }

    /// Build a card from raw wire fields.
    pub fn from_wire(rank: u16, suit: u8) -> Option<Self> {
        let rank = u8::try_from(rank).ok()?;
        Self::new(rank, Suit::from_u8(suit)?)
    }

    /// Rank, 1 = Ace, 11..=13 = Jack..King.
    #[inline]
    pub fn rank(&self) -> u8 {
        self.rank
    }

    /// Suit.
    #[inline]
    pub fn suit(&self) -> Suit {
        self.suit
    }

    /// Is this an Ace.
    #[inline]
    pub fn is_ace(&self) -> bool {
        self.rank == ACE
    }

    /// Blackjack points with the Ace counted as 11.
    #[inline]
    pub fn points(&self) -> u32 {
        match self.rank {
            ACE => 11,
            JACK..=KING => 10,
            r => r as u32,
        }
    }

    /// Rank label: A, 2..10, J, Q, K.
    pub fn rank_label(&self) -> String {
        match self.rank {
            ACE => "A".to_string(),
            JACK => "J".to_string(),
            QUEEN => "Q".to_string(),
            KING => "K".to_string(),
            r => r.to_string(),
        }
    }

    /// Every card of a standard deck, suit-major.
    pub fn full_deck() -> Vec<Card> {
        Suit::ALL
            .iter()
            .flat_map(|&suit| (ACE..=KING).map(move |rank| Card { rank, suit }))
            .collect()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank_label(), self.suit.symbol())
    }
}
