//! Hands and blackjack scoring.

use std::fmt;

use super::card::Card;
use crate::BLACKJACK;

/// Ordered cards held by one party.
///
/// The score is never cached: Ace valuation depends on the whole hand,
/// so every call to [`Hand::score`] recomputes it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    /// Empty hand.
    pub fn new() -> Self {
        Self { cards: Vec::new() }
    }

    /// Hand from existing cards.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Add a card.
    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Cards in deal order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// No cards held.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Best blackjack total for this hand.
    pub fn score(&self) -> u32 {
        score(&self.cards)
    }

    /// Total exceeds 21.
    pub fn is_bust(&self) -> bool {
        self.score() > BLACKJACK
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.cards.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}] ({})", labels.join(" "), self.score())
    }
}

/// Score a set of cards.
///
/// Every Ace starts at 11; while the total is over 21 and an Ace is still
/// high, one Ace drops to 1. `[A, A, 9]` scores 21, `[A, A, A, 9]` scores 12.
pub fn score(cards: &[Card]) -> u32 {
    let mut total: u32 = cards.iter().map(Card::points).sum();
    let mut high_aces = cards.iter().filter(|c| c.is_ace()).count();

    while total > BLACKJACK && high_aces > 0 {
        total -= 10;
        high_aces -= 1;
    }

    total
}
