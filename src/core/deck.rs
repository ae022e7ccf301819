//! The dealing shoe.
//!
//! A single 52-card deck. When fewer than [`RESHUFFLE_THRESHOLD`] cards
//! remain, the next draw regenerates and reshuffles a complete deck
//! first, so no count carries across a reshuffle and a draw never
//! exhausts the deck.

use super::card::Card;
use super::rng::DeterministicRng;
use crate::RESHUFFLE_THRESHOLD;

/// A shuffled deck that refills itself.
#[derive(Clone, Debug)]
pub struct Deck {
    /// Draw order is back to front.
    cards: Vec<Card>,
    rng: DeterministicRng,
    threshold: usize,
    reshuffles: u32,
}

impl Deck {
    /// Fresh, shuffled 52-card deck.
    pub fn new(rng: DeterministicRng) -> Self {
        Self::with_threshold(rng, RESHUFFLE_THRESHOLD)
    }

    /// Fresh deck with a custom reshuffle threshold.
    pub fn with_threshold(mut rng: DeterministicRng, threshold: usize) -> Self {
        let cards = shuffled(&mut rng);
        Self {
            cards,
            rng,
            threshold,
            reshuffles: 0,
        }
    }

    /// Deck whose first draws are `top`, in order, followed by the rest
    /// of a shuffled deck. Duplicates of `top` are removed from the rest,
    /// so the deck still holds 52 distinct cards when `top` is distinct.
    pub fn stacked(top: &[Card], rng: DeterministicRng) -> Self {
        let mut deck = Self::new(rng);
        deck.cards.retain(|c| !top.contains(c));
        deck.cards.extend(top.iter().rev());
        deck
    }

    /// Draw the next card, reshuffling first if the deck runs low.
    pub fn draw(&mut self) -> Card {
        loop {
            // An empty deck refills even with a zero threshold
            if self.cards.len() < self.threshold.max(1) {
                self.reshuffle();
            }
            if let Some(card) = self.cards.pop() {
                return card;
            }
        }
    }

    /// Cards left before the next refill.
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    /// Number of times the deck has been regenerated.
    pub fn reshuffles(&self) -> u32 {
        self.reshuffles
    }

    fn reshuffle(&mut self) {
        self.cards = shuffled(&mut self.rng);
        self.reshuffles += 1;
    }
}

fn shuffled(rng: &mut DeterministicRng) -> Vec<Card> {
    let mut cards = Card::full_deck();
    rng.shuffle(&mut cards);
    cards
}
