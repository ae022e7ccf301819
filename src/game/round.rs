//! Round State Machine
//!
//! One round of blackjack against the house:
//!
//! ```text
//! Dealing ──► PlayerTurn ──Stand──► DealerTurn ──► Resolved
//!                 │                     │
//!                 └─Hit past 21─────────┴─dealer past 21──► Resolved
//! ```
//!
//! The round never does I/O. [`Round::deal`] and [`Round::apply`] return
//! the events to send, in order; the session writes them to the wire.
//! The dealer's second card stays hidden until the player stands.

use thiserror::Error;
use tracing::debug;

use super::events::{Outcome, Party, RoundEvent};
use crate::core::deck::Deck;
use crate::core::hand::Hand;
use crate::{BLACKJACK, DEALER_STAND_SCORE};

/// Player decision during the player turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Take another card.
    Hit,
    /// End the player turn.
    Stand,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Hit => f.write_str("Hit"),
            Decision::Stand => f.write_str("Stand"),
        }
    }
}

/// Round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Created, nothing dealt.
    Dealing,
    /// Waiting for Hit/Stand.
    PlayerTurn,
    /// House is drawing.
    DealerTurn,
    /// Outcome sent.
    Resolved,
}

/// Final state of a finished round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Result from the player's side.
    pub outcome: Outcome,
    /// Final player total.
    pub player_score: u32,
    /// Final dealer total (only two cards if the player busted).
    pub dealer_score: u32,
    /// Player went over 21.
    pub player_bust: bool,
    /// Dealer went over 21.
    pub dealer_bust: bool,
}

/// Operation attempted in the wrong phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoundError {
    /// `deal` called after the initial deal.
    #[error("initial deal already done (phase {0:?})")]
    AlreadyDealt(RoundPhase),

    /// Decision applied outside the player turn.
    #[error("not the player's turn (phase {0:?})")]
    NotPlayerTurn(RoundPhase),
}

/// One round: a deck, a player hand, a dealer hand.
#[derive(Debug)]
pub struct Round {
    deck: Deck,
    player: Hand,
    dealer: Hand,
    phase: RoundPhase,
    outcome: Option<RoundOutcome>,
}

impl Round {
    /// New round owning `deck`.
    pub fn new(deck: Deck) -> Self {
        Self {
            deck,
            player: Hand::new(),
            dealer: Hand::new(),
            phase: RoundPhase::Dealing,
            outcome: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Player hand.
    pub fn player(&self) -> &Hand {
        &self.player
    }

    /// Dealer hand, including the hidden card.
    pub fn dealer(&self) -> &Hand {
        &self.dealer
    }

    /// Set once the round is resolved.
    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    /// Deal two cards each. Shows both player cards and the dealer's first.
    pub fn deal(&mut self) -> Result<Vec<RoundEvent>, RoundError> {
        if self.phase != RoundPhase::Dealing {
            return Err(RoundError::AlreadyDealt(self.phase));
        }

        for _ in 0..2 {
            let card = self.deck.draw();
            self.player.push(card);
        }
        for _ in 0..2 {
            let card = self.deck.draw();
            self.dealer.push(card);
        }

        let shown = [
            (Party::Player, self.player.cards()[0]),
            (Party::Player, self.player.cards()[1]),
            (Party::Dealer, self.dealer.cards()[0]),
        ];

        self.phase = RoundPhase::PlayerTurn;
        debug!(player = %self.player, "initial deal");

        Ok(shown
            .into_iter()
            .map(|(party, card)| RoundEvent::CardDealt {
                party,
                card,
                closes: None,
            })
            .collect())
    }

    /// Apply a player decision.
    ///
    /// Hit returns one event. Stand plays out the whole dealer turn and
    /// returns every remaining event of the round.
    pub fn apply(&mut self, decision: Decision) -> Result<Vec<RoundEvent>, RoundError> {
        if self.phase != RoundPhase::PlayerTurn {
            return Err(RoundError::NotPlayerTurn(self.phase));
        }

        match decision {
            Decision::Hit => Ok(vec![self.player_hit()]),
            Decision::Stand => Ok(self.dealer_turn()),
        }
    }

    fn player_hit(&mut self) -> RoundEvent {
        let card = self.deck.draw();
        self.player.push(card);

        let closes = if self.player.is_bust() {
            self.finish(Outcome::Loss);
            Some(Outcome::Loss)
        } else {
            None
        };

        RoundEvent::CardDealt {
            party: Party::Player,
            card,
            closes,
        }
    }

    fn dealer_turn(&mut self) -> Vec<RoundEvent> {
        self.phase = RoundPhase::DealerTurn;

        let mut events = vec![RoundEvent::CardDealt {
            party: Party::Dealer,
            card: self.dealer.cards()[1],
            closes: None,
        }];

        while self.dealer.score() < DEALER_STAND_SCORE {
            let card = self.deck.draw();
            self.dealer.push(card);

            if self.dealer.is_bust() {
                self.finish(Outcome::Win);
                events.push(RoundEvent::CardDealt {
                    party: Party::Dealer,
                    card,
                    closes: Some(Outcome::Win),
                });
                return events;
            }

            events.push(RoundEvent::CardDealt {
                party: Party::Dealer,
                card,
                closes: None,
            });
        }

        let outcome = compare(self.player.score(), self.dealer.score());
        self.finish(outcome);
        events.push(RoundEvent::Resolved { outcome });
        events
    }

    fn finish(&mut self, outcome: Outcome) {
        let player_score = self.player.score();
        let dealer_score = self.dealer.score();
        self.outcome = Some(RoundOutcome {
            outcome,
            player_score,
            dealer_score,
            player_bust: player_score > BLACKJACK,
            dealer_bust: dealer_score > BLACKJACK,
        });
        self.phase = RoundPhase::Resolved;
    }
}

/// Compare final totals of two standing hands.
pub fn compare(player_score: u32, dealer_score: u32) -> Outcome {
    use std::cmp::Ordering;

    match player_score.cmp(&dealer_score) {
        Ordering::Greater => Outcome::Win,
        Ordering::Less => Outcome::Loss,
        Ordering::Equal => Outcome::Tie,
    }
}
