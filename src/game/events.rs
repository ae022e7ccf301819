//! Round Events
//!
//! Everything a round shows the player, in the order it must be sent.

use crate::core::card::Card;

/// Who holds a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Party {
    /// The remote player.
    Player,
    /// The house.
    Dealer,
}

/// How a round ended, from the player's side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Equal totals.
    Tie,
    /// Player busted or scored lower.
    Loss,
    /// Dealer busted or scored lower.
    Win,
}

/// One observable step of a round.
///
/// A round emits exactly one closing event: either a [`RoundEvent::CardDealt`]
/// with `closes` set (player bust, dealer bust) or a [`RoundEvent::Resolved`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundEvent {
    /// A face-up card. `closes` is set when this card ends the round.
    CardDealt {
        /// Owner of the card.
        party: Party,
        /// The card.
        card: Card,
        /// Outcome decided by this card, if any.
        closes: Option<Outcome>,
    },

    /// Both parties stood; totals were compared.
    Resolved {
        /// Final outcome.
        outcome: Outcome,
    },
}

impl RoundEvent {
    /// Outcome carried by this event, if it ends the round.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            RoundEvent::CardDealt { closes, .. } => *closes,
            RoundEvent::Resolved { outcome } => Some(*outcome),
        }
    }
}
