//! Presentation seam for the player side.
//!
//! The session calls these hooks in wire order and never inspects what
//! the presenter does with them. Rendering, prompts and input handling
//! live entirely behind this trait.

use std::net::SocketAddr;

use crate::core::card::Card;
use crate::game::events::{Outcome, Party};
use crate::game::round::Decision;
use crate::game::stats::SessionStats;

/// Whose card is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardOwner {
    /// The local player.
    Player,
    /// The dealer.
    Dealer,
    /// No owner label; the card is shown bare.
    Unlabeled,
}

impl From<Party> for CardOwner {
    fn from(party: Party) -> Self {
        match party {
            Party::Player => CardOwner::Player,
            Party::Dealer => CardOwner::Dealer,
        }
    }
}

/// Collaborator driven by [`crate::network::player::PlayerSession`].
///
/// `requested_round_count` and `player_decision` may block; the session
/// waits on them.
pub trait Presenter {
    /// A host advertised itself.
    fn on_offer_received(&mut self, addr: SocketAddr, name: &str);

    /// Round `round` (1-based) is about to be dealt.
    fn on_round_start(&mut self, round: u32);

    /// A card became visible.
    fn on_card_dealt(&mut self, card: Card, owner: CardOwner);

    /// Basic-strategy hint before the next decision.
    fn on_advice_available(&mut self, suggestion: Decision);

    /// The round closed.
    fn on_round_result(&mut self, outcome: Outcome);

    /// Running totals after each round.
    fn on_session_stats(&mut self, stats: &SessionStats);

    /// The session failed.
    fn on_error(&mut self, message: &str);

    /// The session ended normally.
    fn on_session_end(&mut self) {}

    /// How many rounds to ask the host for.
    fn requested_round_count(&mut self) -> u8;

    /// Next move for the current hand.
    fn player_decision(&mut self) -> Decision;
}

impl<P: Presenter + ?Sized> Presenter for &mut P {
    fn on_offer_received(&mut self, addr: SocketAddr, name: &str) {
        (**self).on_offer_received(addr, name)
    }

    fn on_round_start(&mut self, round: u32) {
        (**self).on_round_start(round)
    }

    fn on_card_dealt(&mut self, card: Card, owner: CardOwner) {
        (**self).on_card_dealt(card, owner)
    }

    fn on_advice_available(&mut self, suggestion: Decision) {
        (**self).on_advice_available(suggestion)
    }

    fn on_round_result(&mut self, outcome: Outcome) {
        (**self).on_round_result(outcome)
    }

    fn on_session_stats(&mut self, stats: &SessionStats) {
        (**self).on_session_stats(stats)
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message)
    }

    fn on_session_end(&mut self) {
        (**self).on_session_end()
    }

    fn requested_round_count(&mut self) -> u8 {
        (**self).requested_round_count()
    }

    fn player_decision(&mut self) -> Decision {
        (**self).player_decision()
    }
}
