//! Basic-strategy hint shown to the player before each decision.
//!
//! Pure lookup on the player's total and the dealer's up card. The host
//! never consults it.

use super::round::Decision;
use crate::core::card::Card;

/// Suggested move for `player_total` against `dealer_up`.
///
/// Stand on 17+, hit on 11 or less. On 12..=16 stand against a weak
/// dealer card (2..=6) and hit otherwise.
pub fn advise(player_total: u32, dealer_up: Card) -> Decision {
    match player_total {
        t if t >= 17 => Decision::Stand,
        t if t <= 11 => Decision::Hit,
        _ if (2..=6).contains(&dealer_up.points()) => Decision::Stand,
        _ => Decision::Hit,
    }
}
