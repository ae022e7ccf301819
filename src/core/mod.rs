//! Core table primitives.
//!
//! Cards, hands, the dealing shoe, and the RNG that shuffles it.
//! Nothing in here touches a socket.

pub mod card;
pub mod deck;
pub mod hand;
pub mod rng;

// Re-export core types
pub use card::{Card, Suit};
pub use deck::Deck;
pub use hand::{score, Hand};
pub use rng::DeterministicRng;
