//! Game Logic Module
//!
//! Blackjack rules. No I/O; the network layer feeds decisions in and
//! writes the returned events out.
//!
//! ## Module Structure
//!
//! - `round`: Round state machine (deal, player turn, dealer turn, outcome)
//! - `events`: Events a round emits, in wire order
//! - `advice`: Basic-strategy hint for the player side
//! - `stats`: Per-session aggregates

pub mod advice;
pub mod events;
pub mod round;
pub mod stats;

// Re-export key types
pub use advice::advise;
pub use events::{Outcome, Party, RoundEvent};
pub use round::{Decision, Round, RoundError, RoundOutcome, RoundPhase};
pub use stats::SessionStats;
