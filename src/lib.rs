//! # Blackjack Table
//!
//! LAN blackjack: a host advertises a table over UDP and deals one
//! session per TCP connection using a fixed-layout binary protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     BLACKJACK TABLE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                           │
//! │  ├── rng.rs      - Seedable Xoroshiro128+ PRNG               │
//! │  ├── card.rs     - Card, suit, point values                  │
//! │  ├── hand.rs     - Soft/hard hand scoring                    │
//! │  └── deck.rs     - 52-card deck with reshuffle threshold     │
//! │                                                              │
//! │  game/           - Rules (no I/O)                            │
//! │  ├── round.rs    - Round state machine                       │
//! │  ├── events.rs   - Events a round emits, in wire order       │
//! │  ├── advice.rs   - Basic-strategy hint                       │
//! │  └── stats.rs    - Session statistics                        │
//! │                                                              │
//! │  network/        - Sockets                                   │
//! │  ├── protocol.rs - Wire codec                                │
//! │  ├── transport.rs- Exact-size framed reads with deadline     │
//! │  ├── session.rs  - Host session per connection               │
//! │  ├── player.rs   - Player session                            │
//! │  ├── discovery.rs- Offer broadcast and seek                  │
//! │  └── server.rs   - Accept loop                               │
//! │                                                              │
//! │  presenter.rs    - Hooks the player session reports through  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Session Flow
//!
//! 1. Host broadcasts an `Offer` every [`BROADCAST_INTERVAL`] on [`DISCOVERY_PORT`]
//! 2. Player takes the first valid offer and connects over TCP
//! 3. Player sends a `Request` with a round count and team name
//! 4. Each round: three face-up cards, then Hit/Stand until stand or bust,
//!    then the dealer draws to [`DEALER_STAND_SCORE`]
//! 5. Exactly one result code closes each round; the host closes the
//!    connection after the last one
//!
//! Any malformed message ends the session immediately.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

use std::time::Duration;

pub mod core;
pub mod game;
pub mod network;
pub mod presenter;

// Re-export commonly used types
pub use crate::core::{Card, Deck, DeterministicRng, Hand, Suit};
pub use crate::game::{Decision, Outcome, Round, SessionStats};
pub use crate::network::{HostConfig, PlayerConfig, PlayerSession, TableServer};
pub use crate::presenter::{CardOwner, Presenter};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// First four bytes of every message, both directions.
pub const MAGIC_COOKIE: u32 = 0xABCD_DCBA;

/// Well-known UDP port for offers.
pub const DISCOVERY_PORT: u16 = 13122;

/// A deck with fewer cards than this is rebuilt before the next draw.
pub const RESHUFFLE_THRESHOLD: usize = 5;

/// Dealer stops drawing at this total.
pub const DEALER_STAND_SCORE: u32 = 17;

/// Best hand total; anything above busts.
pub const BLACKJACK: u32 = 21;

/// Time between offers.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// How long the host waits for a handshake or decision.
pub const HOST_RECV_TIMEOUT: Duration = Duration::from_secs(120);
