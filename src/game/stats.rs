//! Per-session aggregate statistics.
//!
//! Owned by whichever session task keeps them; never shared.

use serde::{Deserialize, Serialize};

use super::events::Outcome;
use super::round::Decision;

/// Running totals for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Completed rounds.
    pub rounds_played: u32,
    /// Rounds won.
    pub wins: u32,
    /// Rounds lost.
    pub losses: u32,
    /// Rounds tied.
    pub ties: u32,
    /// Losses caused by the player going over 21.
    pub player_busts: u32,
    /// Wins caused by the dealer going over 21.
    pub dealer_busts: u32,
    /// Hit decisions.
    pub hits: u32,
    /// Stand decisions.
    pub stands: u32,
}

impl SessionStats {
    /// Empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a decision.
    pub fn record_decision(&mut self, decision: Decision) {
        match decision {
            Decision::Hit => self.hits += 1,
            Decision::Stand => self.stands += 1,
        }
    }

    /// Count a finished round. `bust` marks a round closed by a bust card.
    pub fn record_round(&mut self, outcome: Outcome, bust: bool) {
        self.rounds_played += 1;
        match outcome {
            Outcome::Win => {
                self.wins += 1;
                if bust {
                    self.dealer_busts += 1;
                }
            }
            Outcome::Loss => {
                self.losses += 1;
                if bust {
                    self.player_busts += 1;
                }
            }
            Outcome::Tie => self.ties += 1,
        }
    }

    /// Wins over rounds played, 0 when nothing was played.
    pub fn win_rate(&self) -> f64 {
        if self.rounds_played == 0 {
            0.0
        } else {
            self.wins as f64 / self.rounds_played as f64
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
