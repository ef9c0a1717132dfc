use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Mode, PlayerId};

/// Rating every player starts a mode with
pub const DEFAULT_ELO: i32 = 1000;

/// Per-mode skill rating of a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub player: PlayerId,
    pub mode: Mode,
    pub elo: i32,
    pub matches: i32,
    pub wins: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(player: PlayerId, mode: Mode, now: DateTime<Utc>) -> Self {
        Self {
            player,
            mode,
            elo: DEFAULT_ELO,
            matches: 0,
            wins: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Win percentage rounded to one decimal, 0 when no matches were played
    pub fn win_rate(&self) -> f64 {
        if self.matches <= 0 {
            return 0.0;
        }
        (f64::from(self.wins) / f64::from(self.matches) * 1000.0).round() / 10.0
    }
}

/// One row of a mode leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player: PlayerId,
    pub elo: i32,
    pub matches: i32,
    pub wins: i32,
    pub win_rate: f64,
    /// Player holds an active leaderboard highlight perk
    pub highlighted: bool,
}

/// Position of a player within a mode leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRank {
    pub rank: usize,
    pub total: usize,
}

/// Rating after one recorded match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EloPoint {
    pub at: DateTime<Utc>,
    pub elo: i32,
}
