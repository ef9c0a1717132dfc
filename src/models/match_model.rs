use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BetRefund, BetSettlement, Mode, PlayerId, TierChange};

/// Match lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    Resolved,
    Abandoned,
    Reversed,
}

impl MatchStatus {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, to: &MatchStatus) -> bool {
        match (self, to) {
            (MatchStatus::Active, MatchStatus::Resolved) => true,
            (MatchStatus::Active, MatchStatus::Abandoned) => true,
            // Administrative reversal, with or without a corrected result
            (MatchStatus::Resolved, MatchStatus::Reversed) => true,
            (MatchStatus::Resolved, MatchStatus::Resolved) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchStatus::Active)
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "active" => Some(MatchStatus::Active),
            "resolved" => Some(MatchStatus::Resolved),
            "abandoned" => Some(MatchStatus::Abandoned),
            "reversed" => Some(MatchStatus::Reversed),
            _ => None,
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Active => write!(f, "active"),
            MatchStatus::Resolved => write!(f, "resolved"),
            MatchStatus::Abandoned => write!(f, "abandoned"),
            MatchStatus::Reversed => write!(f, "reversed"),
        }
    }
}

/// A head-to-head match. Participant order is random and only used for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub mode: Mode,
    /// Discussion thread opened by the match-space provisioner
    pub session_ref: Option<String>,
    pub maps: Vec<String>,
    pub message_ref: Option<String>,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn new(
        player1: PlayerId,
        player2: PlayerId,
        mode: Mode,
        maps: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            player1,
            player2,
            mode,
            session_ref: None,
            maps,
            message_ref: None,
            status: MatchStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }

    pub fn involves(&self, player: &PlayerId) -> bool {
        &self.player1 == player || &self.player2 == player
    }

    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        if &self.player1 == player {
            Some(&self.player2)
        } else if &self.player2 == player {
            Some(&self.player1)
        } else {
            None
        }
    }

    pub fn participants(&self) -> [&PlayerId; 2] {
        [&self.player1, &self.player2]
    }
}

/// Recorded result of a match, with both rating snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchHistoryRecord {
    pub id: Uuid,
    pub match_id: Uuid,
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub winner: PlayerId,
    pub mode: Mode,
    pub elo_before_winner: i32,
    pub elo_after_winner: i32,
    pub elo_before_loser: i32,
    pub elo_after_loser: i32,
    pub recorded_at: DateTime<Utc>,
    /// Replaced by a corrected result during reversal
    pub superseded: bool,
}

impl MatchHistoryRecord {
    pub fn loser(&self) -> &PlayerId {
        if self.winner == self.player1 {
            &self.player2
        } else {
            &self.player1
        }
    }

    pub fn involves(&self, player: &PlayerId) -> bool {
        &self.player1 == player || &self.player2 == player
    }

    /// Rating the player held right after this match
    pub fn elo_after_for(&self, player: &PlayerId) -> Option<i32> {
        if &self.winner == player {
            Some(self.elo_after_winner)
        } else if self.involves(player) {
            Some(self.elo_after_loser)
        } else {
            None
        }
    }

    /// Rating the player held right before this match
    pub fn elo_before_for(&self, player: &PlayerId) -> Option<i32> {
        if &self.winner == player {
            Some(self.elo_before_winner)
        } else if self.involves(player) {
            Some(self.elo_before_loser)
        } else {
            None
        }
    }
}

/// Everything committed by resolving a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub match_record: Match,
    pub history: MatchHistoryRecord,
    pub bets: Vec<BetSettlement>,
    pub tiers: TierChange,
    /// Winner's custom taunt, if they own one
    pub taunt: Option<String>,
    pub warnings: Vec<String>,
}

impl ResolutionResult {
    pub fn winner_delta(&self) -> i32 {
        self.history.elo_after_winner - self.history.elo_before_winner
    }

    pub fn loser_delta(&self) -> i32 {
        self.history.elo_after_loser - self.history.elo_before_loser
    }
}

/// Everything committed by abandoning a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbandonResult {
    pub match_record: Match,
    pub refunds: Vec<BetRefund>,
    pub warnings: Vec<String>,
}

/// Everything committed by an administrative reversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalResult {
    pub match_record: Match,
    pub reverted: MatchHistoryRecord,
    pub replacement: Option<MatchHistoryRecord>,
    pub refunds: Vec<BetRefund>,
    pub tier_changes: Vec<(PlayerId, TierChange)>,
    pub warnings: Vec<String>,
}
