use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PlayerId;

/// Winning bets pay back this multiple of the stake
pub const PAYOUT_MULTIPLIER: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Open,
    Won,
    Lost,
    Refunded,
}

impl BetStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "open" => Some(BetStatus::Open),
            "won" => Some(BetStatus::Won),
            "lost" => Some(BetStatus::Lost),
            "refunded" => Some(BetStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetStatus::Open => write!(f, "open"),
            BetStatus::Won => write!(f, "won"),
            BetStatus::Lost => write!(f, "lost"),
            BetStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// A side-bet on a match outcome. The stake is escrowed when placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub match_id: Uuid,
    pub bettor: PlayerId,
    pub side: PlayerId,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
    pub status: BetStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Bet {
    pub fn is_resolved(&self) -> bool {
        self.status != BetStatus::Open
    }

    /// Tokens credited to the bettor when the bet was settled
    pub fn payout(&self) -> i64 {
        match self.status {
            BetStatus::Won => self.amount * PAYOUT_MULTIPLIER,
            _ => 0,
        }
    }
}

/// Outcome of settling one bet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetSettlement {
    pub bet_id: Uuid,
    pub bettor: PlayerId,
    pub amount: i64,
    pub won: bool,
    pub payout: i64,
}

/// Balance correction applied to a bettor when a bet is voided.
/// `credited` is negative when a payout had to be clawed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRefund {
    pub bet_id: Uuid,
    pub bettor: PlayerId,
    pub credited: i64,
}
