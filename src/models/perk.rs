use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PlayerId;

/// Longest accepted taunt, in characters
pub const MAX_TAUNT_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerkType {
    /// Highlights the player's name on the leaderboard
    Highlight,
    /// Custom message shown when the player wins a match
    Taunt,
}

impl PerkType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "highlight" => Some(PerkType::Highlight),
            "taunt" => Some(PerkType::Taunt),
            _ => None,
        }
    }
}

impl std::fmt::Display for PerkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerkType::Highlight => write!(f, "highlight"),
            PerkType::Taunt => write!(f, "taunt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perk {
    pub player: PlayerId,
    pub perk_type: PerkType,
    pub data: Option<String>,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Perk {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at >= now)
    }
}
