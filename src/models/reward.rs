use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PlayerId;

/// A win-count gated rank and the external role marker that represents it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTier {
    pub threshold: u32,
    pub name: String,
    pub role_marker: String,
    /// Days the tier is held before it lapses, `None` for permanent
    #[serde(default)]
    pub valid_for_days: Option<i64>,
}

impl RewardTier {
    pub fn new(threshold: u32, name: impl Into<String>, role_marker: impl Into<String>) -> Self {
        Self {
            threshold,
            name: name.into(),
            role_marker: role_marker.into(),
            valid_for_days: None,
        }
    }
}

/// Reward tiers ordered by descending threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardTiers(Vec<RewardTier>);

impl RewardTiers {
    pub fn new(mut tiers: Vec<RewardTier>) -> Self {
        tiers.sort_by(|a, b| b.threshold.cmp(&a.threshold));
        Self(tiers)
    }

    /// The ladder ranks
    pub fn default_ladder() -> Self {
        Self::new(vec![
            RewardTier::new(100, "Grand Knight", "grand-knight"),
            RewardTier::new(90, "Knight Commander", "knight-commander"),
            RewardTier::new(80, "Knight", "knight"),
            RewardTier::new(70, "Baron", "baron"),
            RewardTier::new(60, "Lord", "lord"),
            RewardTier::new(50, "Duke", "duke"),
            RewardTier::new(40, "Count", "count"),
            RewardTier::new(30, "Squire", "squire"),
            RewardTier::new(20, "Knight Apprentice", "knight-apprentice"),
            RewardTier::new(10, "Peasant", "peasant"),
            RewardTier::new(1, "Lucky Beginner", "lucky-beginner"),
        ])
    }

    /// Highest tier whose threshold the win count reaches
    pub fn qualifying(&self, wins: u32) -> Option<&RewardTier> {
        self.0.iter().find(|t| wins >= t.threshold)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RewardTier> {
        self.0.iter()
    }
}

impl Default for RewardTiers {
    fn default() -> Self {
        Self::default_ladder()
    }
}

/// A tier currently held by a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReward {
    pub id: Uuid,
    pub player: PlayerId,
    pub tier_name: String,
    pub role_marker: String,
    pub awarded_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserReward {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Tier to award and held tiers to take away
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
    pub award: Option<RewardTier>,
    pub revoke: Vec<UserReward>,
}

impl TierChange {
    pub fn is_empty(&self) -> bool {
        self.award.is_none() && self.revoke.is_empty()
    }
}
