use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque external identity of a player (the chat user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Player record with its token balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub tokens: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Player {
    pub fn new(id: PlayerId, tokens: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            tokens,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Balances after a token transfer between two players
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from: PlayerId,
    pub to: PlayerId,
    pub amount: i64,
    pub from_balance: i64,
    pub to_balance: i64,
}
