use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Match, Mode, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Waiting,
    Matched,
    Left,
}

impl QueueState {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(QueueState::Waiting),
            "matched" => Some(QueueState::Matched),
            "left" => Some(QueueState::Left),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueState::Waiting => write!(f, "waiting"),
            QueueState::Matched => write!(f, "matched"),
            QueueState::Left => write!(f, "left"),
        }
    }
}

/// A player's place in one mode's queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub player: PlayerId,
    pub mode: Mode,
    pub state: QueueState,
    pub queued_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub fn waiting(player: PlayerId, mode: Mode, now: DateTime<Utc>) -> Self {
        Self {
            player,
            mode,
            state: QueueState::Waiting,
            queued_at: now,
            matched_at: None,
            left_at: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.state == QueueState::Waiting
    }

    pub fn mark_matched(&mut self, now: DateTime<Utc>) {
        self.state = QueueState::Matched;
        self.matched_at = Some(now);
    }

    pub fn mark_left(&mut self, now: DateTime<Utc>) {
        self.state = QueueState::Left;
        self.left_at = Some(now);
    }
}

/// Result of joining a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueOutcome {
    pub entry: QueueEntry,
    /// Players still waiting in the mode after any pairing
    pub waiting: usize,
    pub paired: Option<Match>,
    pub warnings: Vec<String>,
}

/// Result of leaving a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DequeueOutcome {
    Left { entry: QueueEntry },
    NotQueued,
}

/// Where a player currently stands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub player: PlayerId,
    pub queued: Vec<Mode>,
    pub active_match: Option<Match>,
}
