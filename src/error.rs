use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Mode, PlayerId};

/// Broad failure classes every ladder operation maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Conflict,
    InsufficientFunds,
    InvalidArgument,
    /// Storage failed while committing; the caller may retry.
    Transient,
}

/// Domain errors raised by the ladder services
#[derive(Debug, Error)]
pub enum LadderError {
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Match not found: {0}")]
    MatchNotFound(Uuid),

    #[error("No recorded result for match {0}")]
    HistoryNotFound(Uuid),

    #[error("{player} is not a participant of match {match_id}")]
    NotParticipant { match_id: Uuid, player: PlayerId },

    #[error("{0} is not in an active match")]
    NotInMatch(PlayerId),

    #[error("{0} is not in a queue or an active match")]
    NotInQueueOrMatch(PlayerId),

    #[error("Match {0} is not active")]
    MatchNotActive(Uuid),

    #[error("{player} is already queued for {mode}")]
    AlreadyQueued { player: PlayerId, mode: Mode },

    #[error("{0} is already in an active match")]
    AlreadyInMatch(PlayerId),

    #[error("{bettor} already placed a bet on match {match_id}")]
    DuplicateBet { bettor: PlayerId, match_id: Uuid },

    #[error("Cannot bet on yourself")]
    SelfBet,

    #[error("Cannot bet on your current opponent")]
    BetOnOpponent,

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LadderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LadderError::PlayerNotFound(_)
            | LadderError::MatchNotFound(_)
            | LadderError::HistoryNotFound(_)
            | LadderError::NotParticipant { .. }
            | LadderError::NotInMatch(_)
            | LadderError::NotInQueueOrMatch(_) => ErrorKind::NotFound,
            LadderError::MatchNotActive(_) => ErrorKind::InvalidState,
            LadderError::AlreadyQueued { .. }
            | LadderError::AlreadyInMatch(_)
            | LadderError::DuplicateBet { .. }
            | LadderError::SelfBet
            | LadderError::BetOnOpponent => ErrorKind::Conflict,
            LadderError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LadderError::InvalidAmount(_)
            | LadderError::UnknownMode(_)
            | LadderError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LadderError::Storage(_) => ErrorKind::Transient,
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        LadderError::InvalidArgument(msg.into())
    }
}

impl From<sqlx::Error> for LadderError {
    fn from(e: sqlx::Error) -> Self {
        LadderError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LadderError::MatchNotFound(Uuid::new_v4()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LadderError::MatchNotActive(Uuid::new_v4()).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(LadderError::SelfBet.kind(), ErrorKind::Conflict);
        assert_eq!(
            LadderError::InsufficientFunds {
                balance: 1,
                required: 2
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(LadderError::InvalidAmount(0).kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            LadderError::Storage("connection reset".into()).kind(),
            ErrorKind::Transient
        );
    }
}
