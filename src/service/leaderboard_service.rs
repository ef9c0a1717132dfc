use std::sync::Arc;

use crate::clock::Clock;
use crate::error::LadderError;
use crate::models::{LeaderboardEntry, Mode, PlayerId, PlayerRank, Rating};
use crate::service::perk_service::is_highlighted_in;
use crate::store::{Store, Tables};

/// Per-mode standings derived from ratings
#[derive(Clone)]
pub struct LeaderboardService {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl LeaderboardService {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Top `limit` players of a mode by elo
    pub async fn leaderboard(&self, mode: Mode, limit: usize) -> Vec<LeaderboardEntry> {
        let now = self.clock.now();
        self.store
            .read(|tables| {
                ranked(tables, mode)
                    .into_iter()
                    .take(limit)
                    .enumerate()
                    .map(|(i, rating)| LeaderboardEntry {
                        rank: i + 1,
                        player: rating.player.clone(),
                        elo: rating.elo,
                        matches: rating.matches,
                        wins: rating.wins,
                        win_rate: rating.win_rate(),
                        highlighted: is_highlighted_in(tables, &rating.player, now),
                    })
                    .collect()
            })
            .await
    }

    /// 1-based position of the player in a mode, with the number of ranked players
    pub async fn rank(&self, player: &PlayerId, mode: Mode) -> Result<PlayerRank, LadderError> {
        self.store
            .read(|tables| {
                let ratings = ranked(tables, mode);
                ratings
                    .iter()
                    .position(|r| &r.player == player)
                    .map(|i| PlayerRank {
                        rank: i + 1,
                        total: ratings.len(),
                    })
            })
            .await
            .ok_or_else(|| LadderError::PlayerNotFound(player.clone()))
    }

    /// The player's rating in every mode they have joined
    pub async fn ratings_for(&self, player: &PlayerId) -> Result<Vec<Rating>, LadderError> {
        self.store
            .read(|tables| {
                tables.player(player)?;
                Some(
                    Mode::ALL
                        .into_iter()
                        .filter_map(|mode| tables.rating(player, mode).cloned())
                        .collect(),
                )
            })
            .await
            .ok_or_else(|| LadderError::PlayerNotFound(player.clone()))
    }
}

fn ranked(tables: &Tables, mode: Mode) -> Vec<&Rating> {
    let mut ratings = tables.ratings_for_mode(mode);
    ratings.sort_by(|a, b| {
        b.elo
            .cmp(&a.elo)
            .then_with(|| b.wins.cmp(&a.wins))
            .then_with(|| a.player.cmp(&b.player))
    });
    ratings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::models::{Perk, PerkType};
    use chrono::Utc;

    #[tokio::test]
    async fn test_leaderboard_ordering_and_rank() {
        let store = Store::in_memory();
        let now = Utc::now();
        store
            .transaction(|t| {
                for (id, elo) in [("low", 950), ("high", 1100), ("mid", 1000)] {
                    let player = PlayerId::from(id);
                    t.ensure_player(&player, 100, now);
                    t.ensure_rating(&player, Mode::Land, now).elo = elo;
                }
                t.upsert_perk(Perk {
                    player: "mid".into(),
                    perk_type: PerkType::Highlight,
                    data: None,
                    purchased_at: now,
                    expires_at: Some(now + chrono::Duration::days(1)),
                });
                Ok(())
            })
            .await
            .unwrap();
        let service = LeaderboardService::new(store, Arc::new(SystemClock));

        let board = service.leaderboard(Mode::Land, 10).await;
        let order: Vec<&str> = board.iter().map(|e| e.player.as_str()).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
        assert!(board[1].highlighted);
        assert!(!board[0].highlighted);

        let rank = service.rank(&"mid".into(), Mode::Land).await.unwrap();
        assert_eq!(rank, PlayerRank { rank: 2, total: 3 });
        assert!(service.rank(&"mid".into(), Mode::Conquest).await.is_err());
    }
}
