//! Durable backing for the state store.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row as _, Transaction};
use tracing::{info, instrument};

use super::tables::{Change, Row, RowKey, Tables};
use crate::db::DbPool;
use crate::error::LadderError;
use crate::models::*;

/// Persists committed row changes and restores them on startup
#[async_trait]
pub trait Journal: Send + Sync {
    /// Reads the full persisted state
    async fn load(&self) -> Result<Tables, LadderError>;

    /// Applies changes atomically: either every change is persisted or none is
    async fn apply(&self, changes: &[Change]) -> Result<(), LadderError>;
}

/// Journal writing into the Postgres ladder schema
#[derive(Clone)]
pub struct PgJournal {
    pool: DbPool,
}

impl PgJournal {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Journal for PgJournal {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<Tables, LadderError> {
        let mut tables = Tables::default();
        let mut loaded = 0usize;

        let queries: [(&str, fn(&PgRow) -> Result<Row, LadderError>); 8] = [
            ("SELECT id, tokens, created_at, updated_at FROM players", player_row),
            (
                "SELECT player_id, mode_id, elo, matches, wins, created_at, updated_at FROM player_ratings",
                rating_row,
            ),
            (
                "SELECT player_id, mode_id, state, queued_at, matched_at, left_at FROM queue_entries",
                queue_row,
            ),
            (
                r#"SELECT id, player1, player2, mode_id, session_ref, maps, message_ref,
                          status, created_at, updated_at
                   FROM matches"#,
                match_row,
            ),
            (
                r#"SELECT id, match_id, player1, player2, winner, mode_id,
                          elo_before_winner, elo_after_winner, elo_before_loser, elo_after_loser,
                          recorded_at, superseded
                   FROM match_history"#,
                history_row,
            ),
            (
                "SELECT id, match_id, bettor, side, amount, placed_at, status, resolved_at FROM bets",
                bet_row,
            ),
            (
                "SELECT id, player_id, tier_name, role_marker, awarded_at, expires_at FROM user_rewards",
                reward_row,
            ),
            (
                "SELECT player_id, perk_type, data, purchased_at, expires_at FROM player_perks",
                perk_row,
            ),
        ];

        for (sql, decode) in queries {
            let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
            for row in &rows {
                tables.load_row(decode(row)?);
            }
            loaded += rows.len();
        }

        info!(rows = loaded, "Loaded ladder state from database");
        Ok(tables)
    }

    async fn apply(&self, changes: &[Change]) -> Result<(), LadderError> {
        let mut tx = self.pool.begin().await?;
        for change in changes {
            match change {
                Change::Upsert(row) => upsert(&mut tx, row).await?,
                Change::Delete(key) => delete(&mut tx, key).await?,
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// WRITES
// =============================================================================

async fn upsert(tx: &mut Transaction<'_, Postgres>, row: &Row) -> Result<(), sqlx::Error> {
    match row {
        Row::Player(p) => {
            sqlx::query(
                r#"
                INSERT INTO players (id, tokens, created_at, updated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET tokens = EXCLUDED.tokens, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(p.id.as_str())
            .bind(p.tokens)
            .bind(p.created_at)
            .bind(p.updated_at)
            .execute(&mut **tx)
            .await?;
        }
        Row::Rating(r) => {
            sqlx::query(
                r#"
                INSERT INTO player_ratings (player_id, mode_id, elo, matches, wins, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (player_id, mode_id) DO UPDATE
                SET elo = EXCLUDED.elo, matches = EXCLUDED.matches, wins = EXCLUDED.wins,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(r.player.as_str())
            .bind(r.mode.key())
            .bind(r.elo)
            .bind(r.matches)
            .bind(r.wins)
            .bind(r.created_at)
            .bind(r.updated_at)
            .execute(&mut **tx)
            .await?;
        }
        Row::QueueEntry(e) => {
            sqlx::query(
                r#"
                INSERT INTO queue_entries (player_id, mode_id, state, queued_at, matched_at, left_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (player_id, mode_id) DO UPDATE
                SET state = EXCLUDED.state, queued_at = EXCLUDED.queued_at,
                    matched_at = EXCLUDED.matched_at, left_at = EXCLUDED.left_at
                "#,
            )
            .bind(e.player.as_str())
            .bind(e.mode.key())
            .bind(e.state.to_string())
            .bind(e.queued_at)
            .bind(e.matched_at)
            .bind(e.left_at)
            .execute(&mut **tx)
            .await?;
        }
        Row::Match(m) => {
            sqlx::query(
                r#"
                INSERT INTO matches (id, player1, player2, mode_id, session_ref, maps, message_ref,
                                     status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE
                SET session_ref = EXCLUDED.session_ref, message_ref = EXCLUDED.message_ref,
                    status = EXCLUDED.status, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(m.id)
            .bind(m.player1.as_str())
            .bind(m.player2.as_str())
            .bind(m.mode.key())
            .bind(&m.session_ref)
            .bind(&m.maps)
            .bind(&m.message_ref)
            .bind(m.status.to_string())
            .bind(m.created_at)
            .bind(m.updated_at)
            .execute(&mut **tx)
            .await?;
        }
        Row::History(h) => {
            sqlx::query(
                r#"
                INSERT INTO match_history (id, match_id, player1, player2, winner, mode_id,
                                           elo_before_winner, elo_after_winner,
                                           elo_before_loser, elo_after_loser,
                                           recorded_at, superseded)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (id) DO UPDATE
                SET superseded = EXCLUDED.superseded
                "#,
            )
            .bind(h.id)
            .bind(h.match_id)
            .bind(h.player1.as_str())
            .bind(h.player2.as_str())
            .bind(h.winner.as_str())
            .bind(h.mode.key())
            .bind(h.elo_before_winner)
            .bind(h.elo_after_winner)
            .bind(h.elo_before_loser)
            .bind(h.elo_after_loser)
            .bind(h.recorded_at)
            .bind(h.superseded)
            .execute(&mut **tx)
            .await?;
        }
        Row::Bet(b) => {
            sqlx::query(
                r#"
                INSERT INTO bets (id, match_id, bettor, side, amount, placed_at, status, resolved_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE
                SET status = EXCLUDED.status, resolved_at = EXCLUDED.resolved_at
                "#,
            )
            .bind(b.id)
            .bind(b.match_id)
            .bind(b.bettor.as_str())
            .bind(b.side.as_str())
            .bind(b.amount)
            .bind(b.placed_at)
            .bind(b.status.to_string())
            .bind(b.resolved_at)
            .execute(&mut **tx)
            .await?;
        }
        Row::Reward(r) => {
            sqlx::query(
                r#"
                INSERT INTO user_rewards (id, player_id, tier_name, role_marker, awarded_at, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE
                SET expires_at = EXCLUDED.expires_at
                "#,
            )
            .bind(r.id)
            .bind(r.player.as_str())
            .bind(&r.tier_name)
            .bind(&r.role_marker)
            .bind(r.awarded_at)
            .bind(r.expires_at)
            .execute(&mut **tx)
            .await?;
        }
        Row::Perk(p) => {
            sqlx::query(
                r#"
                INSERT INTO player_perks (player_id, perk_type, data, purchased_at, expires_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (player_id, perk_type) DO UPDATE
                SET data = EXCLUDED.data, purchased_at = EXCLUDED.purchased_at,
                    expires_at = EXCLUDED.expires_at
                "#,
            )
            .bind(p.player.as_str())
            .bind(p.perk_type.to_string())
            .bind(&p.data)
            .bind(p.purchased_at)
            .bind(p.expires_at)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

async fn delete(tx: &mut Transaction<'_, Postgres>, key: &RowKey) -> Result<(), sqlx::Error> {
    let query = match key {
        RowKey::Player(id) => sqlx::query("DELETE FROM players WHERE id = $1").bind(id.as_str()),
        RowKey::Rating(player, mode) => {
            sqlx::query("DELETE FROM player_ratings WHERE player_id = $1 AND mode_id = $2")
                .bind(player.as_str())
                .bind(mode.key())
        }
        RowKey::QueueEntry(player, mode) => {
            sqlx::query("DELETE FROM queue_entries WHERE player_id = $1 AND mode_id = $2")
                .bind(player.as_str())
                .bind(mode.key())
        }
        RowKey::Match(id) => sqlx::query("DELETE FROM matches WHERE id = $1").bind(*id),
        RowKey::History(id) => sqlx::query("DELETE FROM match_history WHERE id = $1").bind(*id),
        RowKey::Bet(id) => sqlx::query("DELETE FROM bets WHERE id = $1").bind(*id),
        RowKey::Reward(id) => sqlx::query("DELETE FROM user_rewards WHERE id = $1").bind(*id),
        RowKey::Perk(player, perk_type) => {
            sqlx::query("DELETE FROM player_perks WHERE player_id = $1 AND perk_type = $2")
                .bind(player.as_str())
                .bind(perk_type.to_string())
        }
    };
    query.execute(&mut **tx).await?;
    Ok(())
}

// =============================================================================
// DECODING
// =============================================================================

fn mode_column(row: &PgRow, column: &str) -> Result<Mode, LadderError> {
    let key: i16 = row.try_get(column)?;
    Mode::from_key(key).ok_or_else(|| LadderError::Storage(format!("unknown mode id {}", key)))
}

fn player_column(row: &PgRow, column: &str) -> Result<PlayerId, LadderError> {
    let id: String = row.try_get(column)?;
    Ok(PlayerId::from(id))
}

fn decode_enum<T>(value: String, parse: fn(&str) -> Option<T>) -> Result<T, LadderError> {
    parse(&value).ok_or_else(|| LadderError::Storage(format!("unexpected value '{}'", value)))
}

fn player_row(row: &PgRow) -> Result<Row, LadderError> {
    Ok(Row::Player(Player {
        id: player_column(row, "id")?,
        tokens: row.try_get("tokens")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn rating_row(row: &PgRow) -> Result<Row, LadderError> {
    Ok(Row::Rating(Rating {
        player: player_column(row, "player_id")?,
        mode: mode_column(row, "mode_id")?,
        elo: row.try_get("elo")?,
        matches: row.try_get("matches")?,
        wins: row.try_get("wins")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn queue_row(row: &PgRow) -> Result<Row, LadderError> {
    Ok(Row::QueueEntry(QueueEntry {
        player: player_column(row, "player_id")?,
        mode: mode_column(row, "mode_id")?,
        state: decode_enum(row.try_get("state")?, QueueState::from_db)?,
        queued_at: row.try_get("queued_at")?,
        matched_at: row.try_get("matched_at")?,
        left_at: row.try_get("left_at")?,
    }))
}

fn match_row(row: &PgRow) -> Result<Row, LadderError> {
    Ok(Row::Match(Match {
        id: row.try_get("id")?,
        player1: player_column(row, "player1")?,
        player2: player_column(row, "player2")?,
        mode: mode_column(row, "mode_id")?,
        session_ref: row.try_get("session_ref")?,
        maps: row.try_get("maps")?,
        message_ref: row.try_get("message_ref")?,
        status: decode_enum(row.try_get("status")?, MatchStatus::from_db)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn history_row(row: &PgRow) -> Result<Row, LadderError> {
    Ok(Row::History(MatchHistoryRecord {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        player1: player_column(row, "player1")?,
        player2: player_column(row, "player2")?,
        winner: player_column(row, "winner")?,
        mode: mode_column(row, "mode_id")?,
        elo_before_winner: row.try_get("elo_before_winner")?,
        elo_after_winner: row.try_get("elo_after_winner")?,
        elo_before_loser: row.try_get("elo_before_loser")?,
        elo_after_loser: row.try_get("elo_after_loser")?,
        recorded_at: row.try_get("recorded_at")?,
        superseded: row.try_get("superseded")?,
    }))
}

fn bet_row(row: &PgRow) -> Result<Row, LadderError> {
    Ok(Row::Bet(Bet {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        bettor: player_column(row, "bettor")?,
        side: player_column(row, "side")?,
        amount: row.try_get("amount")?,
        placed_at: row.try_get("placed_at")?,
        status: decode_enum(row.try_get("status")?, BetStatus::from_db)?,
        resolved_at: row.try_get("resolved_at")?,
    }))
}

fn reward_row(row: &PgRow) -> Result<Row, LadderError> {
    Ok(Row::Reward(UserReward {
        id: row.try_get("id")?,
        player: player_column(row, "player_id")?,
        tier_name: row.try_get("tier_name")?,
        role_marker: row.try_get("role_marker")?,
        awarded_at: row.try_get("awarded_at")?,
        expires_at: row.try_get("expires_at")?,
    }))
}

fn perk_row(row: &PgRow) -> Result<Row, LadderError> {
    Ok(Row::Perk(Perk {
        player: player_column(row, "player_id")?,
        perk_type: decode_enum(row.try_get("perk_type")?, PerkType::from_db)?,
        data: row.try_get("data")?,
        purchased_at: row.try_get("purchased_at")?,
        expires_at: row.try_get("expires_at")?,
    }))
}
