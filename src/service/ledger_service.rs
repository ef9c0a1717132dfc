use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::error::LadderError;
use crate::models::{Player, PlayerId, TransferReceipt};
use crate::store::{Store, Tables};

/// Adds tokens to an existing player, returning the new balance
pub fn credit(
    tables: &mut Tables,
    player: &PlayerId,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<i64, LadderError> {
    if amount < 0 {
        return Err(LadderError::InvalidAmount(amount));
    }
    let record = tables.player_mut(player)?;
    record.tokens = record.tokens.saturating_add(amount);
    record.updated_at = now;
    Ok(record.tokens)
}

/// Removes tokens from an existing player, returning the new balance
pub fn debit(
    tables: &mut Tables,
    player: &PlayerId,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<i64, LadderError> {
    if amount < 0 {
        return Err(LadderError::InvalidAmount(amount));
    }
    let record = tables.player_mut(player)?;
    if record.tokens < amount {
        return Err(LadderError::InsufficientFunds {
            balance: record.tokens,
            required: amount,
        });
    }
    record.tokens -= amount;
    record.updated_at = now;
    Ok(record.tokens)
}

/// Player records and token balances
#[derive(Clone)]
pub struct LedgerService {
    store: Store,
    clock: Arc<dyn Clock>,
    starting_tokens: i64,
}

impl LedgerService {
    pub fn new(store: Store, clock: Arc<dyn Clock>, starting_tokens: i64) -> Self {
        Self {
            store,
            clock,
            starting_tokens,
        }
    }

    /// Returns the player, creating it with the starting balance on first contact
    pub async fn register(&self, player: &PlayerId) -> Result<Player, LadderError> {
        let now = self.clock.now();
        let starting_tokens = self.starting_tokens;
        self.store
            .transaction(|tables| Ok(tables.ensure_player(player, starting_tokens, now).clone()))
            .await
    }

    pub async fn balance(&self, player: &PlayerId) -> Result<i64, LadderError> {
        self.store
            .read(|tables| tables.player(player).map(|p| p.tokens))
            .await
            .ok_or_else(|| LadderError::PlayerNotFound(player.clone()))
    }

    /// Moves tokens between players; the recipient is created on demand
    pub async fn transfer(
        &self,
        from: &PlayerId,
        to: &PlayerId,
        amount: i64,
    ) -> Result<TransferReceipt, LadderError> {
        if amount <= 0 {
            return Err(LadderError::InvalidAmount(amount));
        }
        if from == to {
            return Err(LadderError::invalid_argument("cannot transfer tokens to yourself"));
        }

        let now = self.clock.now();
        let starting_tokens = self.starting_tokens;
        let receipt = self
            .store
            .transaction(|tables| {
                let from_balance = debit(tables, from, amount, now)?;
                tables.ensure_player(to, starting_tokens, now);
                let to_balance = credit(tables, to, amount, now)?;
                Ok(TransferReceipt {
                    from: from.clone(),
                    to: to.clone(),
                    amount,
                    from_balance,
                    to_balance,
                })
            })
            .await?;

        info!(from = %from, to = %to, amount, "Tokens transferred");
        Ok(receipt)
    }

    /// Overwrites a balance (administrative)
    pub async fn set_balance(&self, player: &PlayerId, amount: i64) -> Result<Player, LadderError> {
        if amount < 0 {
            return Err(LadderError::InvalidAmount(amount));
        }

        let now = self.clock.now();
        let updated = self
            .store
            .transaction(|tables| {
                let record = tables.player_mut(player)?;
                record.tokens = amount;
                record.updated_at = now;
                Ok(record.clone())
            })
            .await?;

        info!(player = %player, balance = amount, "Balance set by admin");
        Ok(updated)
    }

    /// Richest players first, ties by id
    pub async fn token_leaderboard(&self, limit: usize) -> Vec<Player> {
        self.store
            .read(|tables| {
                let mut players: Vec<Player> = tables.players().cloned().collect();
                players.sort_by(|a, b| b.tokens.cmp(&a.tokens).then_with(|| a.id.cmp(&b.id)));
                players.truncate(limit);
                players
            })
            .await
    }
}
