use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::config::LadderConfig;
use crate::error::LadderError;
use crate::models::{Perk, PerkType, PlayerId, MAX_TAUNT_LEN};
use crate::service::ledger_service::debit;
use crate::store::{Store, Tables};

/// Token shop: leaderboard highlights and victory taunts
#[derive(Clone)]
pub struct PerkService {
    store: Store,
    clock: Arc<dyn Clock>,
    highlight_price: i64,
    highlight_days: i64,
    taunt_price: i64,
}

impl PerkService {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: &LadderConfig) -> Self {
        Self {
            store,
            clock,
            highlight_price: config.highlight_price,
            highlight_days: config.highlight_days,
            taunt_price: config.taunt_price,
        }
    }

    /// Buys (or renews) the leaderboard highlight
    pub async fn buy_highlight(&self, player: &PlayerId) -> Result<Perk, LadderError> {
        let now = self.clock.now();
        let perk = Perk {
            player: player.clone(),
            perk_type: PerkType::Highlight,
            data: None,
            purchased_at: now,
            expires_at: Some(now + Duration::days(self.highlight_days)),
        };
        self.purchase(perk, self.highlight_price, now).await
    }

    /// Buys a taunt shown whenever the player wins, replacing any previous one
    pub async fn buy_taunt(&self, player: &PlayerId, text: &str) -> Result<Perk, LadderError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LadderError::invalid_argument("taunt must not be empty"));
        }
        if text.chars().count() > MAX_TAUNT_LEN {
            return Err(LadderError::invalid_argument(format!(
                "taunt must be at most {} characters",
                MAX_TAUNT_LEN
            )));
        }

        let now = self.clock.now();
        let perk = Perk {
            player: player.clone(),
            perk_type: PerkType::Taunt,
            data: Some(text.to_string()),
            purchased_at: now,
            expires_at: None,
        };
        self.purchase(perk, self.taunt_price, now).await
    }

    async fn purchase(&self, perk: Perk, price: i64, now: DateTime<Utc>) -> Result<Perk, LadderError> {
        let stored = self
            .store
            .transaction(|tables| {
                debit(tables, &perk.player, price, now)?;
                tables.upsert_perk(perk.clone());
                Ok(perk)
            })
            .await?;

        info!(player = %stored.player, perk = %stored.perk_type, price, "Perk purchased");
        Ok(stored)
    }

    /// Perks currently in effect for the player
    pub async fn active_perks(&self, player: &PlayerId) -> Vec<Perk> {
        let now = self.clock.now();
        self.store
            .read(|tables| {
                tables
                    .perks_for(player)
                    .into_iter()
                    .filter(|p| p.is_active(now))
                    .cloned()
                    .collect()
            })
            .await
    }

    /// Removes every perk past its expiry
    pub async fn expire_perks(&self, now: DateTime<Utc>) -> Result<Vec<Perk>, LadderError> {
        let expired = self
            .store
            .transaction(|tables| {
                let expired: Vec<Perk> = tables.expired_perks(now).into_iter().cloned().collect();
                for perk in &expired {
                    tables.remove_perk(&perk.player, perk.perk_type);
                }
                Ok(expired)
            })
            .await?;

        for perk in &expired {
            info!(player = %perk.player, perk = %perk.perk_type, "Perk expired");
        }
        Ok(expired)
    }
}

/// The player's taunt, if they own one
pub fn taunt_in(tables: &Tables, player: &PlayerId, now: DateTime<Utc>) -> Option<String> {
    tables
        .perk(player, PerkType::Taunt)
        .filter(|p| p.is_active(now))
        .and_then(|p| p.data.clone())
}

/// Whether the player is highlighted on leaderboards
pub fn is_highlighted_in(tables: &Tables, player: &PlayerId, now: DateTime<Utc>) -> bool {
    tables
        .perk(player, PerkType::Highlight)
        .is_some_and(|p| p.is_active(now))
}
