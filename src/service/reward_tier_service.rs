use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::LadderError;
use crate::models::{PlayerId, RewardTiers, TierChange, UserReward};
use crate::service::gateway::RoleGrantor;
use crate::store::{Store, Tables};

/// Win-count reward tiers and the role markers that represent them
#[derive(Clone)]
pub struct RewardTierService {
    store: Store,
    clock: Arc<dyn Clock>,
    roles: Arc<dyn RoleGrantor>,
    tiers: Arc<RewardTiers>,
}

impl RewardTierService {
    pub fn new(
        store: Store,
        clock: Arc<dyn Clock>,
        roles: Arc<dyn RoleGrantor>,
        tiers: RewardTiers,
    ) -> Self {
        Self {
            store,
            clock,
            roles,
            tiers: Arc::new(tiers),
        }
    }

    /// What has to change for the player's held tiers to match their win count
    pub fn compute_in(&self, tables: &Tables, player: &PlayerId) -> TierChange {
        let wins = tables.wins_for(player);
        let held: Vec<&UserReward> = tables
            .rewards_for(player)
            .into_iter()
            .filter(|r| self.tiers.contains(&r.tier_name))
            .collect();

        match self.tiers.qualifying(wins) {
            Some(target) if held.iter().any(|r| r.tier_name == target.name) => TierChange::default(),
            Some(target) => TierChange {
                award: Some(target.clone()),
                revoke: held.into_iter().cloned().collect(),
            },
            None => TierChange {
                award: None,
                revoke: held.into_iter().cloned().collect(),
            },
        }
    }

    /// Records a tier change in the reward table
    pub fn apply_in(&self, tables: &mut Tables, player: &PlayerId, change: &TierChange, now: DateTime<Utc>) {
        for reward in &change.revoke {
            tables.remove_reward(reward.id);
        }
        if let Some(tier) = &change.award {
            tables.insert_reward(UserReward {
                id: Uuid::new_v4(),
                player: player.clone(),
                tier_name: tier.name.clone(),
                role_marker: tier.role_marker.clone(),
                awarded_at: now,
                expires_at: tier.valid_for_days.map(|days| now + Duration::days(days)),
            });
        }
    }

    /// Reconciles a player's tiers as one unit of work, then applies the role markers
    pub async fn resolve(&self, player: &PlayerId) -> Result<(TierChange, Vec<String>), LadderError> {
        let now = self.clock.now();
        let change = self
            .store
            .transaction(|tables| {
                if tables.player(player).is_none() {
                    return Err(LadderError::PlayerNotFound(player.clone()));
                }
                let change = self.compute_in(tables, player);
                self.apply_in(tables, player, &change, now);
                Ok(change)
            })
            .await?;

        let warnings = self.sync_roles(player, &change).await;
        Ok((change, warnings))
    }

    /// Pushes a committed tier change to the role grantor. Revocations go first
    /// so a player never shows two tiers at once.
    pub async fn sync_roles(&self, player: &PlayerId, change: &TierChange) -> Vec<String> {
        let mut warnings = Vec::new();

        for reward in &change.revoke {
            if let Err(e) = self.roles.revoke_role(player, &reward.role_marker).await {
                warn!(player = %player, marker = %reward.role_marker, error = %e, "Failed to revoke role");
                warnings.push(format!("could not revoke {} from {}: {}", reward.role_marker, player, e));
            }
        }
        if let Some(tier) = &change.award {
            match self.roles.grant_role(player, &tier.role_marker).await {
                Ok(()) => info!(player = %player, tier = %tier.name, "Reward tier granted"),
                Err(e) => {
                    warn!(player = %player, marker = %tier.role_marker, error = %e, "Failed to grant role");
                    warnings.push(format!("could not grant {} to {}: {}", tier.role_marker, player, e));
                }
            }
        }

        warnings
    }

    pub async fn rewards_for(&self, player: &PlayerId) -> Vec<UserReward> {
        self.store
            .read(|tables| tables.rewards_for(player).into_iter().cloned().collect())
            .await
    }

    /// Drops rewards past their expiry and revokes their markers
    pub async fn expire_rewards(&self, now: DateTime<Utc>) -> Result<(Vec<UserReward>, Vec<String>), LadderError> {
        let expired = self
            .store
            .transaction(|tables| {
                let expired: Vec<UserReward> = tables.expired_rewards(now).into_iter().cloned().collect();
                for reward in &expired {
                    tables.remove_reward(reward.id);
                }
                Ok(expired)
            })
            .await?;

        let mut warnings = Vec::new();
        for reward in &expired {
            info!(player = %reward.player, tier = %reward.tier_name, "Reward expired");
            let change = TierChange {
                award: None,
                revoke: vec![reward.clone()],
            };
            warnings.extend(self.sync_roles(&reward.player, &change).await);
        }
        Ok((expired, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::models::{Match, MatchHistoryRecord, Mode, RewardTier};
    use crate::service::gateway::LogGateway;

    fn create_test_service(store: Store) -> RewardTierService {
        let tiers = RewardTiers::new(vec![
            RewardTier::new(10, "tier-1", "role-1"),
            RewardTier::new(20, "tier-2", "role-2"),
        ]);
        RewardTierService::new(store, Arc::new(SystemClock), Arc::new(LogGateway), tiers)
    }

    fn add_wins(tables: &mut Tables, player: &PlayerId, wins: usize) {
        let now = Utc::now();
        let opponent = PlayerId::from("sparring");
        tables.ensure_player(&opponent, 100, now);
        for _ in 0..wins {
            let record = Match::new(player.clone(), opponent.clone(), Mode::Land, vec![], now);
            tables.insert_history(MatchHistoryRecord {
                id: Uuid::new_v4(),
                match_id: record.id,
                player1: player.clone(),
                player2: opponent.clone(),
                winner: player.clone(),
                mode: Mode::Land,
                elo_before_winner: 1000,
                elo_after_winner: 1000,
                elo_before_loser: 1000,
                elo_after_loser: 1000,
                recorded_at: now,
                superseded: false,
            });
            tables.insert_match(record);
        }
    }

    #[tokio::test]
    async fn test_promotion_revokes_previous_tier() {
        let store = Store::in_memory();
        let service = create_test_service(store.clone());
        let player = PlayerId::from("p");

        store
            .transaction(|t| {
                t.ensure_player(&player, 100, Utc::now());
                add_wins(t, &player, 9);
                Ok(())
            })
            .await
            .unwrap();
        let (change, _) = service.resolve(&player).await.unwrap();
        assert!(change.is_empty());

        store
            .transaction(|t| {
                add_wins(t, &player, 1);
                Ok(())
            })
            .await
            .unwrap();
        let (change, _) = service.resolve(&player).await.unwrap();
        assert_eq!(change.award.unwrap().name, "tier-1");
        assert!(change.revoke.is_empty());

        store
            .transaction(|t| {
                add_wins(t, &player, 10);
                Ok(())
            })
            .await
            .unwrap();
        let (change, _) = service.resolve(&player).await.unwrap();
        assert_eq!(change.award.unwrap().name, "tier-2");
        assert_eq!(change.revoke.len(), 1);
        assert_eq!(change.revoke[0].tier_name, "tier-1");

        let held: Vec<String> = service.rewards_for(&player).await.into_iter().map(|r| r.tier_name).collect();
        assert_eq!(held, vec!["tier-2"]);

        // Held tier already matches the win count
        let (change, _) = service.resolve(&player).await.unwrap();
        assert!(change.is_empty());
    }

    #[tokio::test]
    async fn test_expire_rewards() {
        let store = Store::in_memory();
        let tiers = RewardTiers::new(vec![RewardTier {
            valid_for_days: Some(1),
            ..RewardTier::new(1, "seasonal", "seasonal")
        }]);
        let service = RewardTierService::new(store.clone(), Arc::new(SystemClock), Arc::new(LogGateway), tiers);
        let player = PlayerId::from("p");
        store
            .transaction(|t| {
                t.ensure_player(&player, 100, Utc::now());
                add_wins(t, &player, 1);
                Ok(())
            })
            .await
            .unwrap();
        service.resolve(&player).await.unwrap();

        let (expired, _) = service.expire_rewards(Utc::now()).await.unwrap();
        assert!(expired.is_empty());

        let (expired, warnings) = service.expire_rewards(Utc::now() + Duration::days(2)).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert!(warnings.is_empty());
        assert!(service.rewards_for(&player).await.is_empty());
    }
}
