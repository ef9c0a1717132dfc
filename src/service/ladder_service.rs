use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::LadderConfig;
use crate::error::LadderError;
use crate::models::{AbandonResult, Mode, Perk, PlayerId, QueueEntry, RewardTiers, UserReward};
use crate::service::betting_service::BettingService;
use crate::service::gateway::Collaborators;
use crate::service::leaderboard_service::LeaderboardService;
use crate::service::ledger_service::LedgerService;
use crate::service::match_service::MatchService;
use crate::service::perk_service::PerkService;
use crate::service::queue_service::QueueService;
use crate::service::reward_tier_service::RewardTierService;
use crate::store::Store;

/// Result of a player leaving whatever they are in
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LeaveOutcome {
    LeftQueues { modes: Vec<Mode> },
    Abandoned { result: AbandonResult },
}

/// What one run of the periodic sweeps removed
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub expired_entries: Vec<QueueEntry>,
    pub expired_rewards: Vec<UserReward>,
    pub expired_perks: Vec<Perk>,
    pub warnings: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_entries.is_empty() && self.expired_rewards.is_empty() && self.expired_perks.is_empty()
    }
}

/// Entry point of the ladder core, wiring every service onto one store
#[derive(Clone)]
pub struct LadderService {
    pub queue: QueueService,
    pub matches: MatchService,
    pub betting: BettingService,
    pub tiers: RewardTierService,
    pub perks: PerkService,
    pub ledger: LedgerService,
    pub leaderboard: LeaderboardService,
    queue_max_age: Duration,
}

impl LadderService {
    pub fn new(
        store: Store,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
        config: &LadderConfig,
        tiers: RewardTiers,
    ) -> Self {
        let tiers = RewardTierService::new(store.clone(), clock.clone(), collaborators.roles.clone(), tiers);
        let matches = MatchService::new(
            store.clone(),
            clock.clone(),
            collaborators.clone(),
            tiers.clone(),
            config.starting_tokens,
        );
        let queue = QueueService::new(
            store.clone(),
            clock.clone(),
            collaborators,
            matches.clone(),
            config.starting_tokens,
            config.maps_per_match,
        );

        Self {
            queue,
            matches,
            betting: BettingService::new(store.clone(), clock.clone()),
            tiers,
            perks: PerkService::new(store.clone(), clock.clone(), config),
            ledger: LedgerService::new(store.clone(), clock.clone(), config.starting_tokens),
            leaderboard: LeaderboardService::new(store, clock),
            queue_max_age: Duration::seconds(config.queue_max_age_secs),
        }
    }

    /// Leaves every queue the player waits in, or abandons their active match when not queued
    pub async fn leave(&self, player: &PlayerId) -> Result<LeaveOutcome, LadderError> {
        let modes = self.queue.dequeue_all(player).await?;
        if !modes.is_empty() {
            return Ok(LeaveOutcome::LeftQueues { modes });
        }

        match self.matches.abandon(player).await {
            Ok(result) => Ok(LeaveOutcome::Abandoned { result }),
            Err(LadderError::NotInMatch(p)) => Err(LadderError::NotInQueueOrMatch(p)),
            Err(e) => Err(e),
        }
    }

    /// Runs every expiry sweep once. A failing sweep is logged and the others still run.
    pub async fn run_sweeps(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        match self.queue.expire_stale(now, self.queue_max_age).await {
            Ok((entries, warnings)) => {
                report.expired_entries = entries;
                report.warnings.extend(warnings);
            }
            Err(e) => warn!(error = %e, "Queue expiry sweep failed"),
        }
        match self.tiers.expire_rewards(now).await {
            Ok((rewards, warnings)) => {
                report.expired_rewards = rewards;
                report.warnings.extend(warnings);
            }
            Err(e) => warn!(error = %e, "Reward expiry sweep failed"),
        }
        match self.perks.expire_perks(now).await {
            Ok(perks) => report.expired_perks = perks,
            Err(e) => warn!(error = %e, "Perk expiry sweep failed"),
        }

        if !report.is_empty() {
            info!(
                queue_entries = report.expired_entries.len(),
                rewards = report.expired_rewards.len(),
                perks = report.expired_perks.len(),
                "Sweep completed"
            );
        }
        report
    }
}
