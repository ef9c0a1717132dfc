// Service layer module for the ladder
pub mod betting_service;
pub mod gateway;
pub mod ladder_service;
pub mod leaderboard_service;
pub mod ledger_service;
pub mod match_service;
pub mod perk_service;
pub mod queue_service;
pub mod rating_engine;
pub mod reward_tier_service;

mod ladder_service_test;

pub use betting_service::BettingService;
pub use gateway::{Collaborators, GatewayError, HttpGateway, LogGateway, MatchSpaceProvisioner, NotificationSink, RetryConfig, RoleGrantor};
pub use ladder_service::{LadderService, LeaveOutcome, SweepReport};
pub use leaderboard_service::LeaderboardService;
pub use ledger_service::LedgerService;
pub use match_service::MatchService;
pub use perk_service::PerkService;
pub use queue_service::QueueService;
pub use reward_tier_service::RewardTierService;
