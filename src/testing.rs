//! Test doubles shared by the service tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};

use crate::clock::ManualClock;
use crate::config::LadderConfig;
use crate::models::{Mode, PlayerId, RewardTier, RewardTiers};
use crate::service::gateway::{Collaborators, GatewayError, MatchSpaceProvisioner, NotificationSink, RoleGrantor};
use crate::service::ladder_service::LadderService;
use crate::store::Store;

/// Call made to a collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Notify(PlayerId, String),
    OpenThread(Mode, [PlayerId; 2]),
    Grant(PlayerId, String),
    Revoke(PlayerId, String),
}

/// Records every collaborator call; each capability can be told to fail
#[derive(Debug, Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    fail_notify: Mutex<bool>,
    fail_threads: Mutex<bool>,
    fail_roles: Mutex<bool>,
}

impl RecordingGateway {
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn grants(&self) -> Vec<(PlayerId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Grant(p, m) => Some((p, m)),
                _ => None,
            })
            .collect()
    }

    pub fn revokes(&self) -> Vec<(PlayerId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Revoke(p, m) => Some((p, m)),
                _ => None,
            })
            .collect()
    }

    pub fn threads_opened(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::OpenThread(..)))
            .count()
    }

    pub fn notifications_to(&self, player: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Notify(p, msg) if p.as_str() == player => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn fail_notifications(&self, fail: bool) {
        *self.fail_notify.lock().unwrap() = fail;
    }

    pub fn fail_threads(&self, fail: bool) {
        *self.fail_threads.lock().unwrap() = fail;
    }

    pub fn fail_roles(&self, fail: bool) {
        *self.fail_roles.lock().unwrap() = fail;
    }

    fn record(&self, call: GatewayCall, fail: &Mutex<bool>) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(call);
        if *fail.lock().unwrap() {
            return Err(GatewayError::RequestFailed("gateway offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RecordingGateway {
    async fn notify(&self, player: &PlayerId, message: &str) -> Result<(), GatewayError> {
        self.record(GatewayCall::Notify(player.clone(), message.to_string()), &self.fail_notify)
    }
}

#[async_trait]
impl MatchSpaceProvisioner for RecordingGateway {
    async fn open_thread(
        &self,
        mode: Mode,
        participants: &[PlayerId; 2],
        _maps: &[String],
    ) -> Result<String, GatewayError> {
        self.record(GatewayCall::OpenThread(mode, participants.clone()), &self.fail_threads)?;
        Ok(format!("thread-{}-{}", participants[0], participants[1]))
    }
}

#[async_trait]
impl RoleGrantor for RecordingGateway {
    async fn grant_role(&self, player: &PlayerId, marker: &str) -> Result<(), GatewayError> {
        self.record(GatewayCall::Grant(player.clone(), marker.to_string()), &self.fail_roles)
    }

    async fn revoke_role(&self, player: &PlayerId, marker: &str) -> Result<(), GatewayError> {
        self.record(GatewayCall::Revoke(player.clone(), marker.to_string()), &self.fail_roles)
    }
}

/// A fully wired ladder over an in-memory store
pub struct TestLadder {
    pub service: LadderService,
    pub store: Store,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<RecordingGateway>,
}

/// Two small tiers so promotions are reachable in a test
pub fn test_tiers() -> RewardTiers {
    RewardTiers::new(vec![
        RewardTier::new(10, "tier-1", "role-1"),
        RewardTier::new(20, "tier-2", "role-2"),
    ])
}

pub fn create_test_ladder() -> TestLadder {
    create_test_ladder_with(Store::in_memory(), test_tiers())
}

pub fn create_test_ladder_with(store: Store, tiers: RewardTiers) -> TestLadder {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
    let gateway = Arc::new(RecordingGateway::default());
    let service = LadderService::new(
        store.clone(),
        clock.clone(),
        Collaborators::from_gateway(gateway.clone()),
        &LadderConfig::default(),
        tiers,
    );
    TestLadder {
        service,
        store,
        clock,
        gateway,
    }
}

impl TestLadder {
    pub async fn balance(&self, player: &str) -> i64 {
        self.service.ledger.balance(&player.into()).await.unwrap()
    }

    pub async fn elo(&self, player: &str, mode: Mode) -> i32 {
        self.store
            .read(|t| t.rating(&player.into(), mode).map(|r| r.elo))
            .await
            .unwrap()
    }
}
