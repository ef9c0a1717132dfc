use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::LadderError;
use crate::models::*;
use crate::service::gateway::Collaborators;
use crate::service::match_service::{open_in, MatchService};
use crate::store::{Store, Tables};

/// Per-mode waiting lists and pairing
#[derive(Clone)]
pub struct QueueService {
    store: Store,
    clock: Arc<dyn Clock>,
    collaborators: Collaborators,
    matches: MatchService,
    starting_tokens: i64,
    maps_per_match: usize,
}

impl QueueService {
    pub fn new(
        store: Store,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
        matches: MatchService,
        starting_tokens: i64,
        maps_per_match: usize,
    ) -> Self {
        Self {
            store,
            clock,
            collaborators,
            matches,
            starting_tokens,
            maps_per_match,
        }
    }

    // =============================================================================
    // ENQUEUE / DEQUEUE
    // =============================================================================

    /// Puts the player in the mode's queue and pairs the mode when possible.
    ///
    /// The in-match check and the pairing commit together, so a player can never
    /// be paired into two matches by concurrent joins in different modes.
    pub async fn enqueue(&self, player: &PlayerId, mode: Mode) -> Result<EnqueueOutcome, LadderError> {
        let now = self.clock.now();
        let starting_tokens = self.starting_tokens;
        let maps_per_match = self.maps_per_match;

        let (entry, waiting, paired) = self
            .store
            .transaction(|tables| {
                tables.ensure_player(player, starting_tokens, now);
                tables.ensure_rating(player, mode, now);

                if tables.queue_entry(player, mode).is_some_and(|e| e.is_waiting()) {
                    return Err(LadderError::AlreadyQueued {
                        player: player.clone(),
                        mode,
                    });
                }
                if tables.active_match_for(player).is_some() {
                    return Err(LadderError::AlreadyInMatch(player.clone()));
                }

                let entry = QueueEntry::waiting(player.clone(), mode, now);
                tables.upsert_queue_entry(entry.clone());

                let paired = pair_in(tables, mode, maps_per_match, now)?;
                let entry = tables.queue_entry(player, mode).cloned().unwrap_or(entry);
                let waiting = tables.waiting_in_mode(mode).len();
                Ok((entry, waiting, paired))
            })
            .await?;

        info!(player = %player, mode = %mode, waiting, paired = paired.is_some(), "Player queued");

        let mut outcome = EnqueueOutcome {
            entry,
            waiting,
            paired: None,
            warnings: Vec::new(),
        };
        if let Some(record) = paired {
            let (record, warnings) = self.matches.provision(record).await;
            outcome.paired = Some(record);
            outcome.warnings = warnings;
        }
        Ok(outcome)
    }

    /// Takes the player out of the mode's queue
    pub async fn dequeue(&self, player: &PlayerId, mode: Mode) -> Result<DequeueOutcome, LadderError> {
        let now = self.clock.now();
        let outcome = self
            .store
            .transaction(|tables| match tables.queue_entry_mut(player, mode) {
                Some(entry) if entry.is_waiting() => {
                    entry.mark_left(now);
                    Ok(DequeueOutcome::Left { entry: entry.clone() })
                }
                _ => Ok(DequeueOutcome::NotQueued),
            })
            .await?;

        if matches!(outcome, DequeueOutcome::Left { .. }) {
            info!(player = %player, mode = %mode, "Player left queue");
        }
        Ok(outcome)
    }

    /// Leaves every queue the player waits in, returning the modes left
    pub async fn dequeue_all(&self, player: &PlayerId) -> Result<Vec<Mode>, LadderError> {
        let now = self.clock.now();
        let left = self
            .store
            .transaction(|tables| {
                let modes = tables.waiting_modes_for(player);
                for mode in &modes {
                    if let Some(entry) = tables.queue_entry_mut(player, *mode) {
                        entry.mark_left(now);
                    }
                }
                Ok(modes)
            })
            .await?;

        if !left.is_empty() {
            info!(player = %player, modes = ?left, "Player left all queues");
        }
        Ok(left)
    }

    // =============================================================================
    // PAIRING
    // =============================================================================

    /// Pairs the two longest-waiting players of a mode, if there are two
    pub async fn pair_if_possible(&self, mode: Mode) -> Result<Option<(Match, Vec<String>)>, LadderError> {
        let now = self.clock.now();
        let maps_per_match = self.maps_per_match;
        let paired = self
            .store
            .transaction(|tables| pair_in(tables, mode, maps_per_match, now))
            .await?;

        match paired {
            Some(record) => Ok(Some(self.matches.provision(record).await)),
            None => Ok(None),
        }
    }

    // =============================================================================
    // SWEEPS & QUERIES
    // =============================================================================

    /// Expires waiting entries older than `max_age` and tells their owners
    pub async fn expire_stale(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<(Vec<QueueEntry>, Vec<String>), LadderError> {
        let cutoff = now - max_age;
        let expired = self
            .store
            .transaction(|tables| {
                let stale: Vec<QueueEntry> = tables
                    .waiting_since_before(cutoff)
                    .into_iter()
                    .cloned()
                    .collect();
                let mut expired = Vec::with_capacity(stale.len());
                for entry in stale {
                    if let Some(stored) = tables.queue_entry_mut(&entry.player, entry.mode) {
                        stored.mark_left(now);
                        expired.push(stored.clone());
                    }
                }
                Ok(expired)
            })
            .await?;

        let mut warnings = Vec::new();
        for entry in &expired {
            info!(player = %entry.player, mode = %entry.mode, "Queue entry expired");
            let message = format!(
                "You were removed from the {} queue after waiting too long",
                entry.mode.name()
            );
            warnings.extend(self.collaborators.notify(&entry.player, &message).await);
        }
        Ok((expired, warnings))
    }

    /// Modes the player waits in and the active match they are in
    pub async fn status(&self, player: &PlayerId) -> PlayerStatus {
        self.store
            .read(|tables| PlayerStatus {
                player: player.clone(),
                queued: tables.waiting_modes_for(player),
                active_match: tables.active_match_for(player).cloned(),
            })
            .await
    }

    /// Players waiting in a mode, earliest first
    pub async fn waiting(&self, mode: Mode) -> Vec<QueueEntry> {
        self.store
            .read(|tables| tables.waiting_in_mode(mode).into_iter().cloned().collect())
            .await
    }
}

/// Pairs the two earliest waiting entries of `mode` inside the current unit of work.
///
/// Both entries become matched; `open_in` leaves every other waiting entry of
/// either player, so a paired player disappears from all queues at once.
pub fn pair_in(
    tables: &mut Tables,
    mode: Mode,
    maps_per_match: usize,
    now: DateTime<Utc>,
) -> Result<Option<Match>, LadderError> {
    let mut pair: Vec<PlayerId> = tables
        .waiting_in_mode(mode)
        .into_iter()
        .take(2)
        .map(|e| e.player.clone())
        .collect();
    if pair.len() < 2 {
        debug!(mode = %mode, waiting = pair.len(), "Not enough players to pair");
        return Ok(None);
    }

    let mut rng = rand::thread_rng();
    pair.shuffle(&mut rng);
    let maps: Vec<String> = mode
        .map_pool()
        .choose_multiple(&mut rng, maps_per_match)
        .map(|m| m.to_string())
        .collect();

    for player in &pair {
        if let Some(entry) = tables.queue_entry_mut(player, mode) {
            entry.mark_matched(now);
        }
    }

    let record = open_in(tables, &pair[0], &pair[1], mode, maps, now)?;
    Ok(Some(record))
}
