use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::LadderError;
use crate::models::*;
use crate::service::betting_service::{refund_unresolved_in, settle_in, void_in};
use crate::service::gateway::Collaborators;
use crate::service::perk_service::taunt_in;
use crate::service::rating_engine::compute_ratings;
use crate::service::reward_tier_service::RewardTierService;
use crate::store::{Store, Tables};

/// Match lifecycle: opening, resolution, abandonment and administrative reversal
#[derive(Clone)]
pub struct MatchService {
    store: Store,
    clock: Arc<dyn Clock>,
    collaborators: Collaborators,
    tiers: RewardTierService,
    starting_tokens: i64,
}

impl MatchService {
    pub fn new(
        store: Store,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
        tiers: RewardTierService,
        starting_tokens: i64,
    ) -> Self {
        Self {
            store,
            clock,
            collaborators,
            tiers,
            starting_tokens,
        }
    }

    // =============================================================================
    // OPEN MATCH
    // =============================================================================

    /// Opens a match between two players outside of the queue
    pub async fn open(
        &self,
        player1: &PlayerId,
        player2: &PlayerId,
        mode: Mode,
        maps: Vec<String>,
    ) -> Result<(Match, Vec<String>), LadderError> {
        let now = self.clock.now();
        let starting_tokens = self.starting_tokens;
        let record = self
            .store
            .transaction(|tables| {
                tables.ensure_player(player1, starting_tokens, now);
                tables.ensure_player(player2, starting_tokens, now);
                open_in(tables, player1, player2, mode, maps, now)
            })
            .await?;

        Ok(self.provision(record).await)
    }

    /// Requests the match thread and announces the match to both players.
    /// Runs after the match is committed; failures only produce warnings.
    pub async fn provision(&self, mut record: Match) -> (Match, Vec<String>) {
        let mut warnings = Vec::new();
        let participants = record.participants().map(PlayerId::clone);

        match self
            .collaborators
            .provisioner
            .open_thread(record.mode, &participants, &record.maps)
            .await
        {
            Ok(session_ref) => {
                let match_id = record.id;
                let attached = self
                    .store
                    .transaction(|tables| {
                        let stored = tables.match_mut(match_id)?;
                        stored.session_ref = Some(session_ref.clone());
                        Ok(stored.clone())
                    })
                    .await;
                match attached {
                    Ok(updated) => record = updated,
                    Err(e) => {
                        warn!(match_id = %match_id, error = %e, "Failed to attach match thread");
                        warnings.push(format!("could not attach thread {}: {}", session_ref, e));
                    }
                }
            }
            Err(e) => {
                warn!(match_id = %record.id, error = %e, "Failed to open match thread");
                warnings.push(format!("could not open match thread: {}", e));
            }
        }

        let maps = record.maps.join(", ");
        for player in &participants {
            let opponent = record
                .opponent_of(player)
                .map(ToString::to_string)
                .unwrap_or_default();
            let message = format!(
                "Match found in {} against {}. Maps: {}",
                record.mode.name(),
                opponent,
                maps
            );
            warnings.extend(self.collaborators.notify(player, &message).await);
        }

        info!(
            match_id = %record.id,
            mode = %record.mode,
            player1 = %record.player1,
            player2 = %record.player2,
            "Match opened"
        );
        (record, warnings)
    }

    // =============================================================================
    // RESOLVE MATCH
    // =============================================================================

    /// Records the winner of an active match and settles everything that depends on it
    pub async fn resolve(&self, match_id: Uuid, winner: &PlayerId) -> Result<ResolutionResult, LadderError> {
        let now = self.clock.now();
        let mut result = self
            .store
            .transaction(|tables| {
                let record = tables
                    .match_record(match_id)
                    .ok_or(LadderError::MatchNotFound(match_id))?
                    .clone();
                if !record.is_active() {
                    return Err(LadderError::MatchNotActive(match_id));
                }
                if !record.involves(winner) {
                    return Err(LadderError::NotParticipant {
                        match_id,
                        player: winner.clone(),
                    });
                }

                let history = record_result_in(tables, &record, winner, None, now)?;
                let bets = settle_in(tables, match_id, winner, now)?;
                let tiers = self.tiers.compute_in(tables, winner);
                self.tiers.apply_in(tables, winner, &tiers, now);
                let match_record = transition(tables, match_id, MatchStatus::Resolved, now)?;
                let taunt = taunt_in(tables, winner, now);

                Ok(ResolutionResult {
                    match_record,
                    history,
                    bets,
                    tiers,
                    taunt,
                    warnings: Vec::new(),
                })
            })
            .await?;

        info!(
            match_id = %match_id,
            winner = %winner,
            winner_delta = result.winner_delta(),
            loser_delta = result.loser_delta(),
            bets = result.bets.len(),
            "Match resolved"
        );

        result.warnings = self.announce_result(&result).await;
        Ok(result)
    }

    /// Records a result without an active match (administrative)
    pub async fn force_result(
        &self,
        winner: &PlayerId,
        loser: &PlayerId,
        mode: Mode,
    ) -> Result<ResolutionResult, LadderError> {
        if winner == loser {
            return Err(LadderError::invalid_argument("winner and loser must differ"));
        }

        let now = self.clock.now();
        let starting_tokens = self.starting_tokens;
        let mut result = self
            .store
            .transaction(|tables| {
                tables.ensure_player(winner, starting_tokens, now);
                tables.ensure_player(loser, starting_tokens, now);
                let mut record = Match::new(winner.clone(), loser.clone(), mode, Vec::new(), now);
                record.status = MatchStatus::Resolved;
                tables.insert_match(record.clone());

                let history = record_result_in(tables, &record, winner, None, now)?;
                let tiers = self.tiers.compute_in(tables, winner);
                self.tiers.apply_in(tables, winner, &tiers, now);
                let taunt = taunt_in(tables, winner, now);

                Ok(ResolutionResult {
                    match_record: record,
                    history,
                    bets: Vec::new(),
                    tiers,
                    taunt,
                    warnings: Vec::new(),
                })
            })
            .await?;

        info!(
            match_id = %result.match_record.id,
            winner = %winner,
            loser = %loser,
            mode = %mode,
            "Result forced by admin"
        );

        result.warnings = self.announce_result(&result).await;
        Ok(result)
    }

    async fn announce_result(&self, result: &ResolutionResult) -> Vec<String> {
        let history = &result.history;
        let mut warnings = self.tiers.sync_roles(&history.winner, &result.tiers).await;

        let mut winner_message = format!(
            "You won your {} match against {}. Elo {} -> {}",
            history.mode.name(),
            history.loser(),
            history.elo_before_winner,
            history.elo_after_winner
        );
        if let Some(tier) = &result.tiers.award {
            winner_message.push_str(&format!(". Promoted to {}", tier.name));
        }
        let mut loser_message = format!(
            "You lost your {} match against {}. Elo {} -> {}",
            history.mode.name(),
            history.winner,
            history.elo_before_loser,
            history.elo_after_loser
        );
        if let Some(taunt) = &result.taunt {
            loser_message.push_str(&format!(". {} says: {}", history.winner, taunt));
        }

        warnings.extend(self.collaborators.notify(&history.winner, &winner_message).await);
        warnings.extend(self.collaborators.notify(history.loser(), &loser_message).await);
        for settlement in &result.bets {
            let message = if settlement.won {
                format!("Your bet of {} tokens won {} tokens", settlement.amount, settlement.payout)
            } else {
                format!("Your bet of {} tokens was lost", settlement.amount)
            };
            warnings.extend(self.collaborators.notify(&settlement.bettor, &message).await);
        }
        warnings
    }

    // =============================================================================
    // ABANDON MATCH
    // =============================================================================

    /// Abandons the player's active match and refunds every open bet on it
    pub async fn abandon(&self, player: &PlayerId) -> Result<AbandonResult, LadderError> {
        let now = self.clock.now();
        let mut result = self
            .store
            .transaction(|tables| {
                let match_id = tables
                    .active_match_for(player)
                    .map(|m| m.id)
                    .ok_or_else(|| LadderError::NotInMatch(player.clone()))?;
                let refunds = refund_unresolved_in(tables, match_id, now)?;
                let match_record = transition(tables, match_id, MatchStatus::Abandoned, now)?;
                Ok(AbandonResult {
                    match_record,
                    refunds,
                    warnings: Vec::new(),
                })
            })
            .await?;

        let record = &result.match_record;
        info!(
            match_id = %record.id,
            player = %player,
            refunds = result.refunds.len(),
            "Match abandoned"
        );

        let mut warnings = Vec::new();
        if let Some(opponent) = record.opponent_of(player) {
            let message = format!("{} left your {} match. The match was cancelled", player, record.mode.name());
            warnings.extend(self.collaborators.notify(opponent, &message).await);
        }
        for refund in &result.refunds {
            let message = format!("Your bet was refunded: {} tokens", refund.credited);
            warnings.extend(self.collaborators.notify(&refund.bettor, &message).await);
        }
        result.warnings = warnings;
        Ok(result)
    }

    // =============================================================================
    // REVERSE MATCH
    // =============================================================================

    /// Undoes the recorded result of a match (administrative).
    ///
    /// Both ratings go back to their pre-match values and every bet on the match is
    /// unwound. With `replacement` the result is recomputed from the pre-match
    /// ratings with that winner; without it the match ends up reversed.
    pub async fn reverse(
        &self,
        match_id: Uuid,
        replacement: Option<&PlayerId>,
    ) -> Result<ReversalResult, LadderError> {
        let now = self.clock.now();
        let mut result = self
            .store
            .transaction(|tables| {
                let record = tables
                    .match_record(match_id)
                    .ok_or(LadderError::MatchNotFound(match_id))?
                    .clone();
                let reverted = tables
                    .current_history_for_match(match_id)
                    .cloned()
                    .ok_or(LadderError::HistoryNotFound(match_id))?;
                if let Some(winner) = replacement {
                    if !record.involves(winner) {
                        return Err(LadderError::NotParticipant {
                            match_id,
                            player: winner.clone(),
                        });
                    }
                }

                restore_ratings_in(tables, &reverted, now);
                let refunds = void_in(tables, match_id, now)?;

                let (match_record, replacement) = match replacement {
                    Some(winner) => {
                        if let Some(stored) = tables.history_mut(reverted.id) {
                            stored.superseded = true;
                        }
                        let before = (
                            reverted.elo_before_for(winner).unwrap_or(DEFAULT_ELO),
                            reverted
                                .elo_before_for(opponent(&reverted, winner))
                                .unwrap_or(DEFAULT_ELO),
                        );
                        let history = record_result_in(tables, &record, winner, Some(before), now)?;
                        let updated = transition(tables, match_id, MatchStatus::Resolved, now)?;
                        (updated, Some(history))
                    }
                    None => {
                        tables.remove_history(reverted.id);
                        let updated = transition(tables, match_id, MatchStatus::Reversed, now)?;
                        (updated, None)
                    }
                };

                let mut tier_changes = Vec::new();
                for player in [&reverted.player1, &reverted.player2] {
                    let change = self.tiers.compute_in(tables, player);
                    self.tiers.apply_in(tables, player, &change, now);
                    tier_changes.push((player.clone(), change));
                }

                Ok(ReversalResult {
                    match_record,
                    reverted,
                    replacement,
                    refunds,
                    tier_changes,
                    warnings: Vec::new(),
                })
            })
            .await?;

        info!(
            match_id = %match_id,
            reverted_winner = %result.reverted.winner,
            replacement_winner = ?result.replacement.as_ref().map(|h| h.winner.to_string()),
            refunds = result.refunds.len(),
            "Match result reversed"
        );

        let mut warnings = Vec::new();
        for (player, change) in &result.tier_changes {
            warnings.extend(self.tiers.sync_roles(player, change).await);
        }
        let message = match &result.replacement {
            Some(history) => format!("The result of match {} was corrected: {} won", match_id, history.winner),
            None => format!("The result of match {} was reverted", match_id),
        };
        for player in [&result.reverted.player1, &result.reverted.player2] {
            warnings.extend(self.collaborators.notify(player, &message).await);
        }
        result.warnings = warnings;
        Ok(result)
    }

    // =============================================================================
    // ADMIN & QUERIES
    // =============================================================================

    /// Overwrites a player's rating in a mode (administrative)
    pub async fn adjust_elo(&self, player: &PlayerId, mode: Mode, elo: i32) -> Result<Rating, LadderError> {
        let now = self.clock.now();
        let rating = self
            .store
            .transaction(|tables| {
                if tables.player(player).is_none() {
                    return Err(LadderError::PlayerNotFound(player.clone()));
                }
                let rating = tables.ensure_rating(player, mode, now);
                rating.elo = elo;
                rating.updated_at = now;
                Ok(rating.clone())
            })
            .await?;

        info!(player = %player, mode = %mode, elo, "Elo adjusted by admin");
        Ok(rating)
    }

    pub async fn get_match(&self, match_id: Uuid) -> Result<Match, LadderError> {
        self.store
            .read(|tables| tables.match_record(match_id).cloned())
            .await
            .ok_or(LadderError::MatchNotFound(match_id))
    }

    /// Active matches, oldest first
    pub async fn active_matches(&self) -> Vec<Match> {
        self.store
            .read(|tables| tables.active_matches().into_iter().cloned().collect())
            .await
    }

    pub async fn active_match_for(&self, player: &PlayerId) -> Option<Match> {
        self.store
            .read(|tables| tables.active_match_for(player).cloned())
            .await
    }

    /// A player's recorded results, newest first
    pub async fn history_for(&self, player: &PlayerId, limit: usize) -> Vec<MatchHistoryRecord> {
        self.store
            .read(|tables| {
                tables
                    .history_for(player)
                    .into_iter()
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .await
    }

    /// Rating after each of the player's matches in a mode, oldest first
    pub async fn elo_history(&self, player: &PlayerId, mode: Mode) -> Vec<EloPoint> {
        self.store
            .read(|tables| {
                let mut points: Vec<EloPoint> = tables
                    .history_for(player)
                    .into_iter()
                    .filter(|h| h.mode == mode)
                    .filter_map(|h| {
                        h.elo_after_for(player).map(|elo| EloPoint {
                            at: h.recorded_at,
                            elo,
                        })
                    })
                    .collect();
                points.reverse();
                points
            })
            .await
    }

    /// Most recent results across all players
    pub async fn recent_history(&self, limit: usize) -> Vec<MatchHistoryRecord> {
        self.store
            .read(|tables| {
                tables
                    .current_history()
                    .into_iter()
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .await
    }
}

// =============================================================================
// UNIT-OF-WORK HELPERS
// =============================================================================

/// Inserts an active match after checking neither player is already in one.
///
/// Any queue entry either player still has waiting is left.
pub fn open_in(
    tables: &mut Tables,
    player1: &PlayerId,
    player2: &PlayerId,
    mode: Mode,
    maps: Vec<String>,
    now: DateTime<Utc>,
) -> Result<Match, LadderError> {
    if player1 == player2 {
        return Err(LadderError::invalid_argument("a player cannot be matched against themself"));
    }
    for player in [player1, player2] {
        if tables.active_match_for(player).is_some() {
            return Err(LadderError::AlreadyInMatch(player.clone()));
        }
        tables.ensure_rating(player, mode, now);
    }
    // A player in a match waits in no queue
    for player in [player1, player2] {
        for queued in tables.waiting_modes_for(player) {
            if let Some(entry) = tables.queue_entry_mut(player, queued) {
                entry.mark_left(now);
            }
        }
    }

    let record = Match::new(player1.clone(), player2.clone(), mode, maps, now);
    tables.insert_match(record.clone());
    Ok(record)
}

/// Applies a result to both ratings and appends the history record.
///
/// `before` overrides the `(winner, loser)` ratings the computation starts from;
/// by default the current ratings are used.
pub fn record_result_in(
    tables: &mut Tables,
    record: &Match,
    winner: &PlayerId,
    before: Option<(i32, i32)>,
    now: DateTime<Utc>,
) -> Result<MatchHistoryRecord, LadderError> {
    let loser = record
        .opponent_of(winner)
        .ok_or_else(|| LadderError::NotParticipant {
            match_id: record.id,
            player: winner.clone(),
        })?
        .clone();

    let (winner_before, loser_before) = match before {
        Some(pair) => pair,
        None => (
            tables.ensure_rating(winner, record.mode, now).elo,
            tables.ensure_rating(&loser, record.mode, now).elo,
        ),
    };
    let (winner_after, loser_after) = compute_ratings(winner_before, loser_before, record.mode.k_factor());

    let rating = tables.ensure_rating(winner, record.mode, now);
    rating.elo = winner_after;
    rating.matches += 1;
    rating.wins += 1;
    rating.updated_at = now;

    let rating = tables.ensure_rating(&loser, record.mode, now);
    rating.elo = loser_after;
    rating.matches += 1;
    rating.updated_at = now;

    let history = MatchHistoryRecord {
        id: Uuid::new_v4(),
        match_id: record.id,
        player1: record.player1.clone(),
        player2: record.player2.clone(),
        winner: winner.clone(),
        mode: record.mode,
        elo_before_winner: winner_before,
        elo_after_winner: winner_after,
        elo_before_loser: loser_before,
        elo_after_loser: loser_after,
        recorded_at: now,
        superseded: false,
    };
    tables.insert_history(history.clone());
    Ok(history)
}

/// Puts both participants back on their pre-match ratings and counters
fn restore_ratings_in(tables: &mut Tables, history: &MatchHistoryRecord, now: DateTime<Utc>) {
    let rating = tables.ensure_rating(&history.winner, history.mode, now);
    rating.elo = history.elo_before_winner;
    rating.matches = (rating.matches - 1).max(0);
    rating.wins = (rating.wins - 1).max(0);
    rating.updated_at = now;

    let rating = tables.ensure_rating(history.loser(), history.mode, now);
    rating.elo = history.elo_before_loser;
    rating.matches = (rating.matches - 1).max(0);
    rating.updated_at = now;
}

fn opponent<'a>(history: &'a MatchHistoryRecord, player: &PlayerId) -> &'a PlayerId {
    if &history.player1 == player {
        &history.player2
    } else {
        &history.player1
    }
}

fn transition(
    tables: &mut Tables,
    match_id: Uuid,
    to: MatchStatus,
    now: DateTime<Utc>,
) -> Result<Match, LadderError> {
    let stored = tables.match_mut(match_id)?;
    if !stored.status.can_transition_to(&to) {
        return Err(LadderError::MatchNotActive(match_id));
    }
    stored.status = to;
    stored.updated_at = now;
    Ok(stored.clone())
}
