use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::LadderError;
use crate::models::{Bet, BetRefund, BetSettlement, BetStatus, PlayerId, PAYOUT_MULTIPLIER};
use crate::service::ledger_service::{credit, debit};
use crate::store::{Store, Tables};

/// Side-bets on active matches, escrowed in the ledger
#[derive(Clone)]
pub struct BettingService {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl BettingService {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // =============================================================================
    // PLACE BET
    // =============================================================================

    /// Escrows `amount` from the bettor on `side` winning the match
    pub async fn place_bet(
        &self,
        bettor: &PlayerId,
        match_id: Uuid,
        side: &PlayerId,
        amount: i64,
    ) -> Result<Bet, LadderError> {
        if amount <= 0 {
            return Err(LadderError::InvalidAmount(amount));
        }

        let now = self.clock.now();
        let bet = self
            .store
            .transaction(|tables| place_in(tables, bettor, match_id, side, amount, now))
            .await?;

        info!(
            bet_id = %bet.id,
            match_id = %match_id,
            bettor = %bettor,
            side = %side,
            amount,
            "Bet placed"
        );
        Ok(bet)
    }

    /// A bettor's bets, newest first
    pub async fn bets_by(&self, bettor: &PlayerId) -> Vec<Bet> {
        self.store
            .read(|tables| tables.bets_by(bettor).into_iter().cloned().collect())
            .await
    }

    pub async fn bets_for_match(&self, match_id: Uuid) -> Vec<Bet> {
        self.store
            .read(|tables| tables.bets_for_match(match_id).into_iter().cloned().collect())
            .await
    }
}

fn place_in(
    tables: &mut Tables,
    bettor: &PlayerId,
    match_id: Uuid,
    side: &PlayerId,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Bet, LadderError> {
    if tables.player(bettor).is_none() {
        return Err(LadderError::PlayerNotFound(bettor.clone()));
    }

    let record = tables
        .match_record(match_id)
        .ok_or(LadderError::MatchNotFound(match_id))?;
    if !record.is_active() {
        return Err(LadderError::MatchNotActive(match_id));
    }
    if !record.involves(side) {
        return Err(LadderError::NotParticipant {
            match_id,
            player: side.clone(),
        });
    }
    if bettor == side {
        return Err(LadderError::SelfBet);
    }
    if record.involves(bettor) {
        return Err(LadderError::BetOnOpponent);
    }
    if tables.bet_by(bettor, match_id).is_some() {
        return Err(LadderError::DuplicateBet {
            bettor: bettor.clone(),
            match_id,
        });
    }

    debit(tables, bettor, amount, now)?;

    let bet = Bet {
        id: Uuid::new_v4(),
        match_id,
        bettor: bettor.clone(),
        side: side.clone(),
        amount,
        placed_at: now,
        status: BetStatus::Open,
        resolved_at: None,
    };
    tables.insert_bet(bet.clone());
    Ok(bet)
}

// =============================================================================
// SETTLEMENT
// =============================================================================

/// Settles every open bet of a resolved match. Winning bets pay out
/// `PAYOUT_MULTIPLIER` times the stake; losing stakes stay spent.
pub fn settle_in(
    tables: &mut Tables,
    match_id: Uuid,
    winner: &PlayerId,
    now: DateTime<Utc>,
) -> Result<Vec<BetSettlement>, LadderError> {
    let open: Vec<Bet> = tables
        .bets_for_match(match_id)
        .into_iter()
        .filter(|b| !b.is_resolved())
        .cloned()
        .collect();

    let mut settlements = Vec::with_capacity(open.len());
    for bet in open {
        let won = &bet.side == winner;
        let payout = if won { bet.amount * PAYOUT_MULTIPLIER } else { 0 };
        if won {
            credit(tables, &bet.bettor, payout, now)?;
        }
        if let Some(stored) = tables.bet_mut(bet.id) {
            stored.status = if won { BetStatus::Won } else { BetStatus::Lost };
            stored.resolved_at = Some(now);
        }
        settlements.push(BetSettlement {
            bet_id: bet.id,
            bettor: bet.bettor,
            amount: bet.amount,
            won,
            payout,
        });
    }
    Ok(settlements)
}

/// Returns the stake of every open bet on the match
pub fn refund_unresolved_in(
    tables: &mut Tables,
    match_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<BetRefund>, LadderError> {
    let open: Vec<Bet> = tables
        .bets_for_match(match_id)
        .into_iter()
        .filter(|b| !b.is_resolved())
        .cloned()
        .collect();

    let mut refunds = Vec::with_capacity(open.len());
    for bet in open {
        credit(tables, &bet.bettor, bet.amount, now)?;
        mark_refunded(tables, bet.id, now);
        refunds.push(BetRefund {
            bet_id: bet.id,
            bettor: bet.bettor,
            credited: bet.amount,
        });
    }
    Ok(refunds)
}

/// Unwinds every bet on a match whose result is being reversed, leaving each
/// bettor as if the bet had never been placed.
///
/// Open and lost bets get their stake back. Won bets already received twice the
/// stake, so the net gain is clawed back; if the bettor has since spent it, the
/// balance floors at zero.
pub fn void_in(
    tables: &mut Tables,
    match_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<BetRefund>, LadderError> {
    let bets: Vec<Bet> = tables
        .bets_for_match(match_id)
        .into_iter()
        .filter(|b| b.status != BetStatus::Refunded)
        .cloned()
        .collect();

    let mut refunds = Vec::with_capacity(bets.len());
    for bet in bets {
        let credited = match bet.status {
            BetStatus::Won => {
                let gain = bet.payout() - bet.amount;
                let balance = tables.player(&bet.bettor).map_or(0, |p| p.tokens);
                let recovered = gain.min(balance);
                if recovered < gain {
                    warn!(
                        bet_id = %bet.id,
                        bettor = %bet.bettor,
                        owed = gain,
                        recovered,
                        "Bet payout only partially recovered"
                    );
                }
                debit(tables, &bet.bettor, recovered, now)?;
                -recovered
            }
            _ => {
                credit(tables, &bet.bettor, bet.amount, now)?;
                bet.amount
            }
        };
        mark_refunded(tables, bet.id, now);
        refunds.push(BetRefund {
            bet_id: bet.id,
            bettor: bet.bettor,
            credited,
        });
    }
    Ok(refunds)
}

fn mark_refunded(tables: &mut Tables, bet_id: Uuid, now: DateTime<Utc>) {
    if let Some(stored) = tables.bet_mut(bet_id) {
        stored.status = BetStatus::Refunded;
        stored.resolved_at = Some(now);
    }
}
