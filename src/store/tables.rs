//! In-memory image of the ladder tables and the row-level changes between two images.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use uuid::Uuid;

use crate::error::LadderError;
use crate::models::*;

/// Every persisted table, keyed the way the schema keys them
#[derive(Debug, Clone, Default)]
pub struct Tables {
    players: HashMap<PlayerId, Player>,
    ratings: HashMap<(PlayerId, Mode), Rating>,
    queue: HashMap<(PlayerId, Mode), QueueEntry>,
    matches: HashMap<Uuid, Match>,
    history: HashMap<Uuid, MatchHistoryRecord>,
    bets: HashMap<Uuid, Bet>,
    rewards: HashMap<Uuid, UserReward>,
    perks: HashMap<(PlayerId, PerkType), Perk>,
}

/// A full row of one table
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Player(Player),
    Rating(Rating),
    QueueEntry(QueueEntry),
    Match(Match),
    History(MatchHistoryRecord),
    Bet(Bet),
    Reward(UserReward),
    Perk(Perk),
}

/// Primary key of a row
#[derive(Debug, Clone, PartialEq)]
pub enum RowKey {
    Player(PlayerId),
    Rating(PlayerId, Mode),
    QueueEntry(PlayerId, Mode),
    Match(Uuid),
    History(Uuid),
    Bet(Uuid),
    Reward(Uuid),
    Perk(PlayerId, PerkType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Upsert(Row),
    Delete(RowKey),
}

impl Tables {
    // --- players ---

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Result<&mut Player, LadderError> {
        self.players
            .get_mut(id)
            .ok_or_else(|| LadderError::PlayerNotFound(id.clone()))
    }

    /// Returns the player, creating it with `starting_tokens` on first reference
    pub fn ensure_player(
        &mut self,
        id: &PlayerId,
        starting_tokens: i64,
        now: DateTime<Utc>,
    ) -> &mut Player {
        self.players
            .entry(id.clone())
            .or_insert_with(|| Player::new(id.clone(), starting_tokens, now))
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    // --- ratings ---

    pub fn rating(&self, player: &PlayerId, mode: Mode) -> Option<&Rating> {
        self.ratings.get(&(player.clone(), mode))
    }

    pub fn ensure_rating(&mut self, player: &PlayerId, mode: Mode, now: DateTime<Utc>) -> &mut Rating {
        self.ratings
            .entry((player.clone(), mode))
            .or_insert_with(|| Rating::new(player.clone(), mode, now))
    }

    pub fn ratings_for_mode(&self, mode: Mode) -> Vec<&Rating> {
        self.ratings.values().filter(|r| r.mode == mode).collect()
    }

    // --- queue ---

    pub fn queue_entry(&self, player: &PlayerId, mode: Mode) -> Option<&QueueEntry> {
        self.queue.get(&(player.clone(), mode))
    }

    pub fn queue_entry_mut(&mut self, player: &PlayerId, mode: Mode) -> Option<&mut QueueEntry> {
        self.queue.get_mut(&(player.clone(), mode))
    }

    pub fn upsert_queue_entry(&mut self, entry: QueueEntry) {
        self.queue.insert((entry.player.clone(), entry.mode), entry);
    }

    /// Waiting entries of a mode, earliest first
    pub fn waiting_in_mode(&self, mode: Mode) -> Vec<&QueueEntry> {
        let mut waiting: Vec<&QueueEntry> = self
            .queue
            .values()
            .filter(|e| e.mode == mode && e.is_waiting())
            .collect();
        waiting.sort_by(|a, b| {
            a.queued_at
                .cmp(&b.queued_at)
                .then_with(|| a.player.cmp(&b.player))
        });
        waiting
    }

    /// Modes the player is currently waiting in
    pub fn waiting_modes_for(&self, player: &PlayerId) -> Vec<Mode> {
        let mut modes: Vec<Mode> = Mode::ALL
            .into_iter()
            .filter(|m| self.queue_entry(player, *m).is_some_and(|e| e.is_waiting()))
            .collect();
        modes.sort();
        modes
    }

    /// Waiting entries older than `cutoff`
    pub fn waiting_since_before(&self, cutoff: DateTime<Utc>) -> Vec<&QueueEntry> {
        self.queue
            .values()
            .filter(|e| e.is_waiting() && e.queued_at < cutoff)
            .collect()
    }

    // --- matches ---

    pub fn match_record(&self, id: Uuid) -> Option<&Match> {
        self.matches.get(&id)
    }

    pub fn match_mut(&mut self, id: Uuid) -> Result<&mut Match, LadderError> {
        self.matches
            .get_mut(&id)
            .ok_or(LadderError::MatchNotFound(id))
    }

    pub fn insert_match(&mut self, record: Match) {
        self.matches.insert(record.id, record);
    }

    pub fn active_match_for(&self, player: &PlayerId) -> Option<&Match> {
        self.matches
            .values()
            .find(|m| m.is_active() && m.involves(player))
    }

    /// Active matches, oldest first
    pub fn active_matches(&self) -> Vec<&Match> {
        let mut active: Vec<&Match> = self.matches.values().filter(|m| m.is_active()).collect();
        active.sort_by_key(|m| m.created_at);
        active
    }

    // --- match history ---

    pub fn insert_history(&mut self, record: MatchHistoryRecord) {
        self.history.insert(record.id, record);
    }

    pub fn history_mut(&mut self, id: Uuid) -> Option<&mut MatchHistoryRecord> {
        self.history.get_mut(&id)
    }

    pub fn remove_history(&mut self, id: Uuid) -> Option<MatchHistoryRecord> {
        self.history.remove(&id)
    }

    /// The result currently standing for a match
    pub fn current_history_for_match(&self, match_id: Uuid) -> Option<&MatchHistoryRecord> {
        self.history
            .values()
            .find(|h| h.match_id == match_id && !h.superseded)
    }

    /// Standing results, newest first
    pub fn current_history(&self) -> Vec<&MatchHistoryRecord> {
        let mut records: Vec<&MatchHistoryRecord> =
            self.history.values().filter(|h| !h.superseded).collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        records
    }

    /// Standing results involving the player, newest first
    pub fn history_for(&self, player: &PlayerId) -> Vec<&MatchHistoryRecord> {
        self.current_history()
            .into_iter()
            .filter(|h| h.involves(player))
            .collect()
    }

    /// Cumulative wins across every mode
    pub fn wins_for(&self, player: &PlayerId) -> u32 {
        let wins = self
            .history
            .values()
            .filter(|h| !h.superseded && &h.winner == player)
            .count();
        u32::try_from(wins).unwrap_or(u32::MAX)
    }

    // --- bets ---

    pub fn insert_bet(&mut self, bet: Bet) {
        self.bets.insert(bet.id, bet);
    }

    pub fn bet_mut(&mut self, id: Uuid) -> Option<&mut Bet> {
        self.bets.get_mut(&id)
    }

    /// Bets on a match, in placement order
    pub fn bets_for_match(&self, match_id: Uuid) -> Vec<&Bet> {
        let mut bets: Vec<&Bet> = self.bets.values().filter(|b| b.match_id == match_id).collect();
        bets.sort_by_key(|b| b.placed_at);
        bets
    }

    pub fn bet_by(&self, bettor: &PlayerId, match_id: Uuid) -> Option<&Bet> {
        self.bets
            .values()
            .find(|b| b.match_id == match_id && &b.bettor == bettor)
    }

    /// Bets placed by a player, newest first
    pub fn bets_by(&self, bettor: &PlayerId) -> Vec<&Bet> {
        let mut bets: Vec<&Bet> = self.bets.values().filter(|b| &b.bettor == bettor).collect();
        bets.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        bets
    }

    // --- rewards ---

    pub fn rewards_for(&self, player: &PlayerId) -> Vec<&UserReward> {
        let mut rewards: Vec<&UserReward> =
            self.rewards.values().filter(|r| &r.player == player).collect();
        rewards.sort_by_key(|r| r.awarded_at);
        rewards
    }

    pub fn insert_reward(&mut self, reward: UserReward) {
        self.rewards.insert(reward.id, reward);
    }

    pub fn remove_reward(&mut self, id: Uuid) -> Option<UserReward> {
        self.rewards.remove(&id)
    }

    pub fn expired_rewards(&self, now: DateTime<Utc>) -> Vec<&UserReward> {
        self.rewards.values().filter(|r| r.is_expired(now)).collect()
    }

    // --- perks ---

    pub fn perk(&self, player: &PlayerId, perk_type: PerkType) -> Option<&Perk> {
        self.perks.get(&(player.clone(), perk_type))
    }

    pub fn upsert_perk(&mut self, perk: Perk) {
        self.perks.insert((perk.player.clone(), perk.perk_type), perk);
    }

    pub fn remove_perk(&mut self, player: &PlayerId, perk_type: PerkType) -> Option<Perk> {
        self.perks.remove(&(player.clone(), perk_type))
    }

    pub fn perks_for(&self, player: &PlayerId) -> Vec<&Perk> {
        let mut perks: Vec<&Perk> = self.perks.values().filter(|p| &p.player == player).collect();
        perks.sort_by_key(|p| p.perk_type);
        perks
    }

    pub fn expired_perks(&self, now: DateTime<Utc>) -> Vec<&Perk> {
        self.perks.values().filter(|p| !p.is_active(now)).collect()
    }

    // --- loading and diffing ---

    /// Places a row loaded from storage
    pub fn load_row(&mut self, row: Row) {
        match row {
            Row::Player(p) => {
                self.players.insert(p.id.clone(), p);
            }
            Row::Rating(r) => {
                self.ratings.insert((r.player.clone(), r.mode), r);
            }
            Row::QueueEntry(e) => self.upsert_queue_entry(e),
            Row::Match(m) => self.insert_match(m),
            Row::History(h) => self.insert_history(h),
            Row::Bet(b) => self.insert_bet(b),
            Row::Reward(r) => self.insert_reward(r),
            Row::Perk(p) => self.upsert_perk(p),
        }
    }

    /// Row changes that turn `before` into `self`.
    ///
    /// Upserts come parent tables first and deletes child tables first, so the
    /// list can be replayed against a schema with foreign keys.
    pub fn changes_since(&self, before: &Tables) -> Vec<Change> {
        let mut diff = Diff::default();
        diff.table(&before.players, &self.players, Row::Player, RowKey::Player);
        diff.table(&before.ratings, &self.ratings, Row::Rating, |(p, m)| RowKey::Rating(p, m));
        diff.table(&before.queue, &self.queue, Row::QueueEntry, |(p, m)| RowKey::QueueEntry(p, m));
        diff.table(&before.matches, &self.matches, Row::Match, RowKey::Match);
        diff.table(&before.history, &self.history, Row::History, RowKey::History);
        diff.table(&before.bets, &self.bets, Row::Bet, RowKey::Bet);
        diff.table(&before.rewards, &self.rewards, Row::Reward, RowKey::Reward);
        diff.table(&before.perks, &self.perks, Row::Perk, |(p, t)| RowKey::Perk(p, t));
        diff.into_changes()
    }
}

#[derive(Default)]
struct Diff {
    upserts: Vec<Row>,
    deletes: Vec<RowKey>,
}

impl Diff {
    fn table<K, V>(
        &mut self,
        before: &HashMap<K, V>,
        after: &HashMap<K, V>,
        to_row: impl Fn(V) -> Row,
        to_key: impl Fn(K) -> RowKey,
    ) where
        K: Eq + Hash + Clone,
        V: PartialEq + Clone,
    {
        for (key, value) in after {
            if before.get(key) != Some(value) {
                self.upserts.push(to_row(value.clone()));
            }
        }
        for key in before.keys() {
            if !after.contains_key(key) {
                self.deletes.push(to_key(key.clone()));
            }
        }
    }

    fn into_changes(mut self) -> Vec<Change> {
        self.deletes.reverse();
        self.upserts
            .into_iter()
            .map(Change::Upsert)
            .chain(self.deletes.into_iter().map(Change::Delete))
            .collect()
    }
}
