#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    use crate::clock::Clock;
    use crate::error::{ErrorKind, LadderError};
    use crate::models::*;
    use crate::service::ladder_service::LeaveOutcome;
    use crate::store::{Change, Journal, Store, Tables};
    use crate::testing::{create_test_ladder, create_test_ladder_with, test_tiers, TestLadder};

    /// Helper: queue two players in a mode and return the match they land in
    async fn open_match(ladder: &TestLadder, a: &str, b: &str, mode: Mode) -> Match {
        assert_ok!(ladder.service.queue.enqueue(&a.into(), mode).await);
        let outcome = assert_ok!(ladder.service.queue.enqueue(&b.into(), mode).await);
        outcome.paired.expect("second player should be paired")
    }

    /// Helper: play and resolve one match
    async fn play(ladder: &TestLadder, winner: &str, loser: &str, mode: Mode) -> ResolutionResult {
        let record = open_match(ladder, winner, loser, mode).await;
        assert_ok!(ladder.service.matches.resolve(record.id, &winner.into()).await)
    }

    struct SwitchJournal {
        failing: AtomicBool,
    }

    #[async_trait]
    impl Journal for SwitchJournal {
        async fn load(&self) -> Result<Tables, LadderError> {
            Ok(Tables::default())
        }

        async fn apply(&self, _changes: &[Change]) -> Result<(), LadderError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(LadderError::Storage("connection reset".into()));
            }
            Ok(())
        }
    }

    // =========================================================================
    // QUEUE
    // =========================================================================

    #[tokio::test]
    async fn test_enqueue_pairs_two_players() {
        let ladder = create_test_ladder();

        let first = assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Land).await);
        assert!(first.paired.is_none());
        assert_eq!(first.waiting, 1);

        let second = assert_ok!(ladder.service.queue.enqueue(&"b".into(), Mode::Land).await);
        let record = second.paired.unwrap();
        assert_eq!(second.waiting, 0);
        assert_eq!(second.entry.state, QueueState::Matched);
        assert!(record.involves(&"a".into()) && record.involves(&"b".into()));
        assert_eq!(record.maps.len(), 3);
        assert!(record.session_ref.is_some());
        assert_eq!(ladder.gateway.threads_opened(), 1);
        assert_eq!(ladder.gateway.notifications_to("a").len(), 1);
        assert_eq!(ladder.balance("a").await, 100);
    }

    #[tokio::test]
    async fn test_enqueue_twice_is_rejected() {
        let ladder = create_test_ladder();

        assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Land).await);
        let err = assert_err!(ladder.service.queue.enqueue(&"a".into(), Mode::Land).await);
        assert!(matches!(err, LadderError::AlreadyQueued { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_enqueue_while_in_match_of_another_mode() {
        let ladder = create_test_ladder();
        open_match(&ladder, "a", "b", Mode::Land).await;

        let err = assert_err!(ladder.service.queue.enqueue(&"a".into(), Mode::Conquest).await);
        assert!(matches!(err, LadderError::AlreadyInMatch(_)));
    }

    #[tokio::test]
    async fn test_pairing_is_fifo_and_clears_other_queues() {
        let ladder = create_test_ladder();

        assert_ok!(ladder.service.queue.enqueue(&"early".into(), Mode::Land).await);
        assert_ok!(ladder.service.queue.enqueue(&"early".into(), Mode::Conquest).await);
        ladder.clock.advance(Duration::seconds(1));

        // Both early and late wait in conquest: the second joiner pairs with the earliest
        let outcome = assert_ok!(ladder.service.queue.enqueue(&"late".into(), Mode::Conquest).await);
        let record = outcome.paired.unwrap();
        assert!(record.involves(&"early".into()));

        let status = ladder.service.queue.status(&"early".into()).await;
        assert!(status.queued.is_empty());
        assert_eq!(status.active_match.map(|m| m.id), Some(record.id));
        assert!(ladder.service.queue.waiting(Mode::Land).await.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue() {
        let ladder = create_test_ladder();

        assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Domination).await);
        let left = assert_ok!(ladder.service.queue.dequeue(&"a".into(), Mode::Domination).await);
        assert!(matches!(left, DequeueOutcome::Left { .. }));

        let again = assert_ok!(ladder.service.queue.dequeue(&"a".into(), Mode::Domination).await);
        assert!(matches!(again, DequeueOutcome::NotQueued));

        // A player who left can queue again
        assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Domination).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueue_opens_exactly_one_match() {
        let ladder = create_test_ladder();
        let players: Vec<String> = (0..2).map(|i| format!("racer-{}", i)).collect();

        let handles: Vec<_> = players
            .iter()
            .map(|p| {
                let service = ladder.service.clone();
                let player = PlayerId::from(p.as_str());
                tokio::spawn(async move { service.queue.enqueue(&player, Mode::Land).await })
            })
            .collect();

        let mut paired = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if outcome.paired.is_some() {
                paired += 1;
            }
        }

        assert_eq!(paired, 1);
        assert_eq!(ladder.service.matches.active_matches().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cross_mode_joins_never_double_book() {
        for _ in 0..20 {
            let ladder = create_test_ladder();
            assert_ok!(ladder.service.queue.enqueue(&"hub".into(), Mode::Land).await);
            assert_ok!(ladder.service.queue.enqueue(&"hub".into(), Mode::Conquest).await);

            let land = {
                let service = ladder.service.clone();
                tokio::spawn(async move { service.queue.enqueue(&"x".into(), Mode::Land).await })
            };
            let conquest = {
                let service = ladder.service.clone();
                tokio::spawn(async move { service.queue.enqueue(&"y".into(), Mode::Conquest).await })
            };
            land.await.unwrap().unwrap();
            conquest.await.unwrap().unwrap();

            let active = ladder.service.matches.active_matches().await;
            assert_eq!(active.len(), 1);
            assert!(active[0].involves(&"hub".into()));
        }
    }

    #[tokio::test]
    async fn test_provisioner_failure_keeps_match() {
        let ladder = create_test_ladder();
        ladder.gateway.fail_threads(true);

        assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Land).await);
        let outcome = assert_ok!(ladder.service.queue.enqueue(&"b".into(), Mode::Land).await);

        let record = outcome.paired.unwrap();
        assert!(record.is_active());
        assert!(record.session_ref.is_none());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(ladder.service.matches.active_matches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_entries_expire() {
        let ladder = create_test_ladder();
        assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Land).await);
        ladder.clock.advance(Duration::hours(2));
        assert_ok!(ladder.service.queue.enqueue(&"b".into(), Mode::Conquest).await);

        let report = ladder.service.run_sweeps(ladder.clock.now()).await;

        assert_eq!(report.expired_entries.len(), 1);
        assert_eq!(report.expired_entries[0].player, PlayerId::from("a"));
        assert_eq!(ladder.gateway.notifications_to("a").len(), 1);
        assert_eq!(ladder.service.queue.waiting(Mode::Conquest).await.len(), 1);
    }

    #[tokio::test]
    async fn test_opened_match_clears_queue_for_other_players() {
        let ladder = create_test_ladder();
        assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Land).await);

        assert_ok!(
            ladder
                .service
                .matches
                .open(&"a".into(), &"b".into(), Mode::Conquest, vec![])
                .await
        );
        assert!(ladder.service.queue.status(&"a".into()).await.queued.is_empty());
        assert!(ladder.service.queue.waiting(Mode::Land).await.is_empty());

        // The Land queue must not be blocked by the player now in a match
        let first = assert_ok!(ladder.service.queue.enqueue(&"c".into(), Mode::Land).await);
        assert!(first.paired.is_none());
        let second = assert_ok!(ladder.service.queue.enqueue(&"d".into(), Mode::Land).await);
        let record = second.paired.unwrap();
        assert!(record.involves(&"c".into()) && record.involves(&"d".into()));
    }

    // =========================================================================
    // RESOLVE
    // =========================================================================

    #[tokio::test]
    async fn test_resolve_updates_ratings_and_history() {
        let ladder = create_test_ladder();
        let result = play(&ladder, "a", "b", Mode::Land).await;

        assert_eq!(result.match_record.status, MatchStatus::Resolved);
        assert_eq!(result.history.elo_after_winner, 1016);
        assert_eq!(result.history.elo_after_loser, 984);
        assert_eq!(ladder.elo("a", Mode::Land).await, 1016);
        assert_eq!(ladder.elo("b", Mode::Land).await, 984);

        let history = ladder.service.matches.history_for(&"a".into(), 10).await;
        assert_eq!(history.len(), 1);

        let ratings = assert_ok!(ladder.service.leaderboard.ratings_for(&"a".into()).await);
        assert_eq!((ratings[0].matches, ratings[0].wins), (1, 1));
        let ratings = assert_ok!(ladder.service.leaderboard.ratings_for(&"b".into()).await);
        assert_eq!((ratings[0].matches, ratings[0].wins), (1, 0));
    }

    #[tokio::test]
    async fn test_luckydice_uses_lower_k_factor() {
        let ladder = create_test_ladder();
        let result = play(&ladder, "a", "b", Mode::LuckyDice).await;

        assert_eq!(result.winner_delta(), 8);
        assert_eq!(result.loser_delta(), -8);
    }

    #[tokio::test]
    async fn test_resolve_rejections() {
        let ladder = create_test_ladder();
        let record = open_match(&ladder, "a", "b", Mode::Land).await;

        let err = assert_err!(ladder.service.matches.resolve(Uuid::new_v4(), &"a".into()).await);
        assert!(matches!(err, LadderError::MatchNotFound(_)));

        let err = assert_err!(ladder.service.matches.resolve(record.id, &"c".into()).await);
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_ok!(ladder.service.matches.resolve(record.id, &"a".into()).await);
        let err = assert_err!(ladder.service.matches.resolve(record.id, &"b".into()).await);
        assert!(matches!(err, LadderError::MatchNotActive(_)));

        // The failed second resolve changed nothing
        assert_eq!(ladder.service.matches.recent_history(10).await.len(), 1);
        assert_eq!(ladder.elo("b", Mode::Land).await, 984);
    }

    #[tokio::test]
    async fn test_resolve_attaches_winner_taunt() {
        let ladder = create_test_ladder();
        let record = open_match(&ladder, "a", "b", Mode::Land).await;
        assert_ok!(ladder.service.perks.buy_taunt(&"a".into(), "too easy").await);

        let result = assert_ok!(ladder.service.matches.resolve(record.id, &"a".into()).await);
        assert_eq!(result.taunt.as_deref(), Some("too easy"));
        assert!(ladder.gateway.notifications_to("b").iter().any(|m| m.contains("too easy")));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_resolution_unapplied() {
        let journal = Arc::new(SwitchJournal {
            failing: AtomicBool::new(false),
        });
        let store = assert_ok!(Store::with_journal(journal.clone()).await);
        let ladder = create_test_ladder_with(store, test_tiers());
        assert_ok!(ladder.service.ledger.register(&"c".into()).await);
        let record = open_match(&ladder, "a", "b", Mode::Land).await;
        assert_ok!(ladder.service.betting.place_bet(&"c".into(), record.id, &"a".into(), 10).await);

        journal.failing.store(true, Ordering::SeqCst);
        let err = assert_err!(ladder.service.matches.resolve(record.id, &"a".into()).await);
        assert_eq!(err.kind(), ErrorKind::Transient);

        journal.failing.store(false, Ordering::SeqCst);
        assert!(ladder.service.matches.get_match(record.id).await.unwrap().is_active());
        assert_eq!(ladder.elo("a", Mode::Land).await, 1000);
        assert!(ladder.service.matches.recent_history(10).await.is_empty());
        assert_eq!(ladder.balance("c").await, 90);
        assert_eq!(ladder.service.betting.bets_by(&"c".into()).await[0].status, BetStatus::Open);

        // Retrying once storage is back succeeds
        assert_ok!(ladder.service.matches.resolve(record.id, &"a".into()).await);
    }

    // =========================================================================
    // BETTING THROUGH THE LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_winning_bet_nets_stake() {
        let ladder = create_test_ladder();
        assert_ok!(ladder.service.ledger.register(&"c".into()).await);
        let record = open_match(&ladder, "a", "b", Mode::Land).await;

        assert_ok!(ladder.service.betting.place_bet(&"c".into(), record.id, &"a".into(), 30).await);
        assert_eq!(ladder.balance("c").await, 70);

        let result = assert_ok!(ladder.service.matches.resolve(record.id, &"a".into()).await);
        assert_eq!(result.bets.len(), 1);
        assert_eq!(ladder.balance("c").await, 130);
    }

    #[tokio::test]
    async fn test_all_in_losing_bet_ends_at_zero() {
        let ladder = create_test_ladder();
        assert_ok!(ladder.service.ledger.register(&"c".into()).await);
        let record = open_match(&ladder, "a", "b", Mode::Land).await;

        assert_ok!(ladder.service.betting.place_bet(&"c".into(), record.id, &"b".into(), 100).await);
        assert_ok!(ladder.service.matches.resolve(record.id, &"a".into()).await);

        assert_eq!(ladder.balance("c").await, 0);
        let bets = ladder.service.betting.bets_by(&"c".into()).await;
        assert_eq!(bets[0].status, BetStatus::Lost);
    }

    #[tokio::test]
    async fn test_abandon_refunds_bettors() {
        let ladder = create_test_ladder();
        assert_ok!(ladder.service.ledger.register(&"c".into()).await);
        let record = open_match(&ladder, "a", "b", Mode::Land).await;
        assert_ok!(ladder.service.betting.place_bet(&"c".into(), record.id, &"a".into(), 45).await);

        let result = assert_ok!(ladder.service.matches.abandon(&"b".into()).await);

        assert_eq!(result.match_record.status, MatchStatus::Abandoned);
        assert_eq!(result.refunds.len(), 1);
        assert_eq!(ladder.balance("c").await, 100);
        assert!(ladder.gateway.notifications_to("a").iter().any(|m| m.contains("left")));

        let err = assert_err!(ladder.service.betting.place_bet(&"c".into(), record.id, &"a".into(), 5).await);
        assert!(matches!(err, LadderError::MatchNotActive(_)));
    }

    #[tokio::test]
    async fn test_leave() {
        let ladder = create_test_ladder();

        assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Land).await);
        assert_ok!(ladder.service.queue.enqueue(&"a".into(), Mode::Conquest).await);
        let outcome = assert_ok!(ladder.service.leave(&"a".into()).await);
        assert!(matches!(outcome, LeaveOutcome::LeftQueues { ref modes } if modes.len() == 2));

        open_match(&ladder, "a", "b", Mode::Land).await;
        let outcome = assert_ok!(ladder.service.leave(&"a".into()).await);
        assert!(matches!(outcome, LeaveOutcome::Abandoned { .. }));

        let err = assert_err!(ladder.service.leave(&"a".into()).await);
        assert!(matches!(err, LadderError::NotInQueueOrMatch(_)));
    }

    // =========================================================================
    // REWARD TIERS
    // =========================================================================

    #[tokio::test]
    async fn test_tier_promotions() {
        let ladder = create_test_ladder();

        for _ in 0..9 {
            let result = play(&ladder, "champ", "rival", Mode::Land).await;
            assert!(result.tiers.award.is_none());
        }
        let tenth = play(&ladder, "champ", "rival", Mode::Land).await;
        assert_eq!(tenth.tiers.award.as_ref().unwrap().name, "tier-1");
        assert_eq!(ladder.gateway.grants(), vec![(PlayerId::from("champ"), "role-1".to_string())]);

        for _ in 0..9 {
            play(&ladder, "champ", "rival", Mode::Conquest).await;
        }
        let twentieth = play(&ladder, "champ", "rival", Mode::Conquest).await;
        assert_eq!(twentieth.tiers.award.as_ref().unwrap().name, "tier-2");
        assert_eq!(twentieth.tiers.revoke[0].tier_name, "tier-1");
        assert_eq!(ladder.gateway.revokes(), vec![(PlayerId::from("champ"), "role-1".to_string())]);

        let held = ladder.service.tiers.rewards_for(&"champ".into()).await;
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].tier_name, "tier-2");
    }

    #[tokio::test]
    async fn test_role_failure_is_a_warning() {
        let ladder = create_test_ladder();
        ladder.gateway.fail_roles(true);

        for _ in 0..9 {
            play(&ladder, "champ", "rival", Mode::Land).await;
        }
        let tenth = play(&ladder, "champ", "rival", Mode::Land).await;

        assert!(tenth.tiers.award.is_some());
        assert!(tenth.warnings.iter().any(|w| w.contains("role-1")));
        assert_eq!(ladder.service.tiers.rewards_for(&"champ".into()).await.len(), 1);
    }

    // =========================================================================
    // REVERSAL
    // =========================================================================

    #[tokio::test]
    async fn test_reverse_without_replacement() {
        let ladder = create_test_ladder();
        assert_ok!(ladder.service.ledger.register(&"c".into()).await);
        assert_ok!(ladder.service.ledger.register(&"d".into()).await);
        let record = open_match(&ladder, "a", "b", Mode::Land).await;
        assert_ok!(ladder.service.betting.place_bet(&"c".into(), record.id, &"a".into(), 20).await);
        assert_ok!(ladder.service.betting.place_bet(&"d".into(), record.id, &"b".into(), 20).await);
        assert_ok!(ladder.service.matches.resolve(record.id, &"a".into()).await);
        assert_eq!(ladder.balance("c").await, 120);
        assert_eq!(ladder.balance("d").await, 80);

        let result = assert_ok!(ladder.service.matches.reverse(record.id, None).await);

        assert_eq!(result.match_record.status, MatchStatus::Reversed);
        assert!(result.replacement.is_none());
        assert_eq!(ladder.elo("a", Mode::Land).await, 1000);
        assert_eq!(ladder.elo("b", Mode::Land).await, 1000);
        assert_eq!(ladder.balance("c").await, 100);
        assert_eq!(ladder.balance("d").await, 100);
        assert!(ladder.service.matches.recent_history(10).await.is_empty());

        let ratings = assert_ok!(ladder.service.leaderboard.ratings_for(&"a".into()).await);
        assert_eq!((ratings[0].matches, ratings[0].wins), (0, 0));

        let err = assert_err!(ladder.service.matches.reverse(record.id, None).await);
        assert!(matches!(err, LadderError::HistoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_reverse_with_replacement_winner() {
        let ladder = create_test_ladder();
        let record = open_match(&ladder, "a", "b", Mode::Land).await;
        assert_ok!(ladder.service.matches.resolve(record.id, &"a".into()).await);

        let result = assert_ok!(ladder.service.matches.reverse(record.id, Some(&"b".into())).await);

        let replacement = result.replacement.unwrap();
        assert_eq!(replacement.winner, PlayerId::from("b"));
        assert_eq!(replacement.elo_before_winner, 1000);
        assert_eq!(result.match_record.status, MatchStatus::Resolved);
        assert_eq!(ladder.elo("a", Mode::Land).await, 984);
        assert_eq!(ladder.elo("b", Mode::Land).await, 1016);

        let history = ladder.service.matches.history_for(&"a".into(), 10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].winner, PlayerId::from("b"));
    }

    #[tokio::test]
    async fn test_reverse_demotes_tier() {
        let ladder = create_test_ladder();
        let mut last = None;
        for _ in 0..10 {
            last = Some(play(&ladder, "champ", "rival", Mode::Land).await);
        }
        let last = last.unwrap();

        let result = assert_ok!(ladder.service.matches.reverse(last.match_record.id, None).await);

        let (_, change) = result
            .tier_changes
            .iter()
            .find(|(p, _)| p.as_str() == "champ")
            .unwrap();
        assert_eq!(change.revoke.len(), 1);
        assert!(ladder.service.tiers.rewards_for(&"champ".into()).await.is_empty());
        assert!(ladder.gateway.revokes().contains(&("champ".into(), "role-1".to_string())));
    }

    #[tokio::test]
    async fn test_reverse_rejects_outsider_replacement() {
        let ladder = create_test_ladder();
        let result = play(&ladder, "a", "b", Mode::Land).await;

        let err = assert_err!(
            ladder
                .service
                .matches
                .reverse(result.match_record.id, Some(&"z".into()))
                .await
        );
        assert!(matches!(err, LadderError::NotParticipant { .. }));
        assert_eq!(ladder.elo("a", Mode::Land).await, 1016);
    }

    // =========================================================================
    // ADMIN
    // =========================================================================

    #[tokio::test]
    async fn test_force_result_and_adjust_elo() {
        let ladder = create_test_ladder();

        let result = assert_ok!(ladder.service.matches.force_result(&"a".into(), &"b".into(), Mode::Domination).await);
        assert_eq!(result.match_record.status, MatchStatus::Resolved);
        assert_eq!(ladder.elo("a", Mode::Domination).await, 1016);
        assert!(ladder.service.matches.active_matches().await.is_empty());

        let rating = assert_ok!(ladder.service.matches.adjust_elo(&"a".into(), Mode::Domination, 1500).await);
        assert_eq!(rating.elo, 1500);

        let points = ladder.service.matches.elo_history(&"a".into(), Mode::Domination).await;
        assert_eq!(points.iter().map(|p| p.elo).collect::<Vec<_>>(), vec![1016]);

        let err = assert_err!(ladder.service.matches.adjust_elo(&"ghost".into(), Mode::Land, 900).await);
        assert!(matches!(err, LadderError::PlayerNotFound(_)));
    }
}
