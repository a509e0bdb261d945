//! End-to-end scenarios for the session lifecycle and broadcast protocol
//!
//! Every scenario drives the real runtime through the harness; only the
//! identity provider and the score store are scripted.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use clickrank_core::{
        ClientEvent, CoordinatorConfig, CounterSeed, NewUserRequest, RankingComparison,
        RankingConfig, RankingEntry, RankingSnapshot, ServerEvent, UserId,
    };
    use clickrank_runtime::AuthState;
    use clickrank_store::ScoreStore;

    use crate::{counter_values, ranking_updates, FlakyStore, GatedVerifier, Harness};

    fn config(comparison: RankingComparison, limit: usize) -> CoordinatorConfig {
        CoordinatorConfig {
            ranking: RankingConfig { limit, comparison },
            counter_seed: CounterSeed::Zero,
            ..Default::default()
        }
    }

    async fn harness(
        verifier: GatedVerifier,
        comparison: RankingComparison,
    ) -> Harness<GatedVerifier, FlakyStore> {
        Harness::start(verifier, FlakyStore::new(), config(comparison, 10))
            .await
            .unwrap()
    }

    // ========================================================================
    // ANONYMOUS AND AUTHENTICATED CLIENTS
    // ========================================================================

    #[tokio::test]
    async fn test_two_client_scenario() {
        let h = harness(
            GatedVerifier::open().with_user("tok-u1", "u1"),
            RankingComparison::Standing,
        )
        .await;
        let mut a = h.connect(None);
        let mut b = h.connect_resolved("tok-u1").await;

        h.send(&a, ClientEvent::Click).await;
        assert_eq!(h.counter(), 0);
        assert!(a.drain().is_empty());
        assert!(b.drain().is_empty());

        for _ in 0..3 {
            h.send(&b, ClientEvent::Click).await;
        }

        for events in [a.drain(), b.drain()] {
            assert_eq!(counter_values(&events), vec![1, 2, 3]);
            let rankings = ranking_updates(&events);
            assert_eq!(rankings.len(), 1);
            assert_eq!(rankings[0].position_of(&UserId::from("u1")), Some(0));
            // the ranking follows the counter update that caused it
            assert_eq!(events[0], ServerEvent::CounterUpdated(1));
            assert!(matches!(events[1], ServerEvent::RankingUpdated(_)));
        }
        assert_eq!(h.store().inner().read_count(&UserId::from("u1")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_full_comparison_rebroadcasts_count_changes() {
        let h = harness(
            GatedVerifier::open().with_user("tok-u1", "u1"),
            RankingComparison::Full,
        )
        .await;
        let mut b = h.connect_resolved("tok-u1").await;

        for _ in 0..3 {
            h.send(&b, ClientEvent::Click).await;
        }

        let rankings = ranking_updates(&b.drain());
        let counts: Vec<u64> = rankings.iter().map(|r| r.entries()[0].count).collect();
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unchanged_top_n_is_never_rebroadcast() {
        let store = FlakyStore::new();
        store.inner().write_count(&UserId::from("leader"), 1_000).await.unwrap();
        let h = Harness::start(
            GatedVerifier::open().with_user("tok-u2", "u2"),
            store,
            config(RankingComparison::Full, 1),
        )
        .await
        .unwrap();
        let mut watcher = h.connect(None);
        let clicker = h.connect_resolved("tok-u2").await;

        for _ in 0..5 {
            h.send(&clicker, ClientEvent::Click).await;
        }

        let events = watcher.drain();
        assert_eq!(counter_values(&events), vec![1, 2, 3, 4, 5]);
        let rankings = ranking_updates(&events);
        assert_eq!(rankings.len(), 1, "only the first observation of the top-1 is new");
        assert_eq!(
            rankings[0],
            RankingSnapshot::from_entries(vec![RankingEntry::new("leader", 1_000)])
        );
    }

    #[tokio::test]
    async fn test_overtaking_triggers_ranking_update() {
        let h = harness(
            GatedVerifier::open()
                .with_user("tok-a", "a")
                .with_user("tok-b", "b"),
            RankingComparison::Standing,
        )
        .await;
        let mut a = h.connect_resolved("tok-a").await;
        let b = h.connect_resolved("tok-b").await;

        h.send(&a, ClientEvent::Click).await; // a:1
        h.send(&a, ClientEvent::Click).await; // a:2
        h.send(&b, ClientEvent::Click).await; // b:3, overtakes a

        let rankings = ranking_updates(&a.drain());
        let standings: Vec<Vec<String>> = rankings
            .iter()
            .map(|r| r.standing().map(|u| u.to_string()).collect())
            .collect();
        assert_eq!(
            standings,
            vec![vec!["a".to_string()], vec!["b".to_string(), "a".to_string()]]
        );
    }

    // ========================================================================
    // IDENTITY RESOLUTION
    // ========================================================================

    #[tokio::test]
    async fn test_click_before_resolution_is_unauthenticated() {
        let h = harness(
            GatedVerifier::held().with_user("tok-u1", "u1"),
            RankingComparison::Full,
        )
        .await;
        let mut watcher = h.connect(None);
        let mut b = h.connect(Some("tok-u1"));
        assert!(b.session().is_auth_pending());

        h.send(&b, ClientEvent::Click).await;
        h.send(&b, ClientEvent::RequestOwnCount).await;
        assert_eq!(h.counter(), 0);
        assert_eq!(b.drain(), vec![ServerEvent::OwnCount(0)]);
        assert!(watcher.drain().is_empty());

        h.verifier().release(1);
        b.resolved().await;
        assert_eq!(b.session().auth_state(), AuthState::Verified(UserId::from("u1")));

        h.send(&b, ClientEvent::Click).await;
        assert_eq!(h.counter(), 1);
        assert_eq!(counter_values(&watcher.drain()), vec![1]);
    }

    #[tokio::test]
    async fn test_connection_accepted_while_resolution_hangs() {
        let h = harness(
            GatedVerifier::held().with_user("tok-u1", "u1"),
            RankingComparison::Full,
        )
        .await;
        let mut pending = h.connect(Some("tok-u1"));
        let mut other = h.connect(None);

        // Both sessions are served while the verifier never answers
        h.send(&pending, ClientEvent::RequestRanking).await;
        h.send(&other, ClientEvent::RequestRanking).await;
        assert_eq!(pending.drain(), vec![ServerEvent::RankingSnapshot(RankingSnapshot::empty())]);
        assert_eq!(other.drain(), vec![ServerEvent::RankingSnapshot(RankingSnapshot::empty())]);
        assert_eq!(h.runtime().stats().connections, 2);
    }

    #[tokio::test]
    async fn test_failed_resolution_degrades_to_anonymous() {
        let h = harness(GatedVerifier::open(), RankingComparison::Full).await;
        let mut client = h.connect_resolved("expired-token").await;

        assert_eq!(client.session().auth_state(), AuthState::Rejected);
        h.send(&client, ClientEvent::Click).await;
        h.send(&client, ClientEvent::RequestRanking).await;
        assert_eq!(
            client.drain(),
            vec![ServerEvent::RankingSnapshot(RankingSnapshot::empty())]
        );
        assert_eq!(h.counter(), 0);
        assert!(h.runtime().sessions().get(client.id()).is_some());
        assert_eq!(h.verifier().verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_during_resolution() {
        let h = harness(
            GatedVerifier::held()
                .with_user("tok-u1", "u1")
                .with_user("tok-u2", "u2"),
            RankingComparison::Full,
        )
        .await;
        let mut leaving = h.connect(Some("tok-u1"));
        let mut staying = h.connect(Some("tok-u2"));
        h.disconnect(&leaving);

        h.verifier().release(2);
        leaving.resolved().await;
        staying.resolved().await;

        assert!(h.runtime().sessions().get(leaving.id()).is_none());
        assert!(!h.runtime().fanout().contains(leaving.id()));
        assert_eq!(h.runtime().stats().connections, 1);

        h.send(&staying, ClientEvent::Click).await;
        assert!(leaving.drain().is_empty());
        assert_eq!(counter_values(&staying.drain()), vec![1]);
    }

    // ========================================================================
    // DEGRADED COLLABORATORS
    // ========================================================================

    #[tokio::test]
    async fn test_anonymous_own_count_never_touches_store() {
        let h = harness(GatedVerifier::open(), RankingComparison::Full).await;
        let mut client = h.connect(None);

        h.send(&client, ClientEvent::RequestOwnCount).await;
        assert_eq!(client.drain(), vec![ServerEvent::OwnCount(0)]);
        assert_eq!(h.store().reads(), 0);
    }

    #[tokio::test]
    async fn test_ranking_request_survives_store_failure() {
        let h = harness(GatedVerifier::open(), RankingComparison::Full).await;
        h.store().inner().write_count(&UserId::from("u1"), 4).await.unwrap();
        h.store().fail_queries(true);
        let mut client = h.connect(None);

        h.send(&client, ClientEvent::RequestRanking).await;
        assert_eq!(
            client.drain(),
            vec![ServerEvent::RankingSnapshot(RankingSnapshot::empty())]
        );

        h.store().fail_queries(false);
        h.send(&client, ClientEvent::RequestRanking).await;
        assert_eq!(
            client.drain(),
            vec![ServerEvent::RankingSnapshot(RankingSnapshot::from_entries(vec![
                RankingEntry::new("u1", 4)
            ]))]
        );
    }

    #[tokio::test]
    async fn test_own_count_read_failure_yields_zero() {
        let h = harness(
            GatedVerifier::open().with_user("tok-u1", "u1"),
            RankingComparison::Full,
        )
        .await;
        h.store().inner().write_count(&UserId::from("u1"), 12).await.unwrap();
        let mut client = h.connect_resolved("tok-u1").await;

        h.send(&client, ClientEvent::RequestOwnCount).await;
        h.store().fail_reads(true);
        h.send(&client, ClientEvent::RequestOwnCount).await;
        assert_eq!(
            client.drain(),
            vec![ServerEvent::OwnCount(12), ServerEvent::OwnCount(0)]
        );
    }

    #[tokio::test]
    async fn test_write_failure_does_not_roll_back() {
        let h = harness(
            GatedVerifier::open().with_user("tok-u1", "u1"),
            RankingComparison::Full,
        )
        .await;
        let mut client = h.connect_resolved("tok-u1").await;

        h.send(&client, ClientEvent::Click).await;
        h.store().fail_writes(true);
        h.send(&client, ClientEvent::Click).await;

        assert_eq!(h.counter(), 2);
        assert_eq!(counter_values(&client.drain()), vec![1, 2]);
        // in-memory counter is ahead of the stored value until the next good write
        assert_eq!(h.store().inner().read_count(&UserId::from("u1")).await.unwrap(), 1);

        h.store().fail_writes(false);
        h.send(&client, ClientEvent::Click).await;
        assert_eq!(h.store().inner().read_count(&UserId::from("u1")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ranking_query_failure_skips_broadcast_only() {
        let h = harness(
            GatedVerifier::open().with_user("tok-u1", "u1"),
            RankingComparison::Full,
        )
        .await;
        let mut client = h.connect_resolved("tok-u1").await;
        h.store().fail_queries(true);

        h.send(&client, ClientEvent::Click).await;
        let events = client.drain();
        assert_eq!(counter_values(&events), vec![1]);
        assert!(ranking_updates(&events).is_empty());
        assert!(h.runtime().coordinator().ranking().last_broadcast().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hung_store_read_does_not_block_other_sessions() {
        let h = Arc::new(
            Harness::start(
                GatedVerifier::open().with_user("tok-u1", "u1"),
                FlakyStore::new().with_held_reads(),
                CoordinatorConfig::default(),
            )
            .await
            .unwrap(),
        );
        let mut stuck = h.connect_resolved("tok-u1").await;
        let mut other = h.connect(None);

        let pending = {
            let h = Arc::clone(&h);
            let session = Arc::clone(stuck.session());
            tokio::spawn(async move {
                h.runtime().dispatch(&session, ClientEvent::RequestOwnCount).await;
            })
        };

        tokio::time::timeout(Duration::from_secs(5), h.send(&other, ClientEvent::RequestRanking))
            .await
            .expect("unrelated session was blocked");
        assert_eq!(other.drain().len(), 1);
        assert!(stuck.drain().is_empty());

        h.store().release_reads(1);
        pending.await.unwrap();
        assert_eq!(stuck.drain(), vec![ServerEvent::OwnCount(0)]);
    }

    // ========================================================================
    // CONCURRENCY
    // ========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_late_write_from_another_tab_never_lowers_stored_count() {
        let h = Arc::new(
            Harness::start(
                GatedVerifier::open().with_user("tok-u1", "u1"),
                FlakyStore::new(),
                CoordinatorConfig::default(),
            )
            .await
            .unwrap(),
        );
        let mut watcher = h.connect(None);
        let first_tab = h.connect_resolved("tok-u1").await;
        let second_tab = h.connect_resolved("tok-u1").await;
        let user = UserId::from("u1");

        h.store().hold_next_write();
        let first_click = {
            let h = Arc::clone(&h);
            let session = Arc::clone(first_tab.session());
            tokio::spawn(async move {
                h.runtime().dispatch(&session, ClientEvent::Click).await;
            })
        };
        while h.store().writes() < 1 {
            tokio::task::yield_now().await;
        }

        h.send(&second_tab, ClientEvent::Click).await;
        assert_eq!(h.store().inner().read_count(&user).await.unwrap(), 2);

        // the write for value 1 lands after the write for value 2
        h.store().release_held_write();
        first_click.await.unwrap();

        assert_eq!(h.counter(), 2);
        assert_eq!(h.store().inner().read_count(&user).await.unwrap(), 2);
        let events = watcher.drain();
        assert_eq!(counter_values(&events), vec![1, 2]);
        let counts: Vec<u64> = ranking_updates(&events)
            .iter()
            .map(|r| r.entries()[0].count)
            .collect();
        assert_eq!(counts, vec![2]);
        assert_eq!(
            h.runtime().coordinator().ranking().last_broadcast().entries()[0].count,
            2
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_clicks_are_serialized() {
        const CLIENTS: usize = 8;
        const CLICKS: usize = 50;

        let mut verifier = GatedVerifier::open();
        for i in 0..CLIENTS {
            verifier = verifier.with_user(&format!("tok-{}", i), &format!("u{}", i));
        }
        let h = Arc::new(
            Harness::start(verifier, FlakyStore::new(), CoordinatorConfig::default())
                .await
                .unwrap(),
        );
        let mut watcher = h.connect(None);

        let mut clients = Vec::new();
        for i in 0..CLIENTS {
            clients.push(h.connect_resolved(&format!("tok-{}", i)).await);
        }

        let tasks: Vec<_> = clients
            .iter()
            .map(|client| {
                let h = Arc::clone(&h);
                let session = Arc::clone(client.session());
                tokio::spawn(async move {
                    for _ in 0..CLICKS {
                        h.runtime().dispatch(&session, ClientEvent::Click).await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let total = (CLIENTS * CLICKS) as u64;
        assert_eq!(h.counter(), total);
        let observed = counter_values(&watcher.drain());
        assert_eq!(observed, (1..=total).collect::<Vec<u64>>());
        for client in clients.iter_mut() {
            assert_eq!(counter_values(&client.drain()).last(), Some(&total));
        }
    }

    #[tokio::test]
    async fn test_counter_seeded_from_store_total() {
        let store = FlakyStore::new();
        store.inner().write_count(&UserId::from("a"), 30).await.unwrap();
        store.inner().write_count(&UserId::from("b"), 12).await.unwrap();
        let h = Harness::start(
            GatedVerifier::open().with_user("tok-a", "a"),
            store,
            CoordinatorConfig {
                counter_seed: CounterSeed::StoreTotal,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let mut client = h.connect_resolved("tok-a").await;

        h.send(&client, ClientEvent::Click).await;
        assert_eq!(counter_values(&client.drain()), vec![43]);
    }

    // ========================================================================
    // ADMINISTRATIVE BOUNDARY
    // ========================================================================

    #[tokio::test]
    async fn test_user_creation_missing_password_skips_provider() {
        let h = harness(GatedVerifier::open(), RankingComparison::Full).await;
        let request = NewUserRequest {
            email: Some("ana@example.com".into()),
            password: None,
            display_name: Some("Ana".into()),
        };

        let err = h.runtime().create_user(request).await.unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(h.verifier().create_calls(), 0);
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn run<F: std::future::Future>(future: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(future)
        }

        proptest! {
            // Client 0 is anonymous, the rest are signed in
            #[test]
            fn prop_only_accepted_clicks_reach_the_counter(
                clicks in prop::collection::vec(0usize..4, 0..40)
            ) {
                run(async {
                    let verifier = GatedVerifier::open()
                        .with_user("tok-1", "u1")
                        .with_user("tok-2", "u2")
                        .with_user("tok-3", "u3");
                    let h = harness(verifier, RankingComparison::Standing).await;
                    let mut watcher = h.connect(None);
                    let clients = vec![
                        h.connect(None),
                        h.connect_resolved("tok-1").await,
                        h.connect_resolved("tok-2").await,
                        h.connect_resolved("tok-3").await,
                    ];

                    for &who in &clicks {
                        h.send(&clients[who], ClientEvent::Click).await;
                    }

                    let accepted = clicks.iter().filter(|&&who| who != 0).count() as u64;
                    let events = watcher.drain();
                    assert_eq!(h.counter(), accepted);
                    assert_eq!(counter_values(&events), (1..=accepted).collect::<Vec<u64>>());

                    let rankings = ranking_updates(&events);
                    for pair in rankings.windows(2) {
                        assert!(!pair[0].same_standing(&pair[1]));
                    }
                });
            }
        }
    }
}
