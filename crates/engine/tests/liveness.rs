pub mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use leafsync_domain::LeafWrite;
    use leafsync_engine::*;
    use serde_json::{Value, json};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn offline() -> LeafWrite {
        LeafWrite::acknowledged(json!(false))
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn liveness_leaf_expires_after_interval_and_grace() {
        let h = harness_with(AttributeCatalog::new(), with_interval(10));

        h.engine.flatten(json!({ "online": true }), Some("dev"), TraverseOptions::default()).await;
        assert!(h.engine.timers().is_armed("dev.online"));

        settle(Duration::from_secs(14)).await;
        assert_eq!(h.store.value_writes("dev.online"), [LeafWrite::acknowledged(json!(true))]);

        settle(Duration::from_secs(2)).await;
        assert_eq!(h.store.value_writes("dev.online"), [LeafWrite::acknowledged(json!(true)), offline()]);
        assert_eq!(h.store.leaf("dev.online").unwrap().value, json!(false));
        assert!(!h.engine.timers().is_armed("dev.online"));

        settle(Duration::from_secs(60)).await;
        assert_eq!(h.store.value_writes("dev.online").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_supersedes_the_pending_expiry() {
        let h = harness_with(AttributeCatalog::new(), with_interval(10));

        h.engine.synchronize("dev.online", "online", Some(json!(true))).await;
        settle(Duration::from_secs(10)).await;
        h.engine.synchronize("dev.online", "online", Some(json!(true))).await;
        assert_eq!(h.engine.timers().pending(), 1);

        settle(Duration::from_secs(10)).await;
        assert!(!h.store.value_writes("dev.online").contains(&offline()));

        settle(Duration::from_secs(6)).await;
        let offline_writes = h.store.value_writes("dev.online").into_iter().filter(|w| *w == offline()).count();
        assert_eq!(offline_writes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_interval_means_no_timer() {
        let h = harness();

        h.engine.synchronize("dev.online", "online", Some(json!(true))).await;

        assert_eq!(h.engine.timers().pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_aborts_pending_expiries() {
        let h = harness_with(AttributeCatalog::new(), with_interval(10));
        h.engine.synchronize("a.online", "online", Some(json!(true))).await;
        h.engine.synchronize("b.online", "online", Some(json!(true))).await;
        assert_eq!(h.engine.timers().pending(), 2);

        h.engine.close();
        settle(Duration::from_secs(30)).await;

        assert_eq!(h.engine.timers().pending(), 0);
        assert!(!h.store.value_writes("a.online").contains(&offline()));
        assert!(!h.store.value_writes("b.online").contains(&offline()));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_nulls_leaves_not_newer_than_online() {
        let h = harness();
        h.store.seed_value("online", json!(true), 1_000);
        h.store.seed_value("dev.a", json!(1), 900);
        h.store.seed_value("dev.b", json!("same"), 1_000);
        h.store.seed_value("dev.c", json!(true), 1_100);
        h.store.seed_value("dev.d", Value::Null, 0);

        let outcome = h.engine.sweep("*").await;

        assert_eq!(outcome, SweepOutcome::Completed { nulled: vec!["dev.a".to_owned(), "dev.b".to_owned()] });
        assert!(h.store.leaf("dev.a").unwrap().value.is_null());
        assert!(h.store.leaf("dev.b").unwrap().value.is_null());
        assert_eq!(h.store.leaf("dev.c").unwrap().value, json!(true));
        assert_eq!(h.store.leaf("online").unwrap().value, json!(true));
        assert!(h.store.value_writes("dev.d").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_pattern_limits_candidates() {
        let h = harness();
        h.store.seed_value("online", json!(true), 1_000);
        h.store.seed_value("dev.a", json!(1), 1);
        h.store.seed_value("other.a", json!(1), 1);

        let outcome = h.engine.sweep("dev.*").await;

        assert_eq!(outcome, SweepOutcome::Completed { nulled: vec!["dev.a".to_owned()] });
        assert_eq!(h.store.leaf("other.a").unwrap().value, json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_aborts_without_a_truthy_liveness_leaf() {
        let h = harness();
        h.store.seed_value("dev.a", json!(1), 1);

        assert_eq!(h.engine.sweep("*").await, SweepOutcome::Aborted);

        h.store.seed_value("online", json!(false), 10);
        assert_eq!(h.engine.sweep("*").await, SweepOutcome::Aborted);

        assert_eq!(h.store.leaf("dev.a").unwrap().value, json!(1));
        let warnings = h.sink.at(ReportLevel::Warning);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|r| r.tag_value("kind") == Some("sweep_abort")));
    }

    #[tokio::test]
    async fn mark_online_rewrites_only_stale_liveness() {
        let h = harness();

        assert!(h.engine.mark_online().await.unwrap());
        assert_eq!(h.store.leaf("online").unwrap().value, json!(true));

        assert!(!h.engine.mark_online().await.unwrap());
        assert_eq!(h.store.value_writes("online").len(), 1);

        let now = u64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis()).unwrap();
        h.store.seed_value("online", json!(true), now - 60_000);
        assert!(h.engine.mark_online().await.unwrap());
        assert_eq!(h.store.value_writes("online").len(), 2);
    }
}
