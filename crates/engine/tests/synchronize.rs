pub mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use leafsync_domain::{AttributeDefinition, EngineConfig, LeafWrite};
    use leafsync_engine::*;
    use serde_json::json;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn same_leaf_twice_writes_metadata_once() {
        let h = harness();

        h.engine.synchronize("device1.temp", "temp", Some(json!(21.5))).await;
        h.engine.synchronize("device1.temp", "temp", Some(json!(21.5))).await;

        assert_eq!(h.store.metadata_writes("device1.temp"), 1);
        assert_eq!(h.store.value_writes("device1.temp").len(), 2);
        assert!(h.engine.cache().get("device1.temp").is_some());
    }

    #[tokio::test]
    async fn changed_definition_rewrites_metadata() {
        let h = harness();

        h.engine.synchronize("dev.mode", "mode", Some(json!(1))).await;
        h.engine.synchronize("dev.mode", "mode", Some(json!("eco"))).await;

        assert_eq!(h.store.metadata_writes("dev.mode"), 2);
        assert_eq!(h.store.metadata("dev.mode").unwrap().value_type, "string");
    }

    #[tokio::test]
    async fn cold_start_reuses_stored_metadata() {
        let h = harness();
        let stored = resolve("temp", &AttributeDefinition::default(), Some(&json!(20)));
        h.store.seed_metadata("device1.temp", stored);

        let outcome = h.engine.try_synchronize("device1.temp", "temp", Some(json!(21))).await.unwrap();

        assert!(matches!(outcome, LeafOutcome::Synced { metadata_written: false, value_written: true, .. }));
        assert_eq!(h.store.metadata_writes("device1.temp"), 0);
        assert!(h.store.calls().contains(&StoreCall::LeafMetadata { path: "device1.temp".into() }));
    }

    #[tokio::test]
    async fn blacklisted_name_never_reaches_the_store() {
        let h = harness_with(catalog(json!({ "secret": { "blacklist": true } })), EngineConfig::default());

        let outcome = h.engine.try_synchronize("dev.secret", "secret", Some(json!("hunter2"))).await.unwrap();

        assert_eq!(outcome, LeafOutcome::Blacklisted);
        assert!(h.store.calls().is_empty());
        assert_eq!(h.ledger.saves(), 0);
        assert!(h.sink.reports().is_empty());
    }

    #[tokio::test]
    async fn missing_definition_warns_once_per_name() {
        let h = harness();

        h.engine.synchronize("dev1.voltage", "voltage", Some(json!(230))).await;
        h.engine.synchronize("dev2.voltage", "voltage", Some(json!(231))).await;

        assert_eq!(h.ledger.saves(), 1);
        let stored = h.ledger.stored();
        assert_eq!(
            stored.get("voltage").map(String::as_str),
            Some("State attribute definition missing for 'voltage' with value '230' (type: number)")
        );
        let warnings = h.sink.at(ReportLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].tag_value("missing_attribute"), Some("voltage"));
    }

    #[tokio::test]
    async fn previously_persisted_warning_is_not_repeated() {
        let store = MemoryStore::new();
        let ledger = MemoryLedger::with_entries([("voltage".to_owned(), "old".to_owned())].into());
        let engine = SyncEngine::builder().store(store).ledger(ledger).open().unwrap();

        engine.synchronize("dev.voltage", "voltage", Some(json!(1))).await;

        assert_eq!(engine.ledger().get("voltage").as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn modifiers_run_before_the_value_write() {
        let h = harness_with(
            catalog(json!({ "speed": { "modify": ["multiply(3.6)", "round(1)"], "unit": "km/h" } })),
            EngineConfig::default(),
        );

        h.engine.synchronize("car.speed", "speed", Some(json!(2.5))).await;

        assert_eq!(h.store.value_writes("car.speed"), vec![LeafWrite::acknowledged(json!(9))]);
        let common = h.store.metadata("car.speed").unwrap();
        assert_eq!(common.unit.as_deref(), Some("km/h"));
        assert_eq!(common.name, "speed");
    }

    #[tokio::test]
    async fn failing_modifier_step_is_reported_and_skipped() {
        let h = harness_with(catalog(json!({ "x": { "modify": ["multiply(2)", "divide(0)"] } })), EngineConfig::default());

        h.engine.synchronize("dev.x", "x", Some(json!(5))).await;

        assert_eq!(h.store.value_writes("dev.x"), vec![LeafWrite::acknowledged(json!(10))]);
        let errors = h.sink.at(ReportLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].tag_value("kind"), Some("non_finite"));
        assert_eq!(errors[0].tag_value("operation"), Some("divide(0)"));
    }

    #[tokio::test]
    async fn blank_type_and_role_fall_back_to_defaults() {
        let h = harness_with(catalog(json!({ "x": { "role": "", "type": "" } })), EngineConfig::default());

        h.engine.synchronize("dev.x", "x", Some(json!(7))).await;

        let common = h.store.metadata("dev.x").unwrap();
        assert_eq!(common.role, "state");
        assert_eq!(common.value_type, "number");
    }

    #[tokio::test]
    async fn absent_value_only_writes_metadata() {
        let h = harness();

        let outcome = h.engine.try_synchronize("dev.placeholder", "placeholder", None).await.unwrap();

        assert!(matches!(outcome, LeafOutcome::Synced { metadata_written: true, value_written: false, .. }));
        assert_eq!(h.store.metadata("dev.placeholder").unwrap().value_type, "mixed");
        assert!(h.store.value_writes("dev.placeholder").is_empty());
    }

    #[tokio::test]
    async fn leaf_path_is_sanitized() {
        let h = harness();

        let outcome = h.engine.try_synchronize("dev.a[0]", "a[0]", Some(json!(1))).await.unwrap();

        let LeafOutcome::Synced { path, .. } = outcome else { panic!("not synced") };
        assert_eq!(path, "dev.a_0_");
        assert!(h.store.leaf("dev.a_0_").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn writable_leaf_is_subscribed_exactly_once() {
        let h = harness_with(catalog(json!({ "switch": { "write": true } })), EngineConfig::default());

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let engine = h.engine.clone();
            tasks.spawn(async move { engine.try_synchronize("dev.switch", "switch", Some(json!(true))).await });
        }
        let mut fresh = 0;
        while let Some(outcome) = tasks.join_next().await {
            if let LeafOutcome::Synced { newly_subscribed: true, .. } = outcome.unwrap().unwrap() {
                fresh += 1;
            }
        }

        assert_eq!(fresh, 1);
        let subscribes = h.store.calls().into_iter().filter(|c| matches!(c, StoreCall::Subscribe { .. })).count();
        assert_eq!(subscribes, 1);
        assert!(h.store.is_subscribed("dev.switch"));
        assert!(h.engine.subscriptions().contains("dev.switch"));
    }

    #[tokio::test]
    async fn subscribed_leaf_receives_external_commands() {
        let h = harness_with(catalog(json!({ "switch": { "write": true } })), EngineConfig::default());
        let mut changes = h.store.changes();

        h.engine.synchronize("dev.switch", "switch", Some(json!(false))).await;
        assert!(h.store.external_write("dev.switch", json!(true)));

        let change = changes.recv().await.unwrap();
        assert_eq!(change.path, "dev.switch");
        assert_eq!(change.value, json!(true));
    }

    #[tokio::test]
    async fn read_only_leaf_is_not_subscribed() {
        let h = harness();

        h.engine.synchronize("dev.temp", "temp", Some(json!(1))).await;

        assert!(!h.store.is_subscribed("dev.temp"));
        assert_eq!(h.engine.subscriptions().len(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_swallowed_and_reported() {
        let h = harness();
        h.store.fail_writes_to("dev.temp");

        h.engine.synchronize("dev.temp", "temp", Some(json!(1))).await;

        let errors = h.sink.at(ReportLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].tag_value("kind"), Some("store"));
        assert!(h.engine.cache().get("dev.temp").is_none());

        let err = h.engine.try_synchronize("dev.temp", "temp", Some(json!(1))).await.unwrap_err();
        assert_eq!(err.kind(), "store");
    }
}
