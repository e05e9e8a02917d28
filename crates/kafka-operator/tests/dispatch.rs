mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{foo_key, foo_with, Harness};
use kafka_operator::reconciler::dispatch::Dispatcher;
use kafka_operator::resources::ResourceKind;
use kafka_operator::store::{MemoryStore, Verb};
use kafka_operator::{ClusterKey, Trigger};

fn lists(h: &Harness) -> usize {
    h.store
        .calls()
        .iter()
        .filter(|c| c.verb == Verb::List)
        .count()
}

#[tokio::test(start_paused = true)]
async fn burst_of_updates_runs_two_passes_ending_on_latest() {
    let h = Harness::with_store(
        MemoryStore::with_latency(Duration::from_millis(10)),
        3,
        Duration::from_secs(5),
    );
    let dispatcher = Dispatcher::new(h.reconciler.clone(), 4);

    for replicas in 1..=5 {
        dispatcher.notify(foo_key(), Trigger::Apply(Arc::new(foo_with(replicas, "image"))));
    }
    dispatcher.wait_idle().await;

    // Each pass lists Services and StatefulSets once.
    assert_eq!(lists(&h), 4);
    let ss = h
        .store
        .get(ResourceKind::StatefulSet, "test", "foo-kafka")
        .unwrap();
    assert_eq!(ss["spec"]["replicas"], 5);
}

#[tokio::test(start_paused = true)]
async fn deletion_after_burst_wins() {
    let h = Harness::with_store(
        MemoryStore::with_latency(Duration::from_millis(10)),
        3,
        Duration::from_secs(5),
    );
    let dispatcher = Dispatcher::new(h.reconciler.clone(), 4);

    dispatcher.notify(foo_key(), Trigger::Apply(Arc::new(foo_with(1, "image"))));
    dispatcher.notify(foo_key(), Trigger::Apply(Arc::new(foo_with(2, "image"))));
    dispatcher.notify(foo_key(), Trigger::Delete);
    dispatcher.wait_idle().await;

    assert!(h.store.names(ResourceKind::Service, "test").is_empty());
    assert!(h.store.names(ResourceKind::StatefulSet, "test").is_empty());
}

#[tokio::test(start_paused = true)]
async fn independent_clusters_all_converge() {
    let h = Harness::with_store(
        MemoryStore::with_latency(Duration::from_millis(10)),
        3,
        Duration::from_secs(5),
    );
    let dispatcher = Dispatcher::new(h.reconciler.clone(), 2);

    let names = ["alpha", "beta", "gamma", "delta", "epsilon"];
    for name in names {
        let record = common::record(
            "test",
            name,
            &[("kafka-nodes", "1"), ("kafka-image", "kafka:3.7")],
        );
        dispatcher.notify(ClusterKey::new("test", name), Trigger::Apply(Arc::new(record)));
    }
    dispatcher.wait_idle().await;

    let mut expected: Vec<String> = names.iter().map(|n| format!("{n}-kafka")).collect();
    expected.sort();
    assert_eq!(h.store.names(ResourceKind::StatefulSet, "test"), expected);
    assert_eq!(h.store.names(ResourceKind::Service, "test").len(), 10);
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn failing_cluster_does_not_block_others() {
    let h = Harness::with_store(
        MemoryStore::with_latency(Duration::from_millis(10)),
        3,
        Duration::from_secs(5),
    );
    let dispatcher = Dispatcher::new(h.reconciler.clone(), 1);

    let broken = common::record("test", "broken", &[("kafka-nodes", "zero")]);
    dispatcher.notify(ClusterKey::new("test", "broken"), Trigger::Apply(Arc::new(broken)));
    dispatcher.notify(foo_key(), Trigger::Apply(Arc::new(foo_with(1, "image"))));
    dispatcher.wait_idle().await;

    assert_eq!(h.store.names(ResourceKind::StatefulSet, "test"), vec!["foo-kafka"]);
    assert!(h
        .events
        .reasons()
        .contains(&"InvalidSpecification".to_string()));
}
