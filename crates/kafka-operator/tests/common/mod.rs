#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kafka_operator::events::RecordingEventPublisher;
use kafka_operator::retry::RetryConfig;
use kafka_operator::store::MemoryStore;
use kafka_operator::{ClusterKey, Reconciler};

/// A labelled desired-state record.
pub fn record(namespace: &str, name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            labels: Some(BTreeMap::from([
                ("strimzi.io/kind".to_string(), "cluster".to_string()),
                ("strimzi.io/type".to_string(), "kafka".to_string()),
            ])),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

/// The `(test, foo, 1, "image", 120, 30)` record.
pub fn foo_record() -> ConfigMap {
    foo_with(1, "image")
}

pub fn foo_with(replicas: i32, image: &str) -> ConfigMap {
    let replicas = replicas.to_string();
    record(
        "test",
        "foo",
        &[
            ("kafka-nodes", replicas.as_str()),
            ("kafka-image", image),
            ("kafka-healthcheck-delay", "120"),
            ("kafka-healthcheck-timeout", "30"),
        ],
    )
}

pub fn foo_key() -> ClusterKey {
    ClusterKey::new("test", "foo")
}

pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        jitter_factor: 0.0,
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingEventPublisher>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), 3, Duration::from_secs(5))
    }

    pub fn with_store(store: MemoryStore, max_retries: u32, timeout: Duration) -> Self {
        let store = Arc::new(store);
        let events = Arc::new(RecordingEventPublisher::new());
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            events.clone(),
            fast_retry(max_retries),
            timeout,
        ));
        Self {
            store,
            events,
            reconciler,
        }
    }
}
