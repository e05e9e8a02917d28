/// Label keys shared by desired-state records and generated resources.
pub mod labels {
    pub const CLUSTER: &str = "strimzi.io/cluster";
    pub const KIND: &str = "strimzi.io/kind";
    pub const NAME: &str = "strimzi.io/name";

    /// Carried by desired-state ConfigMaps only.
    pub const TYPE: &str = "strimzi.io/type";
}

/// Label values.
pub mod values {
    /// Role tag stamped on every generated Kafka resource.
    pub const KIND_KAFKA_CLUSTER: &str = "kafka-cluster";

    /// Marks a ConfigMap as a cluster desired-state record.
    pub const KIND_CLUSTER_RECORD: &str = "cluster";
    pub const TYPE_KAFKA: &str = "kafka";
}

/// Data keys read from a desired-state ConfigMap.
pub mod record_keys {
    pub const REPLICAS: &str = "kafka-nodes";
    pub const IMAGE: &str = "kafka-image";
    pub const HEALTHCHECK_DELAY: &str = "kafka-healthcheck-delay";
    pub const HEALTHCHECK_TIMEOUT: &str = "kafka-healthcheck-timeout";
}

/// Environment keys understood by the configuration schema.
pub mod config_keys {
    pub const ZOOKEEPER_CONNECT: &str = "ZOOKEEPER_CONNECT";
    pub const KAFKA_BOOTSTRAP_SERVERS: &str = "KAFKA_BOOTSTRAP_SERVERS";
    pub const NAMESPACE: &str = "NAMESPACE";
    pub const ZOOKEEPER_SESSION_TIMEOUT_MS: &str = "ZOOKEEPER_SESSION_TIMEOUT_MS";
    pub const FULL_RECONCILIATION_INTERVAL_MS: &str = "FULL_RECONCILIATION_INTERVAL_MS";
    pub const OPERATION_TIMEOUT_MS: &str = "OPERATION_TIMEOUT_MS";
    pub const RECONCILE_MAX_RETRIES: &str = "RECONCILE_MAX_RETRIES";
    pub const RECONCILE_WORKERS: &str = "RECONCILE_WORKERS";
}

/// Ports.
pub mod ports {
    pub const CLIENTS: i32 = 9092;
    pub const CLIENTS_NAME: &str = "clients";
    pub const PROTOCOL_TCP: &str = "TCP";
}

/// Defaults applied when a record or the environment leaves a value out.
pub mod defaults {
    pub const HEALTHCHECK_DELAY_SECS: i32 = 15;
    pub const HEALTHCHECK_TIMEOUT_SECS: i32 = 5;

    pub const ZOOKEEPER_SESSION_TIMEOUT_MS: &str = "20000";
    pub const FULL_RECONCILIATION_INTERVAL_MS: &str = "900000";
    pub const OPERATION_TIMEOUT_MS: &str = "60000";
    pub const RECONCILE_MAX_RETRIES: &str = "5";
    pub const RECONCILE_WORKERS: &str = "4";

    pub const METRICS_ADDR: &str = "0.0.0.0:8080";
    pub const LOG_LEVEL: &str = "info";
}

/// Pod template details for the broker StatefulSet.
pub mod broker {
    pub const CONTAINER_NAME: &str = "kafka";
    pub const STORAGE_VOLUME: &str = "kafka-storage";
    pub const DATA_DIR: &str = "/var/lib/kafka";
    pub const PROBE_PERIOD_SECS: i32 = 10;
}

/// Resource name suffixes.
pub const KAFKA_SUFFIX: &str = "-kafka";
pub const HEADLESS_SUFFIX: &str = "-headless";

/// Field manager and event reporter name.
pub const CONTROLLER_NAME: &str = "kafka-operator";
