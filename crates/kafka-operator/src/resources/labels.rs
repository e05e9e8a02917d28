use std::collections::BTreeMap;

use crate::constants::{labels, values, HEADLESS_SUFFIX, KAFKA_SUFFIX};

/// Name shared by the client Service and the StatefulSet.
pub fn kafka_name(cluster_name: &str) -> String {
    format!("{cluster_name}{KAFKA_SUFFIX}")
}

/// Name of the headless peer-discovery Service.
pub fn headless_name(cluster_name: &str) -> String {
    format!("{}{HEADLESS_SUFFIX}", kafka_name(cluster_name))
}

/// The label triple that ties generated resources to their cluster.
///
/// Generation stamps it and the reconciler selects by it, so both sides
/// must build it here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipLabels {
    cluster: String,
    kind: &'static str,
    name: String,
}

impl OwnershipLabels {
    pub fn for_cluster(cluster_name: &str) -> Self {
        Self {
            cluster: cluster_name.to_string(),
            kind: values::KIND_KAFKA_CLUSTER,
            name: kafka_name(cluster_name),
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (labels::CLUSTER.into(), self.cluster.clone()),
            (labels::KIND.into(), self.kind.into()),
            (labels::NAME.into(), self.name.clone()),
        ])
    }

    /// Equality-based label selector, e.g. for `ListParams::labels`.
    pub fn selector(&self) -> String {
        self.to_map()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether `candidate` carries the whole triple.
    pub fn matches(&self, candidate: &BTreeMap<String, String>) -> bool {
        self.to_map()
            .iter()
            .all(|(k, v)| candidate.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(kafka_name("foo"), "foo-kafka");
        assert_eq!(headless_name("foo"), "foo-kafka-headless");
    }

    #[test]
    fn test_triple() {
        let map = OwnershipLabels::for_cluster("foo").to_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("strimzi.io/cluster").unwrap(), "foo");
        assert_eq!(map.get("strimzi.io/kind").unwrap(), "kafka-cluster");
        assert_eq!(map.get("strimzi.io/name").unwrap(), "foo-kafka");
    }

    #[test]
    fn test_selector_is_sorted_and_complete() {
        assert_eq!(
            OwnershipLabels::for_cluster("foo").selector(),
            "strimzi.io/cluster=foo,strimzi.io/kind=kafka-cluster,strimzi.io/name=foo-kafka"
        );
    }

    #[test]
    fn test_matches_superset_only() {
        let owner = OwnershipLabels::for_cluster("foo");
        let mut labels = owner.to_map();
        labels.insert("extra".into(), "x".into());
        assert!(owner.matches(&labels));

        labels.insert("strimzi.io/cluster".into(), "bar".into());
        assert!(!owner.matches(&labels));
        assert!(!owner.matches(&BTreeMap::new()));
    }
}
