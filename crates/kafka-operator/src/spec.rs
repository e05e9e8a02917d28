//! Typed desired state of one Kafka cluster, read from a labelled ConfigMap.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::ConfigMap;

use crate::constants::{defaults, labels, record_keys, values};
use crate::error::SpecError;

/// Identity of a managed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey {
    pub namespace: String,
    pub name: String,
}

impl ClusterKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of the cluster a record describes.
    pub fn of_record(record: &ConfigMap) -> Result<Self, SpecError> {
        let name = record
            .metadata
            .name
            .clone()
            .ok_or(SpecError::MissingIdentity("name"))?;
        let namespace = record
            .metadata
            .namespace
            .clone()
            .ok_or(SpecError::MissingIdentity("namespace"))?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Validated desired state of a Kafka cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub namespace: String,
    pub name: String,
    /// Always greater than zero.
    pub replicas: i32,
    pub image: String,
    /// Never negative.
    pub health_check_initial_delay_seconds: i32,
    /// Never negative.
    pub health_check_timeout_seconds: i32,
}

impl ClusterSpec {
    pub fn key(&self) -> ClusterKey {
        ClusterKey::new(&self.namespace, &self.name)
    }
}

/// Turn a desired-state record into a [`ClusterSpec`].
pub fn extract(record: &ConfigMap) -> Result<ClusterSpec, SpecError> {
    let key = ClusterKey::of_record(record)?;

    let record_labels = record.metadata.labels.as_ref();
    require_label(record_labels, labels::KIND, values::KIND_CLUSTER_RECORD)?;
    require_label(record_labels, labels::TYPE, values::TYPE_KAFKA)?;

    let empty = BTreeMap::new();
    let data = record.data.as_ref().unwrap_or(&empty);

    let replicas = required_int(data, record_keys::REPLICAS)?;
    if replicas <= 0 {
        return Err(SpecError::OutOfRange {
            field: record_keys::REPLICAS,
            message: format!("must be at least 1, got {replicas}"),
        });
    }

    let image = data
        .get(record_keys::IMAGE)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or(SpecError::MissingField(record_keys::IMAGE))?
        .to_string();

    let delay = optional_non_negative(
        data,
        record_keys::HEALTHCHECK_DELAY,
        defaults::HEALTHCHECK_DELAY_SECS,
    )?;
    let timeout = optional_non_negative(
        data,
        record_keys::HEALTHCHECK_TIMEOUT,
        defaults::HEALTHCHECK_TIMEOUT_SECS,
    )?;

    Ok(ClusterSpec {
        namespace: key.namespace,
        name: key.name,
        replicas,
        image,
        health_check_initial_delay_seconds: delay,
        health_check_timeout_seconds: timeout,
    })
}

fn require_label(
    record_labels: Option<&BTreeMap<String, String>>,
    label: &'static str,
    expected: &'static str,
) -> Result<(), SpecError> {
    match record_labels.and_then(|l| l.get(label)) {
        Some(v) if v == expected => Ok(()),
        _ => Err(SpecError::NotManaged { label, expected }),
    }
}

fn parse_int(field: &'static str, raw: &str) -> Result<i32, SpecError> {
    raw.trim().parse().map_err(|_| SpecError::NotANumber {
        field,
        value: raw.to_string(),
    })
}

fn required_int(data: &BTreeMap<String, String>, field: &'static str) -> Result<i32, SpecError> {
    let raw = data.get(field).ok_or(SpecError::MissingField(field))?;
    parse_int(field, raw)
}

fn optional_non_negative(
    data: &BTreeMap<String, String>,
    field: &'static str,
    default: i32,
) -> Result<i32, SpecError> {
    let value = match data.get(field) {
        Some(raw) => parse_int(field, raw)?,
        None => default,
    };
    if value < 0 {
        return Err(SpecError::OutOfRange {
            field,
            message: format!("must not be negative, got {value}"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    /// A well-formed record for `namespace/name`.
    fn record(namespace: &str, name: &str, data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some(namespace.into()),
                labels: Some(BTreeMap::from([
                    (labels::KIND.into(), values::KIND_CLUSTER_RECORD.into()),
                    (labels::TYPE.into(), values::TYPE_KAFKA.into()),
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

    fn full_record() -> ConfigMap {
        record(
            "test",
            "foo",
            &[
                ("kafka-nodes", "1"),
                ("kafka-image", "image"),
                ("kafka-healthcheck-delay", "120"),
                ("kafka-healthcheck-timeout", "30"),
            ],
        )
    }

    #[test]
    fn test_extract_full_record() {
        let spec = extract(&full_record()).unwrap();
        assert_eq!(
            spec,
            ClusterSpec {
                namespace: "test".into(),
                name: "foo".into(),
                replicas: 1,
                image: "image".into(),
                health_check_initial_delay_seconds: 120,
                health_check_timeout_seconds: 30,
            }
        );
        assert_eq!(spec.key().to_string(), "test/foo");
    }

    #[test]
    fn test_health_checks_default() {
        let cm = record("ns", "bar", &[("kafka-nodes", "3"), ("kafka-image", "kafka:3")]);
        let spec = extract(&cm).unwrap();
        assert_eq!(spec.health_check_initial_delay_seconds, 15);
        assert_eq!(spec.health_check_timeout_seconds, 5);
    }

    #[test]
    fn test_missing_replicas() {
        let cm = record("ns", "bar", &[("kafka-image", "kafka:3")]);
        assert_eq!(extract(&cm), Err(SpecError::MissingField("kafka-nodes")));
    }

    #[test]
    fn test_missing_image() {
        let cm = record("ns", "bar", &[("kafka-nodes", "3"), ("kafka-image", "  ")]);
        assert_eq!(extract(&cm), Err(SpecError::MissingField("kafka-image")));
    }

    #[test]
    fn test_non_numeric_replicas() {
        let cm = record("ns", "bar", &[("kafka-nodes", "three"), ("kafka-image", "k")]);
        assert!(matches!(
            extract(&cm),
            Err(SpecError::NotANumber { field: "kafka-nodes", .. })
        ));
    }

    #[test]
    fn test_zero_replicas_rejected() {
        let cm = record("ns", "bar", &[("kafka-nodes", "0"), ("kafka-image", "k")]);
        assert!(matches!(
            extract(&cm),
            Err(SpecError::OutOfRange { field: "kafka-nodes", .. })
        ));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let cm = record(
            "ns",
            "bar",
            &[
                ("kafka-nodes", "1"),
                ("kafka-image", "k"),
                ("kafka-healthcheck-timeout", "-1"),
            ],
        );
        assert!(matches!(
            extract(&cm),
            Err(SpecError::OutOfRange { field: "kafka-healthcheck-timeout", .. })
        ));
    }

    #[test]
    fn test_unlabelled_record_rejected() {
        let mut cm = full_record();
        cm.metadata.labels = None;
        assert!(matches!(extract(&cm), Err(SpecError::NotManaged { .. })));
    }

    #[test]
    fn test_record_without_namespace() {
        let mut cm = full_record();
        cm.metadata.namespace = None;
        assert_eq!(extract(&cm), Err(SpecError::MissingIdentity("namespace")));
    }
}
