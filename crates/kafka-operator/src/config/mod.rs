//! Controller configuration.
//!
//! The raw configuration is a string map (normally the process
//! environment). [`resolve`] checks it against a [`ConfigSchema`] and
//! produces an immutable [`ControllerConfig`]. Nothing is reconciled unless
//! this succeeds.

mod duration;
mod schema;

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub use duration::parse_duration;
pub use schema::{ConfigSchema, ConfigValue, SchemaEntry, ValueKind};

use crate::constants::config_keys as keys;
use crate::error::ConfigError;

/// Resolved, typed controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub zookeeper_connect: String,
    pub kafka_bootstrap_servers: String,
    /// Namespace watched for desired-state records.
    pub namespace: String,
    pub zookeeper_session_timeout: Duration,
    /// Interval between full re-dispatches of every known cluster.
    pub full_reconciliation_interval: Duration,
    /// Upper bound on a single platform call.
    pub operation_timeout: Duration,
    /// Retries of a pass after transient platform errors.
    pub max_retries: u32,
    /// Concurrent passes across different clusters.
    pub workers: usize,
}

/// Check `raw` against `schema` and build the typed configuration.
pub fn resolve(
    schema: &ConfigSchema,
    raw: &HashMap<String, String>,
) -> Result<ControllerConfig, ConfigError> {
    let mut values = resolve_values(schema, raw)?;

    let config = ControllerConfig {
        zookeeper_connect: take_text(&mut values, keys::ZOOKEEPER_CONNECT)?,
        kafka_bootstrap_servers: take_text(&mut values, keys::KAFKA_BOOTSTRAP_SERVERS)?,
        namespace: take_text(&mut values, keys::NAMESPACE)?,
        zookeeper_session_timeout: take_duration(&mut values, keys::ZOOKEEPER_SESSION_TIMEOUT_MS)?,
        full_reconciliation_interval: take_duration(
            &mut values,
            keys::FULL_RECONCILIATION_INTERVAL_MS,
        )?,
        operation_timeout: take_duration(&mut values, keys::OPERATION_TIMEOUT_MS)?,
        max_retries: take_count(&mut values, keys::RECONCILE_MAX_RETRIES)?,
        workers: take_count(&mut values, keys::RECONCILE_WORKERS)? as usize,
    };

    require_non_zero(
        keys::FULL_RECONCILIATION_INTERVAL_MS,
        config.full_reconciliation_interval,
    )?;
    require_non_zero(keys::OPERATION_TIMEOUT_MS, config.operation_timeout)?;
    Ok(config)
}

fn require_non_zero(key: &str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: "0".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

/// Validate `raw` and return every schema key mapped to its parsed value.
pub fn resolve_values(
    schema: &ConfigSchema,
    raw: &HashMap<String, String>,
) -> Result<BTreeMap<&'static str, ConfigValue>, ConfigError> {
    let mut unknown: Vec<&String> = raw.keys().filter(|k| !schema.contains(k)).collect();
    unknown.sort();
    if let Some(key) = unknown.first() {
        return Err(ConfigError::UnknownKey((*key).clone()));
    }

    if raw.is_empty() {
        let mandatory: Vec<String> = schema.required_keys().map(String::from).collect();
        if !mandatory.is_empty() {
            return Err(ConfigError::MissingMandatoryKeys(mandatory));
        }
    }

    let mut values = BTreeMap::new();
    for entry in schema.entries() {
        let raw_value = match (raw.get(entry.key), entry.default) {
            (Some(v), _) => v.as_str(),
            (None, Some(default)) => default,
            (None, None) => return Err(ConfigError::MissingKey(entry.key.to_string())),
        };
        let value = entry
            .kind
            .parse(raw_value)
            .map_err(|reason| ConfigError::InvalidValue {
                key: entry.key.to_string(),
                value: raw_value.to_string(),
                reason,
            })?;
        values.insert(entry.key, value);
    }

    Ok(values)
}

/// Collect the schema's keys from the process environment.
///
/// Variables whose names are not schema keys are left out, so the rest of
/// the environment never trips the unknown-key check.
pub fn raw_from_env(schema: &ConfigSchema) -> HashMap<String, String> {
    raw_from_vars(schema, std::env::vars())
}

fn raw_from_vars(
    schema: &ConfigSchema,
    vars: impl IntoIterator<Item = (String, String)>,
) -> HashMap<String, String> {
    vars.into_iter()
        .filter(|(k, _)| schema.contains(k))
        .collect()
}

fn take_text(
    values: &mut BTreeMap<&'static str, ConfigValue>,
    key: &'static str,
) -> Result<String, ConfigError> {
    match values.remove(key) {
        Some(ConfigValue::Text(s)) => Ok(s),
        other => Err(type_mismatch(key, other, "text")),
    }
}

fn take_duration(
    values: &mut BTreeMap<&'static str, ConfigValue>,
    key: &'static str,
) -> Result<Duration, ConfigError> {
    match values.remove(key) {
        Some(ConfigValue::Duration(d)) => Ok(d),
        other => Err(type_mismatch(key, other, "duration")),
    }
}

fn take_count(
    values: &mut BTreeMap<&'static str, ConfigValue>,
    key: &'static str,
) -> Result<u32, ConfigError> {
    match values.remove(key) {
        Some(ConfigValue::Count(n)) => Ok(n),
        other => Err(type_mismatch(key, other, "count")),
    }
}

fn type_mismatch(key: &str, found: Option<ConfigValue>, expected: &str) -> ConfigError {
    match found {
        None => ConfigError::MissingKey(key.to_string()),
        Some(v) => ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("{v:?}"),
            reason: format!("schema does not declare {key} as {expected}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mandatory() -> HashMap<String, String> {
        HashMap::from([
            (keys::ZOOKEEPER_CONNECT.into(), "localhost:2181".into()),
            (keys::KAFKA_BOOTSTRAP_SERVERS.into(), "localhost:9092".into()),
            (keys::NAMESPACE.into(), "default".into()),
        ])
    }

    #[test]
    fn test_unknown_key() {
        let raw = HashMap::from([("foo".to_string(), "bar".to_string())]);
        let err = resolve(&ConfigSchema::controller(), &raw).unwrap_err();
        assert_eq!(err, ConfigError::UnknownKey("foo".into()));
    }

    #[test]
    fn test_unknown_key_wins_over_valid_keys() {
        let mut raw = mandatory();
        raw.insert("ZOOKEEPER_CONECT".into(), "typo".into());
        let err = resolve(&ConfigSchema::controller(), &raw).unwrap_err();
        assert_eq!(err, ConfigError::UnknownKey("ZOOKEEPER_CONECT".into()));
    }

    #[test]
    fn test_empty() {
        let err = resolve(&ConfigSchema::controller(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingMandatoryKeys(ref k) if k.len() == 3));
    }

    #[test]
    fn test_empty_map_with_no_required_keys() {
        let schema = ConfigSchema::new(vec![SchemaEntry::optional(
            "TIMEOUT",
            "10",
            ValueKind::Duration,
        )]);
        let values = resolve_values(&schema, &HashMap::new()).unwrap();
        assert_eq!(
            values.get("TIMEOUT"),
            Some(&ConfigValue::Duration(Duration::from_millis(10)))
        );
    }

    #[test]
    fn test_missing_required_key() {
        let mut raw = mandatory();
        raw.remove(keys::NAMESPACE);
        let err = resolve(&ConfigSchema::controller(), &raw).unwrap_err();
        assert_eq!(err, ConfigError::MissingKey("NAMESPACE".into()));
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&ConfigSchema::controller(), &mandatory()).unwrap();
        assert_eq!(config.zookeeper_session_timeout.as_millis(), 20_000);
        assert_eq!(config.full_reconciliation_interval, Duration::from_secs(900));
        assert_eq!(config.operation_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.workers, 4);
        assert_eq!(config.namespace, "default");
    }

    #[test]
    fn test_override() {
        let mut raw = mandatory();
        raw.insert(keys::ZOOKEEPER_SESSION_TIMEOUT_MS.into(), "13 seconds".into());
        let config = resolve(&ConfigSchema::controller(), &raw).unwrap();
        assert_eq!(config.zookeeper_session_timeout.as_millis(), 13_000);
    }

    #[test]
    fn test_intervals() {
        let schema = ConfigSchema::controller();
        let mut raw = mandatory();

        raw.insert(keys::ZOOKEEPER_SESSION_TIMEOUT_MS.into(), "13 seconds".into());
        assert!(resolve(&schema, &raw).is_ok());

        raw.insert(keys::ZOOKEEPER_SESSION_TIMEOUT_MS.into(), "13seconds".into());
        assert!(resolve(&schema, &raw).is_ok());

        raw.insert(keys::ZOOKEEPER_SESSION_TIMEOUT_MS.into(), "13foos".into());
        let err = resolve(&schema, &raw).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, ref value, .. }
                if key == "ZOOKEEPER_SESSION_TIMEOUT_MS" && value == "13foos"
        ));
    }

    #[test]
    fn test_invalid_worker_count() {
        let mut raw = mandatory();
        raw.insert(keys::RECONCILE_WORKERS.into(), "0".into());
        assert!(matches!(
            resolve(&ConfigSchema::controller(), &raw),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut raw = mandatory();
        raw.insert(keys::FULL_RECONCILIATION_INTERVAL_MS.into(), "0".into());
        assert!(matches!(
            resolve(&ConfigSchema::controller(), &raw),
            Err(ConfigError::InvalidValue { ref key, .. })
                if key == "FULL_RECONCILIATION_INTERVAL_MS"
        ));
    }

    #[test]
    fn test_raw_from_vars_keeps_schema_keys_only() {
        let vars = vec![
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("NAMESPACE".to_string(), "kafka".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        let raw = raw_from_vars(&ConfigSchema::controller(), vars);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.get("NAMESPACE").map(String::as_str), Some("kafka"));
    }
}
