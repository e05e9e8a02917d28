use std::time::Duration;

use super::duration::parse_duration;
use crate::constants::{config_keys as keys, defaults};

/// How a raw configuration string is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Any non-empty string.
    Text,
    /// Duration literal, see [`parse_duration`].
    Duration,
    /// Integer greater than zero.
    PositiveCount,
}

/// A parsed configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Text(String),
    Duration(Duration),
    Count(u32),
}

impl ValueKind {
    pub fn parse(self, raw: &str) -> Result<ConfigValue, String> {
        match self {
            ValueKind::Text if raw.is_empty() => Err("value is empty".into()),
            ValueKind::Text => Ok(ConfigValue::Text(raw.to_string())),
            ValueKind::Duration => parse_duration(raw).map(ConfigValue::Duration),
            ValueKind::PositiveCount => match raw.parse::<u32>() {
                Ok(0) => Err("must be greater than zero".into()),
                Ok(n) => Ok(ConfigValue::Count(n)),
                Err(e) => Err(format!("not a positive integer: {e}")),
            },
        }
    }
}

/// One recognised configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub key: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
    pub kind: ValueKind,
}

impl SchemaEntry {
    pub const fn required(key: &'static str, kind: ValueKind) -> Self {
        Self {
            key,
            required: true,
            default: None,
            kind,
        }
    }

    pub const fn optional(key: &'static str, default: &'static str, kind: ValueKind) -> Self {
        Self {
            key,
            required: false,
            default: Some(default),
            kind,
        }
    }
}

/// The fixed set of keys the controller understands.
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    entries: Vec<SchemaEntry>,
}

impl ConfigSchema {
    pub fn new(entries: Vec<SchemaEntry>) -> Self {
        Self { entries }
    }

    /// Schema of the controller process.
    pub fn controller() -> Self {
        Self::new(vec![
            SchemaEntry::required(keys::ZOOKEEPER_CONNECT, ValueKind::Text),
            SchemaEntry::required(keys::KAFKA_BOOTSTRAP_SERVERS, ValueKind::Text),
            SchemaEntry::required(keys::NAMESPACE, ValueKind::Text),
            SchemaEntry::optional(
                keys::ZOOKEEPER_SESSION_TIMEOUT_MS,
                defaults::ZOOKEEPER_SESSION_TIMEOUT_MS,
                ValueKind::Duration,
            ),
            SchemaEntry::optional(
                keys::FULL_RECONCILIATION_INTERVAL_MS,
                defaults::FULL_RECONCILIATION_INTERVAL_MS,
                ValueKind::Duration,
            ),
            SchemaEntry::optional(
                keys::OPERATION_TIMEOUT_MS,
                defaults::OPERATION_TIMEOUT_MS,
                ValueKind::Duration,
            ),
            SchemaEntry::optional(
                keys::RECONCILE_MAX_RETRIES,
                defaults::RECONCILE_MAX_RETRIES,
                ValueKind::PositiveCount,
            ),
            SchemaEntry::optional(
                keys::RECONCILE_WORKERS,
                defaults::RECONCILE_WORKERS,
                ValueKind::PositiveCount,
            ),
        ])
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&SchemaEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().filter(|e| e.required).map(|e| e.key)
    }
}
