//! Kubernetes controller for Kafka broker clusters.
//!
//! Each cluster is declared by a labelled ConfigMap. The controller turns it
//! into a client Service, a headless Service and a broker StatefulSet, and
//! keeps those in line with the record until it is deleted.

pub mod config;
pub mod constants;
pub mod controllers;
pub mod error;
pub mod events;
pub mod metrics;
pub mod reconciler;
pub mod resources;
pub mod retry;
pub mod spec;
pub mod store;
pub mod telemetry;

pub use config::{ConfigSchema, ControllerConfig};
pub use error::{ConfigError, OperatorError, PlatformError, SpecError};
pub use reconciler::{Applied, Reconciler, Trigger};
pub use spec::{ClusterKey, ClusterSpec};
