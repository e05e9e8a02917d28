//! Resource generation: `ClusterSpec` in, Kubernetes objects out.
//!
//! Everything here is pure. The same spec always yields the same objects,
//! which is what lets the reconciler compare desired and actual state.

pub mod labels;
pub mod service_builder;
pub mod statefulset_builder;

use std::fmt;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use serde_json::Value;

use crate::spec::ClusterSpec;
use labels::{headless_name, kafka_name, OwnershipLabels};

/// Kinds of object the controller manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Service,
    StatefulSet,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Service, ResourceKind::StatefulSet];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Service => "Service",
            ResourceKind::StatefulSet => "StatefulSet",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated object in the untyped form the reconciler diffs.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredResource {
    pub kind: ResourceKind,
    pub name: String,
    pub body: Value,
}

/// Everything generated for one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedResources {
    pub client_service: Service,
    pub headless_service: Service,
    pub stateful_set: StatefulSet,
}

impl GeneratedResources {
    /// Flatten into the diffable form, in a fixed order.
    pub fn into_desired(self) -> Result<Vec<DesiredResource>, serde_json::Error> {
        Ok(vec![
            desired(ResourceKind::Service, self.client_service)?,
            desired(ResourceKind::Service, self.headless_service)?,
            desired(ResourceKind::StatefulSet, self.stateful_set)?,
        ])
    }
}

fn desired<T: serde::Serialize + kube::Resource>(
    kind: ResourceKind,
    object: T,
) -> Result<DesiredResource, serde_json::Error> {
    let name = object.meta().name.clone().unwrap_or_default();
    Ok(DesiredResource {
        kind,
        name,
        body: serde_json::to_value(&object)?,
    })
}

/// Generate the resources that realize `spec`.
pub fn generate(spec: &ClusterSpec) -> GeneratedResources {
    let owner = OwnershipLabels::for_cluster(&spec.name);
    let name = kafka_name(&spec.name);
    let headless = headless_name(&spec.name);

    GeneratedResources {
        client_service: service_builder::build_client_service(
            &name,
            &spec.namespace,
            owner.to_map(),
        ),
        headless_service: service_builder::build_headless_service(
            &headless,
            &spec.namespace,
            owner.to_map(),
        ),
        stateful_set: statefulset_builder::build_broker_stateful_set(
            &name,
            &headless,
            spec,
            owner.to_map(),
        ),
    }
}
