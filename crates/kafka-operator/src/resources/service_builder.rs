use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::constants::ports;

fn clients_port() -> ServicePort {
    ServicePort {
        name: Some(ports::CLIENTS_NAME.into()),
        port: ports::CLIENTS,
        target_port: Some(IntOrString::Int(ports::CLIENTS)),
        protocol: Some(ports::PROTOCOL_TCP.into()),
        ..Default::default()
    }
}

/// Build the load-balanced client Service (virtual IP assigned by the platform).
pub fn build_client_service(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".into()),
            selector: Some(labels),
            ports: Some(vec![clients_port()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the headless peer-discovery Service.
///
/// No virtual IP is allocated. Brokers resolve each other through the
/// per-pod records the StatefulSet publishes under this name.
pub fn build_headless_service(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".into()),
            cluster_ip: Some("None".into()),
            selector: Some(labels),
            ports: Some(vec![clients_port()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
