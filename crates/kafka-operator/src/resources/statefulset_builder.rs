use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, PodSpec, PodTemplateSpec, Probe,
    TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::constants::{broker, ports};
use crate::spec::ClusterSpec;

/// TCP probe on the client port. Liveness and readiness share the same timing.
fn broker_probe(spec: &ClusterSpec) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(ports::CLIENTS),
            ..Default::default()
        }),
        initial_delay_seconds: Some(spec.health_check_initial_delay_seconds),
        timeout_seconds: Some(spec.health_check_timeout_seconds),
        period_seconds: Some(broker::PROBE_PERIOD_SECS),
        ..Default::default()
    }
}

/// Build the broker StatefulSet.
///
/// `service_name` must be the headless Service so each broker gets a stable
/// DNS name. The same labels go on the StatefulSet, its selector and the pod
/// template.
pub fn build_broker_stateful_set(
    name: &str,
    service_name: &str,
    spec: &ClusterSpec,
    labels: BTreeMap<String, String>,
) -> StatefulSet {
    let container = Container {
        name: broker::CONTAINER_NAME.into(),
        image: Some(spec.image.clone()),
        ports: Some(vec![ContainerPort {
            name: Some(ports::CLIENTS_NAME.into()),
            container_port: ports::CLIENTS,
            protocol: Some(ports::PROTOCOL_TCP.into()),
            ..Default::default()
        }]),
        liveness_probe: Some(broker_probe(spec)),
        readiness_probe: Some(broker_probe(spec)),
        volume_mounts: Some(vec![VolumeMount {
            name: broker::STORAGE_VOLUME.into(),
            mount_path: broker::DATA_DIR.into(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let template = PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels.clone()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![Volume {
                name: broker::STORAGE_VOLUME.into(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    };

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(spec.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(spec.replicas),
            service_name: service_name.into(),
            selector: LabelSelector {
                match_labels: Some(labels),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        ..Default::default()
    }
}
