//! Kubernetes Events attached to desired-state records.
//!
//! Publishing is fire-and-forget. A failed event is logged and never fails
//! the pass that produced it.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// `controller_name` shows up as the reporting component.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish event");
        }
    }
}

/// In-memory publisher for tests, compiled with the `testing` feature.
#[cfg(any(test, feature = "testing"))]
mod recording {
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::ObjectReference;
    use kube::runtime::events::EventType;
    use parking_lot::Mutex;

    use super::EventPublisher;

    /// An event captured by [`RecordingEventPublisher`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedEvent {
        pub object: Option<String>,
        pub warning: bool,
        pub reason: String,
        pub action: String,
        pub note: Option<String>,
    }

    /// Keeps every published event in memory.
    #[derive(Default)]
    pub struct RecordingEventPublisher {
        events: Mutex<Vec<RecordedEvent>>,
    }

    impl RecordingEventPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<RecordedEvent> {
            self.events.lock().clone()
        }

        pub fn reasons(&self) -> Vec<String> {
            self.events.lock().iter().map(|e| e.reason.clone()).collect()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingEventPublisher {
        async fn publish(
            &self,
            resource_ref: &ObjectReference,
            type_: EventType,
            reason: &str,
            action: &str,
            note: Option<String>,
        ) {
            self.events.lock().push(RecordedEvent {
                object: resource_ref.name.clone(),
                warning: matches!(type_, EventType::Warning),
                reason: reason.to_string(),
                action: action.to_string(),
                note,
            });
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub use recording::{RecordedEvent, RecordingEventPublisher};

/// Event reasons. Failures use [`crate::error::OperatorError::reason`].
pub mod reasons {
    /// A pass changed at least one resource.
    pub const RECONCILED: &str = "Reconciled";
    /// Every resource of a removed record was deleted.
    pub const CLUSTER_DELETED: &str = "ClusterDeleted";
}

pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const DELETE: &str = "Delete";
}
