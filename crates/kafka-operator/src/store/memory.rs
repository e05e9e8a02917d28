use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{object_name, ResourceStore};
use crate::error::PlatformError;
use crate::reconciler::diff::apply_merge_patch;
use crate::resources::labels::OwnershipLabels;
use crate::resources::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    List,
    Create,
    Patch,
    Delete,
}

/// One call made against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub verb: Verb,
    pub kind: ResourceKind,
    pub namespace: String,
    /// `None` for lists.
    pub name: Option<String>,
}

type ObjectKey = (ResourceKind, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    calls: Vec<StoreCall>,
    faults: VecDeque<(Verb, PlatformError)>,
    version: u64,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn take_fault(&mut self, verb: Verb) -> Option<PlatformError> {
        let pos = self.faults.iter().position(|(v, _)| *v == verb)?;
        self.faults.remove(pos).map(|(_, e)| e)
    }
}

/// In-process [`ResourceStore`] that behaves like a small API server.
///
/// Created objects get a `resourceVersion`, a `uid` and the defaults the
/// real platform fills in (a virtual IP for non-headless Services, the pod
/// management policy on StatefulSets), so a reconciler that compares too
/// eagerly would see spurious drift. Failures can be queued per verb with
/// [`MemoryStore::fail_next`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::default(),
            latency: Some(latency),
        }
    }

    /// Make the next call with `verb` fail with `error`.
    pub fn fail_next(&self, verb: Verb, error: PlatformError) {
        self.state.lock().faults.push_back((verb, error));
    }

    /// Store `body` as-is, bypassing defaulting and the call log.
    pub fn insert(&self, kind: ResourceKind, namespace: &str, body: Value) {
        let name = object_name(&body).unwrap_or_default().to_string();
        self.state
            .lock()
            .objects
            .insert((kind, namespace.to_string(), name), body);
    }

    pub fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Names of every stored object of `kind` in `namespace`, sorted.
    pub fn names(&self, kind: ResourceKind, namespace: &str) -> Vec<String> {
        self.state
            .lock()
            .objects
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    /// Calls that changed state, i.e. everything but lists.
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.verb != Verb::List)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    async fn enter(
        &self,
        verb: Verb,
        kind: ResourceKind,
        namespace: &str,
        name: Option<&str>,
    ) -> Result<(), PlatformError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock();
        state.calls.push(StoreCall {
            verb,
            kind,
            namespace: namespace.to_string(),
            name: name.map(String::from),
        });
        match state.take_fault(verb) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn labels_of(body: &Value) -> BTreeMap<String, String> {
    body.pointer("/metadata/labels")
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Fill in what the platform would on creation.
fn apply_platform_defaults(kind: ResourceKind, body: &mut Value, version: String, seq: u64) {
    let defaults = match kind {
        ResourceKind::Service => {
            let has_ip = body.pointer("/spec/clusterIP").is_some();
            let mut spec = json!({"sessionAffinity": "None"});
            if !has_ip {
                spec["clusterIP"] = json!(format!("10.96.0.{}", seq % 250 + 1));
            }
            json!({ "spec": spec })
        }
        ResourceKind::StatefulSet => json!({
            "metadata": {"generation": 1},
            "spec": {"podManagementPolicy": "OrderedReady", "revisionHistoryLimit": 10},
            "status": {"replicas": 0},
        }),
    };
    apply_merge_patch(body, &defaults);
    apply_merge_patch(
        body,
        &json!({"metadata": {"resourceVersion": version, "uid": format!("uid-{seq}")}}),
    );
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        owner: &OwnershipLabels,
    ) -> Result<Vec<Value>, PlatformError> {
        self.enter(Verb::List, kind, namespace, None).await?;
        let state = self.state.lock();
        Ok(state
            .objects
            .iter()
            .filter(|((k, ns, _), body)| {
                *k == kind && ns == namespace && owner.matches(&labels_of(body))
            })
            .map(|(_, body)| body.clone())
            .collect())
    }

    async fn create(
        &self,
        kind: ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<(), PlatformError> {
        let name = object_name(body)
            .ok_or_else(|| PlatformError::Malformed("object has no name".into()))?
            .to_string();
        self.enter(Verb::Create, kind, namespace, Some(&name)).await?;

        let mut state = self.state.lock();
        let key = (kind, namespace.to_string(), name.clone());
        if state.objects.contains_key(&key) {
            return Err(PlatformError::Conflict(format!(
                "{kind} {namespace}/{name} already exists"
            )));
        }
        let version = state.next_version();
        let seq = state.version;
        let mut stored = body.clone();
        apply_platform_defaults(kind, &mut stored, version, seq);
        state.objects.insert(key, stored);
        Ok(())
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), PlatformError> {
        self.enter(Verb::Patch, kind, namespace, Some(name)).await?;

        let mut state = self.state.lock();
        let version = state.next_version();
        let key = (kind, namespace.to_string(), name.to_string());
        let Some(stored) = state.objects.get_mut(&key) else {
            return Err(PlatformError::Rejected {
                code: 404,
                message: format!("{kind} {namespace}/{name} not found"),
            });
        };
        apply_merge_patch(stored, patch);
        apply_merge_patch(stored, &json!({"metadata": {"resourceVersion": version}}));
        if patch.get("spec").is_some() {
            let generation = stored
                .pointer("/metadata/generation")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            stored["metadata"]["generation"] = json!(generation + 1);
        }
        Ok(())
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), PlatformError> {
        self.enter(Verb::Delete, kind, namespace, Some(name)).await?;
        self.state
            .lock()
            .objects
            .remove(&(kind, namespace.to_string(), name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, cluster: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": name,
                "labels": OwnershipLabels::for_cluster(cluster).to_map(),
            },
            "spec": {"type": "ClusterIP"},
        })
    }

    #[tokio::test]
    async fn test_create_applies_platform_defaults() {
        let store = MemoryStore::new();
        store
            .create(ResourceKind::Service, "ns", &service("a-kafka", "a"))
            .await
            .unwrap();

        let stored = store.get(ResourceKind::Service, "ns", "a-kafka").unwrap();
        assert!(stored.pointer("/spec/clusterIP").is_some());
        assert_eq!(stored["metadata"]["resourceVersion"], "1");
        assert_eq!(stored["spec"]["type"], "ClusterIP");
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let store = MemoryStore::new();
        let body = service("a-kafka", "a");
        store.create(ResourceKind::Service, "ns", &body).await.unwrap();
        let err = store
            .create(ResourceKind::Service, "ns", &body)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_owner_and_namespace() {
        let store = MemoryStore::new();
        store.insert(ResourceKind::Service, "ns", service("a-kafka", "a"));
        store.insert(ResourceKind::Service, "ns", service("b-kafka", "b"));
        store.insert(ResourceKind::Service, "other", service("a-kafka", "a"));

        let listed = store
            .list(ResourceKind::Service, "ns", &OwnershipLabels::for_cluster("a"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(object_name(&listed[0]), Some("a-kafka"));
    }

    #[tokio::test]
    async fn test_patch_merges_and_bumps_version() {
        let store = MemoryStore::new();
        store
            .create(ResourceKind::Service, "ns", &service("a-kafka", "a"))
            .await
            .unwrap();
        store
            .patch(
                ResourceKind::Service,
                "ns",
                "a-kafka",
                &json!({"metadata": {"labels": {"extra": "x"}}}),
            )
            .await
            .unwrap();

        let stored = store.get(ResourceKind::Service, "ns", "a-kafka").unwrap();
        assert_eq!(stored["metadata"]["labels"]["extra"], "x");
        assert_eq!(stored["metadata"]["labels"]["strimzi.io/cluster"], "a");
        assert_eq!(stored["metadata"]["resourceVersion"], "2");
    }

    #[tokio::test]
    async fn test_patch_missing_object_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .patch(ResourceKind::StatefulSet, "ns", "nope", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Rejected { code: 404, .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryStore::new();
        store
            .delete(ResourceKind::StatefulSet, "ns", "nope")
            .await
            .unwrap();
        assert_eq!(store.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_fault_applies_to_matching_verb_once() {
        let store = MemoryStore::new();
        store.fail_next(Verb::Create, PlatformError::Unavailable("down".into()));

        let owner = OwnershipLabels::for_cluster("a");
        store.list(ResourceKind::Service, "ns", &owner).await.unwrap();

        let body = service("a-kafka", "a");
        assert!(store.create(ResourceKind::Service, "ns", &body).await.is_err());
        assert!(store.create(ResourceKind::Service, "ns", &body).await.is_ok());
    }
}
