//! Convergence of one cluster's resources towards its desired state.
//!
//! A pass extracts the spec, generates the desired objects, lists what
//! exists under the cluster's ownership labels, diffs the two and applies
//! the resulting operations concurrently. Transient platform failures send
//! the pass back to the listing step after a backoff.

pub mod diff;
pub mod dispatch;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use k8s_openapi::api::core::v1::{ConfigMap, ObjectReference};
use kube::runtime::events::EventType;
use kube::Resource;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::error::{OperatorError, PlatformError, Result, SpecError};
use crate::events::{actions, reasons, EventPublisher};
use crate::metrics;
use crate::resources::labels::OwnershipLabels;
use crate::resources::{self, DesiredResource, ResourceKind};
use crate::retry::{ExponentialBackoff, RetryConfig};
use crate::spec::{self, ClusterKey};
use crate::store::{object_name, ResourceStore};
use diff::{ActualResource, Operation, UpdateScope};

/// What caused a pass.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// The record was created, changed, or is being re-checked.
    Apply(Arc<ConfigMap>),
    /// The record is gone. Everything the cluster owns gets removed.
    Delete,
}

/// Changes made by a converged pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl Applied {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    fn count(&mut self, op: &Operation) {
        match op {
            Operation::Create { .. } => self.created += 1,
            Operation::Update { .. } => self.updated += 1,
            Operation::Delete { .. } => self.deleted += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Executed {
    Done,
    Adopted,
}

pub struct Reconciler {
    store: Arc<dyn ResourceStore>,
    events: Arc<dyn EventPublisher>,
    retry: RetryConfig,
    operation_timeout: Duration,
    /// Records that failed extraction, by the `resourceVersion` rejected.
    rejected: Mutex<HashMap<ClusterKey, (String, SpecError)>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        events: Arc<dyn EventPublisher>,
        retry: RetryConfig,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            events,
            retry,
            operation_timeout,
            rejected: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(
        store: Arc<dyn ResourceStore>,
        events: Arc<dyn EventPublisher>,
        config: &ControllerConfig,
    ) -> Self {
        Self::new(
            store,
            events,
            RetryConfig::from_controller(config),
            config.operation_timeout,
        )
    }

    /// Run one pass for `key` and report its outcome.
    ///
    /// Failures are logged and published as Warning events before being
    /// returned. None of them stop the controller. A record already rejected
    /// at the same `resourceVersion` is not looked at again: the earlier
    /// error is returned without a new event.
    pub async fn reconcile(&self, key: &ClusterKey, trigger: &Trigger) -> Result<Applied> {
        let version = match trigger {
            Trigger::Apply(record) => record.metadata.resource_version.clone(),
            Trigger::Delete => None,
        };
        if let Some(e) = self.still_rejected(key, version.as_deref()) {
            debug!(cluster = %key, error = %e, "Record unchanged since rejection");
            return Err(e.into());
        }

        let started = Instant::now();
        let result = self.run(key, trigger).await;
        self.remember_rejection(key, version, &result);
        let elapsed = started.elapsed().as_secs_f64();
        let object = record_ref(key, trigger);

        match &result {
            Ok(applied) => {
                metrics::record_pass("success", elapsed);
                if applied.total() == 0 {
                    debug!(cluster = %key, "Already converged");
                } else {
                    info!(
                        cluster = %key,
                        created = applied.created,
                        updated = applied.updated,
                        deleted = applied.deleted,
                        "Converged"
                    );
                    let (reason, action) = match trigger {
                        Trigger::Apply(_) => (reasons::RECONCILED, actions::RECONCILE),
                        Trigger::Delete => (reasons::CLUSTER_DELETED, actions::DELETE),
                    };
                    let note = format!(
                        "created {}, updated {}, deleted {}",
                        applied.created, applied.updated, applied.deleted
                    );
                    self.events
                        .publish(&object, EventType::Normal, reason, action, Some(note))
                        .await;
                }
            }
            Err(e) => {
                metrics::record_pass("error", elapsed);
                error!(cluster = %key, reason = e.reason(), error = %e, "Reconciliation failed");
                self.events
                    .publish(
                        &object,
                        EventType::Warning,
                        e.reason(),
                        actions::RECONCILE,
                        Some(e.to_string()),
                    )
                    .await;
            }
        }
        result
    }

    fn still_rejected(&self, key: &ClusterKey, version: Option<&str>) -> Option<SpecError> {
        let rejected = self.rejected.lock();
        let (at, error) = rejected.get(key)?;
        (Some(at.as_str()) == version).then(|| error.clone())
    }

    fn remember_rejection(
        &self,
        key: &ClusterKey,
        version: Option<String>,
        result: &Result<Applied>,
    ) {
        let mut rejected = self.rejected.lock();
        match (result, version) {
            (Err(OperatorError::Spec(e)), Some(version)) => {
                rejected.insert(key.clone(), (version, e.clone()));
            }
            _ => {
                rejected.remove(key);
            }
        }
    }

    async fn run(&self, key: &ClusterKey, trigger: &Trigger) -> Result<Applied> {
        let desired = match trigger {
            Trigger::Apply(record) => {
                let spec = spec::extract(record)?;
                resources::generate(&spec)
                    .into_desired()
                    .map_err(PlatformError::from)?
            }
            Trigger::Delete => Vec::new(),
        };
        let owner = OwnershipLabels::for_cluster(&key.name);

        // Counts accumulate across attempts; a failed attempt may still
        // have applied some operations.
        let mut applied = Applied::default();
        let mut backoff = ExponentialBackoff::new(self.retry.clone());
        loop {
            match self.converge(key, &owner, &desired, &mut applied).await {
                Ok(()) => return Ok(applied),
                Err(e) if backoff.should_retry(&e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        cluster = %key,
                        retry = backoff.retries(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(OperatorError::Platform(last)) if last.is_transient() => {
                    return Err(OperatorError::RetriesExhausted {
                        attempts: backoff.retries() + 1,
                        last,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch, diff and apply. An adopted object may still carry fields the
    /// cluster owns outright, so one more round runs to strip them.
    async fn converge(
        &self,
        key: &ClusterKey,
        owner: &OwnershipLabels,
        desired: &[DesiredResource],
        applied: &mut Applied,
    ) -> Result<()> {
        let mut recheck = true;
        loop {
            let actual = self.fetch_actual(key, owner).await?;
            let ops = diff::plan(desired, &actual);
            debug!(cluster = %key, operations = ops.len(), "Planned");
            let adopted = self.apply(key, &ops, applied).await?;
            if !(adopted && recheck) {
                return Ok(());
            }
            debug!(cluster = %key, "Re-checking adopted objects");
            recheck = false;
        }
    }

    async fn fetch_actual(
        &self,
        key: &ClusterKey,
        owner: &OwnershipLabels,
    ) -> Result<Vec<ActualResource>> {
        let mut actual = Vec::new();
        for kind in ResourceKind::ALL {
            let items = self
                .bounded(
                    format!("list {kind} in {}", key.namespace),
                    self.store.list(kind, &key.namespace, owner),
                )
                .await?;
            actual.extend(items.into_iter().filter_map(|body| {
                let name = object_name(&body)?.to_string();
                Some(ActualResource { kind, name, body })
            }));
        }
        Ok(actual)
    }

    /// Issue every operation at once and report whether any create ended
    /// in adoption. A permanent failure takes precedence over a transient
    /// one so the pass is not retried in vain.
    async fn apply(
        &self,
        key: &ClusterKey,
        ops: &[Operation],
        applied: &mut Applied,
    ) -> Result<bool> {
        let results = join_all(ops.iter().map(|op| self.execute(key, op))).await;

        let mut adopted = false;
        let mut transient = None;
        let mut permanent = None;
        for (op, result) in ops.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    applied.count(op);
                    adopted |= outcome == Executed::Adopted;
                }
                Err(e) if e.is_transient() => {
                    transient.get_or_insert(e);
                }
                Err(e) => {
                    permanent.get_or_insert(e);
                }
            }
        }
        match permanent.or(transient) {
            Some(e) => Err(e.into()),
            None => Ok(adopted),
        }
    }

    async fn execute(
        &self,
        key: &ClusterKey,
        op: &Operation,
    ) -> std::result::Result<Executed, PlatformError> {
        let ns = key.namespace.as_str();
        let kind = op.kind();
        let name = op.name();
        let label = format!("{} {kind} {ns}/{name}", op.verb());

        let mut outcome = Executed::Done;
        match op {
            Operation::Create { body, .. } => {
                info!(cluster = %key, kind = %kind, name, "Creating");
                match self.bounded(label.clone(), self.store.create(kind, ns, body)).await {
                    // Same name but without our labels: adopt it.
                    Err(PlatformError::Conflict(_)) => {
                        warn!(cluster = %key, kind = %kind, name, "Adopting existing object");
                        self.bounded(label, self.store.patch(kind, ns, name, body))
                            .await?;
                        outcome = Executed::Adopted;
                    }
                    other => other?,
                }
            }
            Operation::Update { patch, .. } => {
                let scope = UpdateScope::of(kind, patch);
                info!(
                    cluster = %key,
                    kind = %kind,
                    name,
                    scale = scope.scale,
                    rollout = scope.rollout,
                    "Updating"
                );
                self.bounded(label, self.store.patch(kind, ns, name, patch))
                    .await?;
            }
            Operation::Delete { .. } => {
                info!(cluster = %key, kind = %kind, name, "Deleting");
                self.bounded(label, self.store.delete(kind, ns, name))
                    .await?;
            }
        }
        metrics::record_operation(kind.as_str(), op.verb());
        Ok(outcome)
    }

    /// Run a platform call under the operation timeout.
    async fn bounded<T>(
        &self,
        operation: String,
        call: impl Future<Output = std::result::Result<T, PlatformError>>,
    ) -> std::result::Result<T, PlatformError> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout {
                operation,
                timeout: self.operation_timeout,
            }),
        }
    }
}

/// Reference to the record a pass works for, used as the event subject.
fn record_ref(key: &ClusterKey, trigger: &Trigger) -> ObjectReference {
    match trigger {
        Trigger::Apply(record) => record.object_ref(&()),
        Trigger::Delete => ObjectReference {
            api_version: Some("v1".into()),
            kind: Some("ConfigMap".into()),
            name: Some(key.name.clone()),
            namespace: Some(key.namespace.clone()),
            ..Default::default()
        },
    }
}
