use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use kube::runtime::watcher::{self, watcher};
use kube::runtime::WatchStreamExt;
use kube::Client;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::constants::{labels, values, CONTROLLER_NAME};
use crate::error::OperatorError;
use crate::events::KubeEventPublisher;
use crate::metrics;
use crate::reconciler::dispatch::Dispatcher;
use crate::reconciler::{Reconciler, Trigger};
use crate::spec::ClusterKey;
use crate::store::KubeStore;

/// Label selector matching desired-state records.
pub fn record_selector() -> String {
    format!(
        "{}={},{}={}",
        labels::KIND,
        values::KIND_CLUSTER_RECORD,
        labels::TYPE,
        values::TYPE_KAFKA
    )
}

/// Latest copy of every known record, and what to dispatch when it changes.
pub struct RecordTracker {
    dispatcher: Dispatcher,
    known: BTreeMap<ClusterKey, Arc<ConfigMap>>,
    /// Keys seen since the current (re)listing started.
    listing: Option<BTreeSet<ClusterKey>>,
}

impl RecordTracker {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            known: BTreeMap::new(),
            listing: None,
        }
    }

    pub fn known(&self) -> impl Iterator<Item = &ClusterKey> {
        self.known.keys()
    }

    pub fn handle(&mut self, event: watcher::Event<ConfigMap>) {
        match event {
            watcher::Event::Init => {
                debug!("Listing records");
                self.listing = Some(BTreeSet::new());
            }
            watcher::Event::InitApply(record) => {
                if let Some(key) = self.applied(record) {
                    if let Some(seen) = self.listing.as_mut() {
                        seen.insert(key);
                    }
                }
            }
            watcher::Event::InitDone => {
                let seen = self.listing.take().unwrap_or_default();
                let vanished: Vec<ClusterKey> = self
                    .known
                    .keys()
                    .filter(|k| !seen.contains(*k))
                    .cloned()
                    .collect();
                for key in vanished {
                    info!(cluster = %key, "Record disappeared while not watching");
                    self.deleted_key(key);
                }
                info!(records = self.known.len(), "Initial listing complete");
                metrics::set_ready(true);
            }
            watcher::Event::Apply(record) => {
                self.applied(record);
            }
            watcher::Event::Delete(record) => match ClusterKey::of_record(&record) {
                Ok(key) => self.deleted_key(key),
                Err(e) => warn!(error = %e, "Ignoring deletion of unidentifiable record"),
            },
        }
        metrics::set_managed_clusters(self.known.len());
    }

    /// Re-dispatch every known record.
    pub fn resync(&self) {
        debug!(records = self.known.len(), "Full reconciliation");
        for (key, record) in &self.known {
            self.dispatcher
                .notify(key.clone(), Trigger::Apply(record.clone()));
        }
    }

    fn applied(&mut self, record: ConfigMap) -> Option<ClusterKey> {
        let key = match ClusterKey::of_record(&record) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Ignoring unidentifiable record");
                return None;
            }
        };
        debug!(cluster = %key, "Record applied");
        let record = Arc::new(record);
        self.known.insert(key.clone(), record.clone());
        self.dispatcher.notify(key.clone(), Trigger::Apply(record));
        Some(key)
    }

    fn deleted_key(&mut self, key: ClusterKey) {
        info!(cluster = %key, "Record deleted, removing cluster resources");
        self.known.remove(&key);
        self.dispatcher.notify(key, Trigger::Delete);
    }
}

/// Watch desired-state records in the configured namespace and reconcile
/// them until the watch stream ends.
pub async fn run(client: Client, config: Arc<ControllerConfig>) -> Result<(), OperatorError> {
    let store = Arc::new(KubeStore::new(client.clone()));
    let events = Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME));
    let reconciler = Arc::new(Reconciler::from_config(store, events, &config));
    let mut tracker = RecordTracker::new(Dispatcher::new(reconciler, config.workers));

    let records: Api<ConfigMap> = Api::namespaced(client, &config.namespace);
    let selector = record_selector();
    let mut stream = watcher(records, watcher::Config::default().labels(&selector))
        .default_backoff()
        .boxed();

    let mut resync = tokio::time::interval(config.full_reconciliation_interval);
    resync.tick().await;

    info!(
        namespace = %config.namespace,
        selector = %selector,
        workers = config.workers,
        "Watching cluster records"
    );

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(Ok(event)) => tracker.handle(event),
                Some(Err(e)) => warn!(error = %e, "Record watch error"),
                None => break,
            },
            _ = resync.tick() => tracker.resync(),
        }
    }

    warn!("Record watch stream ended");
    Ok(())
}
