//! Per-cluster serialization of passes.
//!
//! At most one pass runs for a cluster at any time. Triggers that arrive
//! while it runs are coalesced into a single pending slot, and exactly one
//! more pass runs with the latest of them once the current one finishes.
//! Passes for different clusters share a fixed number of worker permits.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error};

use super::{Applied, Reconciler, Trigger};
use crate::error::Result;
use crate::metrics;
use crate::spec::ClusterKey;

/// Something that can run a pass for one cluster.
#[async_trait]
pub trait PassRunner: Send + Sync + 'static {
    async fn run_pass(&self, key: &ClusterKey, trigger: &Trigger) -> Result<Applied>;
}

#[async_trait]
impl PassRunner for Reconciler {
    async fn run_pass(&self, key: &ClusterKey, trigger: &Trigger) -> Result<Applied> {
        self.reconcile(key, trigger).await
    }
}

/// Bookkeeping for a cluster with a pass in flight.
#[derive(Default)]
struct Slot {
    pending: Option<Trigger>,
}

struct Inner {
    runner: Arc<dyn PassRunner>,
    permits: Arc<Semaphore>,
    slots: Mutex<HashMap<ClusterKey, Slot>>,
    idle: Notify,
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// `workers` bounds how many clusters are reconciled at the same time.
    pub fn new(runner: Arc<dyn PassRunner>, workers: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                runner,
                permits: Arc::new(Semaphore::new(workers.max(1))),
                slots: Mutex::new(HashMap::new()),
                idle: Notify::new(),
            }),
        }
    }

    /// Request a pass for `key`. Must be called from within a Tokio runtime.
    pub fn notify(&self, key: ClusterKey, trigger: Trigger) {
        {
            let mut slots = self.inner.slots.lock();
            match slots.entry(key.clone()) {
                Entry::Occupied(mut slot) => {
                    debug!(cluster = %key, "Pass in flight, coalescing trigger");
                    if slot.get_mut().pending.replace(trigger).is_some() {
                        metrics::record_coalesced();
                    }
                    return;
                }
                Entry::Vacant(slot) => {
                    slot.insert(Slot::default());
                }
            }
        }
        tokio::spawn(drive(self.inner.clone(), key, trigger));
    }

    /// Clusters with a pass running or pending.
    pub fn in_flight(&self) -> usize {
        self.inner.slots.lock().len()
    }

    /// Wait until no pass is running or pending.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Releases a cluster's slot when its driver ends. A driver dropped before
/// it released the slot itself (a panicking pass) takes the slot and any
/// pending trigger with it, so the next notification starts afresh.
struct SlotGuard {
    inner: Arc<Inner>,
    key: ClusterKey,
    released: bool,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slots = self.inner.slots.lock();
        if !self.released {
            error!(cluster = %self.key, "Pass aborted, discarding pending trigger");
            slots.remove(&self.key);
        }
        let idle = slots.is_empty();
        drop(slots);
        if idle {
            self.inner.idle.notify_waiters();
        }
    }
}

async fn drive(inner: Arc<Inner>, key: ClusterKey, first: Trigger) {
    let mut guard = SlotGuard {
        inner: inner.clone(),
        key: key.clone(),
        released: false,
    };
    let mut trigger = first;
    loop {
        let permit = match inner.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(cluster = %key, error = %e, "Worker pool closed");
                break;
            }
        };
        // Outcomes are reported by the runner itself.
        let _ = inner.runner.run_pass(&key, &trigger).await;
        drop(permit);

        let next = {
            let mut slots = inner.slots.lock();
            match slots.get_mut(&key).and_then(|slot| slot.pending.take()) {
                Some(next) => Some(next),
                None => {
                    slots.remove(&key);
                    guard.released = true;
                    None
                }
            }
        };
        match next {
            Some(next) => trigger = next,
            None => break,
        }
    }
}
