//! Desired-versus-actual comparison.
//!
//! An actual object matches its desired counterpart when every field the
//! controller sets is present with the same value. Fields filled in by the
//! platform (virtual IPs, resource versions, status, defaults) are never
//! compared, so a converged cluster produces an empty plan.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::resources::{DesiredResource, ResourceKind};

/// An object that exists on the platform and carries the cluster's labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ActualResource {
    pub kind: ResourceKind,
    pub name: String,
    pub body: Value,
}

/// One step towards the desired state.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create {
        kind: ResourceKind,
        name: String,
        body: Value,
    },
    Update {
        kind: ResourceKind,
        name: String,
        /// JSON merge patch carrying only the drifted fields.
        patch: Value,
    },
    Delete {
        kind: ResourceKind,
        name: String,
    },
}

impl Operation {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Operation::Create { kind, .. }
            | Operation::Update { kind, .. }
            | Operation::Delete { kind, .. } => *kind,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Operation::Create { name, .. }
            | Operation::Update { name, .. }
            | Operation::Delete { name, .. } => name,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
        }
    }
}

/// What an update to an existing object touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateScope {
    /// Replica count changed.
    pub scale: bool,
    /// Pod template changed, so pods get replaced.
    pub rollout: bool,
    /// Anything else.
    pub other: bool,
}

impl UpdateScope {
    pub fn of(kind: ResourceKind, patch: &Value) -> Self {
        let Some(fields) = patch.as_object() else {
            return Self::default();
        };
        if kind != ResourceKind::StatefulSet {
            return Self {
                other: !fields.is_empty(),
                ..Self::default()
            };
        }

        let spec = fields.get("spec").and_then(Value::as_object);
        let scale = spec.is_some_and(|s| s.contains_key("replicas"));
        let rollout = spec.is_some_and(|s| s.contains_key("template"));
        let other_spec = spec.is_some_and(|s| {
            s.keys().any(|k| k != "replicas" && k != "template")
        });
        let other_top = fields.keys().any(|k| k != "spec");

        Self {
            scale,
            rollout,
            other: other_spec || other_top,
        }
    }
}

/// Compute the operations that turn `actual` into `desired`.
///
/// Creates and updates follow the order of `desired`; deletes of objects
/// no longer generated come last, sorted by kind and name.
pub fn plan(desired: &[DesiredResource], actual: &[ActualResource]) -> Vec<Operation> {
    let existing: BTreeMap<(ResourceKind, &str), &ActualResource> = actual
        .iter()
        .map(|a| ((a.kind, a.name.as_str()), a))
        .collect();

    let mut ops = Vec::new();
    let mut wanted = BTreeSet::new();

    for d in desired {
        wanted.insert((d.kind, d.name.as_str()));
        match existing.get(&(d.kind, d.name.as_str())) {
            None => ops.push(Operation::Create {
                kind: d.kind,
                name: d.name.clone(),
                body: d.body.clone(),
            }),
            Some(a) => {
                if let Some(patch) =
                    owned_merge_patch(&d.body, &a.body, owned_maps(d.kind))
                {
                    ops.push(Operation::Update {
                        kind: d.kind,
                        name: d.name.clone(),
                        patch,
                    });
                }
            }
        }
    }

    for (key, a) in &existing {
        if !wanted.contains(key) {
            ops.push(Operation::Delete {
                kind: a.kind,
                name: a.name.clone(),
            });
        }
    }

    ops
}

/// Maps the controller owns outright: keys present on the platform but not
/// in the desired body are removed rather than tolerated.
pub fn owned_maps(kind: ResourceKind) -> &'static [&'static [&'static str]] {
    match kind {
        ResourceKind::Service => &[&["spec", "selector"]],
        ResourceKind::StatefulSet => &[],
    }
}

/// Merge patch that brings `actual` in line with `desired`, or `None`
/// when `actual` already contains everything `desired` sets.
///
/// Arrays are replaced whole, as RFC 7386 has no way to patch elements.
pub fn merge_patch(desired: &Value, actual: &Value) -> Option<Value> {
    owned_merge_patch(desired, actual, &[])
}

/// Like [`merge_patch`], but for every map at one of the `owned` paths the
/// patch also nulls out keys that only `actual` has.
pub fn owned_merge_patch(desired: &Value, actual: &Value, owned: &[&[&str]]) -> Option<Value> {
    patch_at(desired, actual, &mut Vec::new(), owned)
}

fn patch_at<'a>(
    desired: &'a Value,
    actual: &Value,
    path: &mut Vec<&'a str>,
    owned: &[&[&str]],
) -> Option<Value> {
    match (desired, actual) {
        (Value::Object(d), Value::Object(a)) => {
            let mut patch = Map::new();
            for (key, dv) in d {
                if dv.is_null() {
                    continue;
                }
                match a.get(key) {
                    Some(av) => {
                        path.push(key);
                        let p = patch_at(dv, av, path, owned);
                        path.pop();
                        if let Some(p) = p {
                            patch.insert(key.clone(), p);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), dv.clone());
                    }
                }
            }
            if owned.iter().any(|o| *o == path.as_slice()) {
                for key in a.keys() {
                    if d.get(key).map_or(true, Value::is_null) {
                        patch.insert(key.clone(), Value::Null);
                    }
                }
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        (d, a) if contains(a, d) => None,
        (d, _) => Some(d.clone()),
    }
}

/// Whether `actual` carries every non-null field of `desired`.
fn contains(actual: &Value, desired: &Value) -> bool {
    match (actual, desired) {
        (Value::Object(a), Value::Object(d)) => d
            .iter()
            .filter(|(_, dv)| !dv.is_null())
            .all(|(k, dv)| a.get(k).is_some_and(|av| contains(av, dv))),
        (Value::Array(a), Value::Array(d)) => {
            a.len() == d.len() && a.iter().zip(d).all(|(av, dv)| contains(av, dv))
        }
        (a, d) => a == d,
    }
}

/// Apply an RFC 7386 merge patch in place.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(t) = target {
        for (key, value) in fields {
            if value.is_null() {
                t.remove(key);
            } else {
                apply_merge_patch(t.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
