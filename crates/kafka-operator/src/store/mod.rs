//! Access to the objects the controller manages on the platform.
//!
//! The reconciler only sees untyped JSON bodies keyed by [`ResourceKind`],
//! so the same pass runs against the API server ([`KubeStore`]) and, with
//! the `testing` feature, against the in-process `MemoryStore`.

mod api;
#[cfg(any(test, feature = "testing"))]
mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use api::KubeStore;
#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryStore, StoreCall, Verb};

use crate::error::PlatformError;
use crate::resources::labels::OwnershipLabels;
use crate::resources::ResourceKind;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Every object of `kind` in `namespace` that carries `owner`'s labels.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        owner: &OwnershipLabels,
    ) -> Result<Vec<Value>, PlatformError>;

    async fn create(
        &self,
        kind: ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<(), PlatformError>;

    /// Apply a JSON merge patch to an existing object.
    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), PlatformError>;

    /// Delete an object. Deleting something already gone succeeds.
    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), PlatformError>;
}

/// `metadata.name` of an untyped object.
pub fn object_name(body: &Value) -> Option<&str> {
    body.get("metadata")?.get("name")?.as_str()
}
