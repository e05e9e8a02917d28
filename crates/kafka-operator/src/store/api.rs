use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::ResourceStore;
use crate::constants::CONTROLLER_NAME;
use crate::error::PlatformError;
use crate::resources::labels::OwnershipLabels;
use crate::resources::ResourceKind;

/// [`ResourceStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn list_as<K>(
        &self,
        namespace: &str,
        owner: &OwnershipLabels,
    ) -> Result<Vec<Value>, PlatformError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let lp = ListParams::default().labels(&owner.selector());
        let list = self.api::<K>(namespace).list(&lp).await?;
        list.items
            .iter()
            .map(|item| serde_json::to_value(item).map_err(PlatformError::from))
            .collect()
    }

    async fn create_as<K>(&self, namespace: &str, body: &Value) -> Result<(), PlatformError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let object: K = serde_json::from_value(body.clone())?;
        let pp = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        self.api::<K>(namespace).create(&pp, &object).await?;
        Ok(())
    }

    async fn patch_as<K>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), PlatformError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let pp = PatchParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        self.api::<K>(namespace)
            .patch(name, &pp, &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn delete_as<K>(&self, namespace: &str, name: &str) -> Result<(), PlatformError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!(name, namespace, "Already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        owner: &OwnershipLabels,
    ) -> Result<Vec<Value>, PlatformError> {
        match kind {
            ResourceKind::Service => self.list_as::<Service>(namespace, owner).await,
            ResourceKind::StatefulSet => self.list_as::<StatefulSet>(namespace, owner).await,
        }
    }

    async fn create(
        &self,
        kind: ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<(), PlatformError> {
        match kind {
            ResourceKind::Service => self.create_as::<Service>(namespace, body).await,
            ResourceKind::StatefulSet => self.create_as::<StatefulSet>(namespace, body).await,
        }
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), PlatformError> {
        match kind {
            ResourceKind::Service => self.patch_as::<Service>(namespace, name, patch).await,
            ResourceKind::StatefulSet => {
                self.patch_as::<StatefulSet>(namespace, name, patch).await
            }
        }
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), PlatformError> {
        match kind {
            ResourceKind::Service => self.delete_as::<Service>(namespace, name).await,
            ResourceKind::StatefulSet => self.delete_as::<StatefulSet>(namespace, name).await,
        }
    }
}
