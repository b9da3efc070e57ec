//! kube-rs backed cluster access.
//!
//! `KubeCluster` owns the client built once at process start and is shared by
//! every decision. It only issues read requests.

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::api::{ApiResource, ListParams};
use kube::core::{DynamicObject, TypeMeta};
use kube::{Api, Client};
use tracing::debug;

use super::{ClusterAccess, ResourceKindDescriptor};
use crate::engine::error::{Error, Result};

/// Page size for list calls
const LIST_PAGE_SIZE: u32 = 500;

/// Cluster access context wrapping a Kubernetes client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build from the in-cluster service account or local kubeconfig.
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }
}

fn api_resource(kind: &ResourceKindDescriptor) -> ApiResource {
    ApiResource {
        group: kind.group.clone(),
        version: kind.version.clone(),
        api_version: kind.api_version(),
        kind: kind.kind.clone(),
        plural: kind.plural.clone(),
    }
}

impl ClusterAccess for KubeCluster {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(namespace).await?.is_some())
    }

    async fn api_resource_lists(&self) -> Result<Vec<APIResourceList>> {
        let discovery = |e: kube::Error| Error::Discovery(e.to_string());
        let mut lists = Vec::new();

        let core = self
            .client
            .list_core_api_versions()
            .await
            .map_err(discovery)?;
        for version in &core.versions {
            debug!(group_version = %version, "Listing API resources");
            lists.push(
                self.client
                    .list_core_api_resources(version)
                    .await
                    .map_err(discovery)?,
            );
        }

        let groups = self.client.list_api_groups().await.map_err(discovery)?;
        for group in &groups.groups {
            for version in &group.versions {
                debug!(group_version = %version.group_version, "Listing API resources");
                lists.push(
                    self.client
                        .list_api_group_resources(&version.group_version)
                        .await
                        .map_err(discovery)?,
                );
            }
        }

        Ok(lists)
    }

    async fn list_objects(
        &self,
        kind: &ResourceKindDescriptor,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>> {
        let ar = api_resource(kind);
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);

        let mut objects = Vec::new();
        let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
        loop {
            let page = api.list(&params).await?;
            objects.extend(page.items.into_iter().map(|mut obj| {
                // List responses omit per-item type metadata
                if obj.types.is_none() {
                    obj.types = Some(TypeMeta {
                        api_version: ar.api_version.clone(),
                        kind: ar.kind.clone(),
                    });
                }
                obj
            }));

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    params = ListParams::default()
                        .limit(LIST_PAGE_SIZE)
                        .continue_token(&token);
                }
                _ => break,
            }
        }

        Ok(objects)
    }
}
