//! Test fixtures and builder patterns for cluster contents.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use kube::api::ObjectMeta;
use kube::core::{DynamicObject, TypeMeta};
use namespace_guard::{ClusterAccess, Error, ResourceKindDescriptor, Result};

/// In-memory cluster implementing [`ClusterAccess`].
///
/// # Example
/// ```ignore
/// let cluster = FakeClusterBuilder::new()
///     .namespace("team-a")
///     .kind("v1", "ConfigMap", "configmaps")
///     .object("team-a", "configmaps", "v1", "ConfigMap", "kube-root-ca.crt")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct FakeCluster {
    namespaces: BTreeSet<String>,
    resource_lists: Vec<APIResourceList>,
    objects: BTreeMap<(String, String), Vec<DynamicObject>>,
    failing: BTreeSet<String>,
    discovery_error: Option<String>,
    /// Number of list calls served
    pub list_calls: AtomicUsize,
}

impl ClusterAccess for FakeCluster {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.contains(namespace))
    }

    async fn api_resource_lists(&self) -> Result<Vec<APIResourceList>> {
        match &self.discovery_error {
            Some(message) => Err(Error::Discovery(message.clone())),
            None => Ok(self.resource_lists.clone()),
        }
    }

    async fn list_objects(
        &self,
        kind: &ResourceKindDescriptor,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&kind.plural) {
            return Err(Error::List {
                kind: kind.to_string(),
                message: "the server could not find the requested resource".to_string(),
            });
        }
        Ok(self
            .objects
            .get(&(namespace.to_string(), kind.plural.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Builder for [`FakeCluster`].
#[derive(Debug, Default)]
pub struct FakeClusterBuilder {
    cluster: FakeCluster,
}

impl FakeClusterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing namespace.
    pub fn namespace(mut self, name: &str) -> Self {
        self.cluster.namespaces.insert(name.to_string());
        self
    }

    /// Serve a namespaced, listable kind under `group_version`.
    pub fn kind(self, group_version: &str, kind: &str, plural: &str) -> Self {
        self.resource(group_version, api_resource(plural, kind, true, &["get", "list", "watch"]))
    }

    /// Serve an arbitrary API resource under `group_version`.
    pub fn resource(mut self, group_version: &str, resource: APIResource) -> Self {
        let lists = &mut self.cluster.resource_lists;
        match lists.iter_mut().find(|l| l.group_version == group_version) {
            Some(list) => list.resources.push(resource),
            None => lists.push(APIResourceList {
                group_version: group_version.to_string(),
                resources: vec![resource],
            }),
        }
        self
    }

    /// Add an object listed under `plural` in `namespace`.
    pub fn object(
        self,
        namespace: &str,
        plural: &str,
        api_version: &str,
        kind: &str,
        name: &str,
    ) -> Self {
        self.raw_object(namespace, plural, dynamic_object(api_version, kind, name, namespace))
    }

    /// Add a pre-built object listed under `plural` in `namespace`.
    pub fn raw_object(mut self, namespace: &str, plural: &str, object: DynamicObject) -> Self {
        self.cluster
            .objects
            .entry((namespace.to_string(), plural.to_string()))
            .or_default()
            .push(object);
        self
    }

    /// Make list calls for `plural` fail.
    pub fn failing(mut self, plural: &str) -> Self {
        self.cluster.failing.insert(plural.to_string());
        self
    }

    /// Make discovery fail.
    pub fn discovery_error(mut self, message: &str) -> Self {
        self.cluster.discovery_error = Some(message.to_string());
        self
    }

    pub fn build(self) -> FakeCluster {
        self.cluster
    }
}

pub fn api_resource(name: &str, kind: &str, namespaced: bool, verbs: &[&str]) -> APIResource {
    APIResource {
        name: name.to_string(),
        kind: kind.to_string(),
        namespaced,
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    }
}

pub fn dynamic_object(api_version: &str, kind: &str, name: &str, namespace: &str) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        }),
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: serde_json::json!({}),
    }
}

/// A policy file in a temporary directory, removed on drop.
pub struct PolicyFile {
    dir: tempfile::TempDir,
}

impl PolicyFile {
    pub fn new(contents: &str) -> Self {
        let policy = Self::absent();
        policy.write(contents);
        policy
    }

    /// A path where no policy file exists.
    pub fn absent() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn write(&self, contents: &str) {
        std::fs::write(self.path(), contents).expect("write policy file");
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("whitelist.json")
    }
}
