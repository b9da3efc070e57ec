//! Cluster inventory: which resource kinds exist and what lives in a namespace.
//!
//! - [`catalog`] discovers namespaced, listable resource kinds
//! - [`scanner`] lists live objects of those kinds inside one namespace
//! - [`cluster`] is the kube-rs backed [`ClusterAccess`] implementation

pub mod catalog;
pub mod cluster;
pub mod scanner;

use std::fmt;
use std::future::Future;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::core::DynamicObject;

use crate::engine::error::Result;

pub use catalog::discover;
pub use cluster::KubeCluster;
pub use scanner::{Inventory, scan};

/// A resource kind served by the cluster that the scanner may enumerate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceKindDescriptor {
    /// API group, empty for the core group
    pub group: String,
    pub version: String,
    /// Display kind, e.g. `ConfigMap`
    pub kind: String,
    /// Resource name used in list URLs, e.g. `configmaps`
    pub plural: String,
    pub namespaced: bool,
    pub supports_list: bool,
}

impl ResourceKindDescriptor {
    /// `group/version` as used in `apiVersion`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        join_api_version(&self.group, &self.version)
    }
}

impl fmt::Display for ResourceKindDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

/// One concrete object found in a namespace.
///
/// Field order matters: the derived ordering sorts by group, version, kind, name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceIdentity {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            join_api_version(&self.group, &self.version),
            self.kind,
            self.name
        )
    }
}

/// Read access to the cluster needed by a decision.
///
/// Implementations must never mutate cluster state.
pub trait ClusterAccess: Send + Sync {
    /// Whether the namespace exists. `Ok(false)` only on an authoritative not-found.
    fn namespace_exists(&self, namespace: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Raw API surface, one resource list per served group-version.
    fn api_resource_lists(&self) -> impl Future<Output = Result<Vec<APIResourceList>>> + Send;

    /// Every object of `kind` inside `namespace`.
    fn list_objects(
        &self,
        kind: &ResourceKindDescriptor,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<DynamicObject>>> + Send;
}

/// Split an `apiVersion` into `(group, version)`.
///
/// The core group has no group segment: `v1` -> `("", "v1")`.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

fn join_api_version(group: &str, version: &str) -> String {
    if group.is_empty() {
        version.to_string()
    } else {
        format!("{}/{}", group, version)
    }
}
